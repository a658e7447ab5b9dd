use clap::Parser;
use tracing_subscriber::EnvFilter;

use deepsearch::cli::handlers;
use deepsearch::cli::{Cli, Commands};
use deepsearch::{Config, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only answers
    let default_level = if cli.verbose {
        "deepsearch=debug"
    } else {
        "deepsearch=warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load()?;
    if let Some(api_url) = cli.api_url {
        config.api.base_url = api_url;
    }
    if cli.no_cache {
        config.cache.enabled = false;
    }

    match cli.command {
        Commands::Ask { html, query } => handlers::ask(config, query.join(" "), html).await,
        Commands::FollowUp {
            session,
            html,
            query,
        } => handlers::follow_up(config, session, query.join(" "), html).await,
        Commands::Chat { session, html } => handlers::chat(config, session, html).await,
        Commands::Sessions { local } => handlers::list_sessions(config, local).await,
        Commands::Show { session_id } => handlers::show_session(config, session_id).await,
        Commands::Delete { session_id } => handlers::delete_session(config, session_id).await,
        Commands::DeleteHistory {
            history_id,
            session,
        } => handlers::delete_history(config, history_id, session).await,
        Commands::Render { file, terminal } => handlers::render(file, terminal).await,
        Commands::Config { write } => handlers::show_config(config, write),
    }
}
