use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "deepsearch")]
#[command(about = "Terminal client for the DeepSearch task API", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Base URL of the API, e.g. http://localhost:8000/api
    #[arg(long, global = true, env = "DEEPSEARCH_API_URL")]
    pub api_url: Option<String>,

    /// Do not read or write the local session cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Log requests and state transitions to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a question in a new session
    Ask {
        /// Print sanitized HTML instead of plain text
        #[arg(long)]
        html: bool,
        /// The question
        #[arg(required = true, trailing_var_arg = true)]
        query: Vec<String>,
    },
    /// Ask a follow-up question in an existing session
    FollowUp {
        /// Session to continue
        #[arg(short, long)]
        session: String,
        /// Print sanitized HTML instead of plain text
        #[arg(long)]
        html: bool,
        /// The question
        #[arg(required = true, trailing_var_arg = true)]
        query: Vec<String>,
    },
    /// Interactive conversation, one question per line
    Chat {
        /// Continue an existing session instead of starting a new one
        #[arg(short, long)]
        session: Option<String>,
        /// Print sanitized HTML instead of plain text
        #[arg(long)]
        html: bool,
    },
    /// List sessions, newest first
    Sessions {
        /// Read the local cache instead of the server
        #[arg(long)]
        local: bool,
    },
    /// Show the questions and answers of a session
    Show {
        /// Session ID
        session_id: String,
    },
    /// Delete a session
    Delete {
        /// Session ID
        session_id: String,
    },
    /// Delete a single history entry
    DeleteHistory {
        /// History ID
        history_id: String,
        /// Session the entry belongs to, used to update the local cache
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Render an answer file (or stdin) through the markdown pipeline
    Render {
        /// Input file; stdin when omitted
        file: Option<PathBuf>,
        /// Plain text with numbered sources instead of HTML
        #[arg(long)]
        terminal: bool,
    },
    /// Print the effective configuration
    Config {
        /// Write the configuration file
        #[arg(long)]
        write: bool,
    },
}
