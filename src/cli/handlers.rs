use anyhow::{bail, Context};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

use crate::cache::{FileStore, LocalCache, LocalMirror};
use crate::client::DeepSearchClient;
use crate::core::Id;
use crate::render::{render_markdown, render_terminal};
use crate::search::{
    ControllerOptions, PhaseKind, Role, SearchHandle, SubmitMode, ViewSnapshot,
};
use crate::utils::format_timestamp;
use crate::{Config, Result};

fn local_mirror(config: &Config) -> Option<LocalMirror> {
    if !config.cache.enabled {
        return None;
    }
    let store = FileStore::new(config.cache.dir.clone());
    Some(LocalMirror::new(LocalCache::new(Arc::new(store))))
}

fn start_controller(config: &Config) -> Result<SearchHandle> {
    let client = DeepSearchClient::from_config(config)?;
    tracing::debug!("Using API at {}", client.base_url());
    Ok(SearchHandle::spawn(
        Arc::new(client),
        local_mirror(config),
        ControllerOptions::from_config(config),
    ))
}

/// Submit a query and wait for it to settle. Ctrl-C cancels the task.
async fn run_query(
    handle: &SearchHandle,
    query: String,
    mode: SubmitMode,
) -> Result<ViewSnapshot> {
    let view = handle.submit_now(query, mode).await?;
    if !view.phase.is_busy() {
        return Ok(view);
    }

    let generation = view.generation;
    tokio::select! {
        view = handle.wait_for_settle(generation) => view,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Cancelling...");
            handle.cancel().await
        }
    }
}

fn print_answer(text: &str, html: bool) {
    if html {
        println!("{}", render_markdown(text));
    } else {
        println!("{}", render_terminal(text));
    }
}

/// Print the outcome of a settled query; errors become the command's error.
fn report(view: &ViewSnapshot, html: bool) -> Result<()> {
    if let Some(error) = &view.search.error {
        bail!("{}", error);
    }
    match view.phase {
        PhaseKind::Cancelled => eprintln!("Cancelled."),
        PhaseKind::Done => {
            if let Some(answer) = view.search.messages.last().filter(|m| m.role == Role::Bot) {
                print_answer(&answer.text, html);
            }
        }
        _ => {}
    }
    if let Some(session_id) = &view.search.current_session_id {
        eprintln!("Session: {}", session_id);
    }
    Ok(())
}

pub async fn ask(config: Config, query: String, html: bool) -> Result<()> {
    let handle = start_controller(&config)?;
    let view = run_query(&handle, query, SubmitMode::NewSession).await?;
    report(&view, html)
}

pub async fn follow_up(
    config: Config,
    session_id: String,
    query: String,
    html: bool,
) -> Result<()> {
    let handle = start_controller(&config)?;
    handle
        .open_session(Id::new(session_id.clone()))
        .await
        .with_context(|| format!("Failed to open session {}", session_id))?;
    let view = run_query(&handle, query, SubmitMode::FollowUp).await?;
    report(&view, html)
}

pub async fn chat(config: Config, session_id: Option<String>, html: bool) -> Result<()> {
    let handle = start_controller(&config)?;
    if let Some(session_id) = session_id {
        let view = handle
            .open_session(Id::new(session_id.clone()))
            .await
            .with_context(|| format!("Failed to open session {}", session_id))?;
        for pair in view.search.pairs() {
            println!("> {}", pair.title);
            if let Some(answer) = pair.answer {
                print_answer(&answer, html);
            }
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let _ = std::io::stderr().flush();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let mode = if handle.snapshot().search.current_session_id.is_some() {
            SubmitMode::FollowUp
        } else {
            SubmitMode::NewSession
        };
        let view = run_query(&handle, line, mode).await?;
        if let Err(e) = report(&view, html) {
            tracing::error!("Query failed: {}", e);
            eprintln!("Error: {}", e);
        }
    }
    Ok(())
}

pub async fn list_sessions(config: Config, local: bool) -> Result<()> {
    if local {
        let Some(mirror) = local_mirror(&config) else {
            bail!("The local cache is disabled");
        };
        let sessions = mirror.sessions();
        if sessions.is_empty() {
            println!("No cached sessions");
        }
        for session in sessions {
            println!(
                "{:>8}  {}  {}",
                session.id,
                format_timestamp(session.created_at),
                session.summary
            );
        }
        return Ok(());
    }

    let handle = start_controller(&config)?;
    let view = handle.load_sessions().await?;
    if view.sessions.is_empty() {
        println!("No sessions");
    }
    for session in &view.sessions {
        let created = session
            .created_at
            .map(format_timestamp)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>8}  {}  {}",
            session.id,
            created,
            session.summary.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub async fn show_session(config: Config, session_id: String) -> Result<()> {
    let handle = start_controller(&config)?;
    let view = handle.open_session(Id::new(session_id)).await?;

    let pairs = view.search.pairs();
    if pairs.is_empty() {
        println!("No history in this session");
    }
    for (i, pair) in pairs.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("Q: {}", pair.title);
        match &pair.answer {
            Some(answer) => println!("{}", render_terminal(answer)),
            None => println!("(pending)"),
        }
    }
    Ok(())
}

pub async fn delete_session(config: Config, session_id: String) -> Result<()> {
    let handle = start_controller(&config)?;
    handle.delete_session(Id::new(session_id.clone())).await?;
    println!("Deleted session {}", session_id);
    Ok(())
}

pub async fn delete_history(
    config: Config,
    history_id: String,
    session_id: Option<String>,
) -> Result<()> {
    let handle = start_controller(&config)?;
    if let Some(session_id) = session_id {
        // Opening the session lets the deletion reach the local cache too.
        handle.open_session(Id::new(session_id)).await?;
    }
    handle.delete_history(Id::new(history_id.clone())).await?;
    println!("Deleted history {}", history_id);
    Ok(())
}

pub async fn render(file: Option<PathBuf>, terminal: bool) -> Result<()> {
    let text = match file {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            text
        }
    };

    if terminal {
        println!("{}", render_terminal(&text));
    } else {
        println!("{}", render_markdown(&text));
    }
    Ok(())
}

pub fn show_config(config: Config, write: bool) -> Result<()> {
    if write {
        let path = config.save()?;
        eprintln!("Wrote {}", path.display());
    }
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
