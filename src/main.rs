mod cli;
mod config;
mod error;
mod render;
mod toolkit;
mod ui;
mod watch;

use std::path::Path;

use anyhow::{Result, bail};
use clap::Parser;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use config::VibeflowConfig;
use error::VibeflowError;
use render::{FirstPoll, RenderSession, RenderState};
use toolkit::ToolkitClient;
use ui::RenderProgress;
use watch::DocumentWatcher;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = VibeflowConfig::load()?;
    if let Some(ms) = cli.interval_ms {
        config.poll_interval_ms = ms;
    }
    if let Some(attempts) = cli.max_attempts {
        config.max_poll_attempts = attempts;
    }
    if cli.wait_first {
        config.first_poll = FirstPoll::AfterInterval;
    }
    config.validate()?;

    match cli.command {
        Command::Render { file, watch: false } => render(&config, &file).await,
        Command::Render { file, watch: true } => watch_render(&config, &file).await,
        Command::Status { job_id } => {
            let client = toolkit_client(&config)?;
            let status = client.status(&job_id).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Command::Convert { file } => {
            let payload = read_document(&file)?;
            let client = toolkit_client(&config)?;
            let reply = client.convert(&payload).await?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
            Ok(())
        }
        Command::Ping => {
            let client = toolkit_client(&config)?;
            let body = client.test_connection().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Command::Format { file, write } => {
            let formatted = serde_json::to_string_pretty(&read_document(&file)?)?;
            if write {
                std::fs::write(&file, format!("{formatted}\n"))?;
                info!(file = %file.display(), "document formatted");
            } else {
                println!("{formatted}");
            }
            Ok(())
        }
    }
}

// Logs go to stderr; the progress bar redraws there too, so stay quiet by default.
fn init_tracing(verbose: bool) {
    let default = if verbose { "vibeflow=debug" } else { "vibeflow=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn toolkit_client(config: &VibeflowConfig) -> Result<ToolkitClient, VibeflowError> {
    let (base_url, api_key) = config.require_toolkit()?;
    Ok(ToolkitClient::new(base_url, api_key)?)
}

fn read_document(path: &Path) -> Result<Value, VibeflowError> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(VibeflowError::InvalidDocument)
}

async fn render(config: &VibeflowConfig, file: &Path) -> Result<()> {
    // Parse before anything touches the network.
    let document = read_document(file)?;
    let client = toolkit_client(config)?;

    let progress = RenderProgress::start(&file.display().to_string());
    let session = RenderSession::new(client, progress.clone(), config.poll_policy());

    follow_progress(&session, &progress);

    let run = async {
        session.start_render(&document).await;
        session.wait_for_outcome().await
    };
    let snapshot = tokio::select! {
        snapshot = run => snapshot,
        _ = tokio::signal::ctrl_c() => session.cancel(),
    };

    progress.finish(&snapshot);
    progress.print_report(&snapshot);

    if snapshot.state != RenderState::Completed {
        bail!("render ended in {}: {}", snapshot.state, snapshot.last_message);
    }
    Ok(())
}

// Redraws the bar on every snapshot until the session goes away.
fn follow_progress(
    session: &RenderSession<ToolkitClient, RenderProgress>,
    progress: &RenderProgress,
) {
    let mut updates = session.subscribe();
    let bar = progress.clone();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            bar.update(&snapshot);
        }
    });
}

async fn watch_render(config: &VibeflowConfig, file: &Path) -> Result<()> {
    let client = toolkit_client(config)?;
    let mut watcher = DocumentWatcher::new(file)?;

    let progress = RenderProgress::start(&file.display().to_string());
    let session = RenderSession::new(client, progress.clone(), config.poll_policy());

    follow_progress(&session, &progress);

    let rerender = async {
        submit_latest(&session, file).await;
        while watcher.changed().await.is_some() {
            info!(file = %file.display(), "document changed");
            session.document_edited();
            submit_latest(&session, file).await;
        }
    };

    tokio::select! {
        () = rerender => warn!("document watcher stopped"),
        _ = tokio::signal::ctrl_c() => {}
    }

    let snapshot = session.cancel();
    progress.finish(&snapshot);
    Ok(())
}

// A broken save leaves the session idle until the next edit.
async fn submit_latest(session: &RenderSession<ToolkitClient, RenderProgress>, file: &Path) {
    match read_document(file) {
        Ok(document) => {
            session.start_render(&document).await;
        }
        Err(error) => warn!(file = %file.display(), %error, "document not rendered"),
    }
}
