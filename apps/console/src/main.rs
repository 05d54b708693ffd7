use std::{fs, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use client_core::{DocumentStore, InMemoryDocumentStore, Notifier, RemoteDocumentStore};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod command;
mod config;
mod forms;
mod render;
mod session;

use command::parse_command;
use config::{load_settings_from, SETTINGS_FILE};
use render::render_notification;
use session::{Reply, Session};

#[derive(Parser, Debug)]
#[command(about = "Albums and users admin console")]
struct Args {
    /// Base URL of the document-store service.
    #[arg(long)]
    server_url: Option<String>,
    /// Keep documents in this process instead of talking to a service.
    #[arg(long, conflicts_with = "server_url")]
    memory: bool,
    #[arg(long)]
    mutation_timeout_ms: Option<u64>,
    #[arg(long, default_value = SETTINGS_FILE)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
    let args = Args::parse();

    let file = fs::read_to_string(&args.config).ok();
    let mut settings = load_settings_from(file.as_deref(), |key| std::env::var(key).ok());
    if let Some(url) = args.server_url {
        settings.server_url = url;
    }
    if let Some(ms) = args.mutation_timeout_ms.filter(|ms| *ms > 0) {
        settings.client.mutation_timeout = Duration::from_millis(ms);
    }

    let store: Arc<dyn DocumentStore> = if args.memory {
        info!("using in-process document store");
        Arc::new(InMemoryDocumentStore::new())
    } else {
        info!(server_url = %settings.server_url, "using document-store service");
        Arc::new(RemoteDocumentStore::new(&settings.server_url)?)
    };

    let notifier = Notifier::default();
    let mut notifications = notifier.subscribe();
    let mut session = Session::new(store, notifier, settings.client);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", command::HELP);
    println!("{}", session.render());

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let reply = match parse_command(&line) {
                    Ok(command) => session.handle(command),
                    Err(err) => Reply::Print(format!("{err}; type 'help' for commands")),
                };
                match reply {
                    Reply::Quit => break,
                    Reply::Print(text) => println!("{text}"),
                    Reply::Render => println!("{}", session.render()),
                    Reply::Nothing => {}
                }
            }
            notification = notifications.recv() => match notification {
                Ok(notification) => println!("{}", render_notification(&notification)),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "notifications dropped"),
                Err(RecvError::Closed) => break,
            },
            () = session.changed() => println!("{}", session.render()),
        }
    }

    session.close();
    Ok(())
}
