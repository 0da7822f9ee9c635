//! CLI for trackcast
//!
//! Subcommands:
//! - `server`: run the WebSocket broadcast server
//! - `watch`: connect as a client and print received frames (smoke tests)

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tokio::io::BufReader;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use trackcast::config::{RuntimeRecord, ServerStartup, load_config};
use trackcast::hub::BroadcastHub;
use trackcast::ingest::ingest_lines;
use trackcast::registry::GroupRegistry;
use trackcast::transport::{ServerMessage, bind, serve};
use trackcast::utils::{Result, logging};

#[derive(Parser)]
#[command(name = "trackcast", version, about)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the WebSocket server
    Server {
        /// Publish newline-delimited JSON location events read from stdin
        #[arg(long)]
        stdin_events: bool,
    },
    /// Connect to a server and print every frame it sends
    Watch {
        /// WebSocket URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8080/ws/locations/")]
        url: String,
        /// Exit after this many location frames
        #[arg(long)]
        count: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let result = match cli.command {
        Command::Server { stdin_events } => run_server(stdin_events).await,
        Command::Watch { url, count } => run_watch(&url, count).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_server(stdin_events: bool) -> Result<()> {
    let settings = load_config()?;
    let record_path = PathBuf::from(&settings.runtime.record_path);
    let record = RuntimeRecord::load(&record_path);

    let Some(port) = record.http_listener_port(settings.server.port) else {
        info!(http_port = ?record.http_port, "HTTP listener disabled by runtime record");
        return Ok(());
    };
    let listener = bind(&settings.server.host, port).await?;
    let actual_port = listener.local_addr()?.port();
    RuntimeRecord::update(&record_path, |r| r.actual_http_port = Some(actual_port))?;

    let startup = ServerStartup::now();
    let hub = Arc::new(BroadcastHub::new(
        Arc::new(GroupRegistry::new()),
        settings.hub.max_connections,
    ));
    let shutdown = CancellationToken::new();

    let ingest = stdin_events.then(|| {
        let hub = hub.clone();
        let topic = settings.hub.topic.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let result = ingest_lines(BufReader::new(tokio::io::stdin()), &hub, &topic).await;
            if let Err(e) = &result {
                error!(error = %e, "event ingestion failed");
                shutdown.cancel();
            }
            result
        })
    });

    let server = tokio::spawn(serve(listener, hub, startup, settings, shutdown.clone()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received. Exiting gracefully."),
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();

    let served = server.await?;
    remove_record(&record_path);

    let ingested = match ingest {
        Some(task) if task.is_finished() => task.await?.map(|_| ()),
        Some(task) => {
            task.abort();
            Ok(())
        }
        None => Ok(()),
    };
    served.and(ingested)
}

fn remove_record(path: &Path) {
    if let Err(e) = RuntimeRecord::remove(path) {
        warn!(path = %path.display(), error = %e, "failed to remove runtime record");
    }
}

async fn run_watch(url: &str, count: Option<usize>) -> Result<()> {
    let (mut ws, _response) = connect_async(url).await?;
    info!("Connected to {url}");

    let mut locations = 0usize;
    while let Some(msg) = ws.next().await {
        match msg? {
            WsMessage::Text(text) => {
                println!("{text}");
                match ServerMessage::from_text(text.as_str()) {
                    Ok(ServerMessage::Location { .. }) => locations += 1,
                    Ok(ServerMessage::Welcome { .. }) => {}
                    Err(e) => warn!(error = %e, "unrecognized frame"),
                }
            }
            WsMessage::Close(frame) => {
                info!(?frame, "server closed the connection");
                break;
            }
            _ => {}
        }
        if count.is_some_and(|n| locations >= n) {
            ws.close(None).await?;
            break;
        }
    }
    Ok(())
}
