//! CLI subcommand definitions and handlers.
//!
//! Uses clap derive to define the subcommand hierarchy:
//! - `serve` (default) -- run the bot service
//! - `config show` -- print the resolved configuration
//! - `version` -- print build/version info

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::routing::Router;
use crate::store::Stores;
use crate::transport::RecordingTransport;

/// Moderated community-event intake bot.
#[derive(Parser, Debug)]
#[command(
    name = "eventdesk",
    version = env!("CARGO_PKG_VERSION"),
    about = "eventdesk — moderated community-event intake and publishing"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the bot service (default when no subcommand is given).
    Serve,

    /// Read configuration.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Print version information.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the fully resolved configuration as JSON.
    Show,
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => handle_serve(),
        Command::Config(ConfigCommand::Show) => handle_config_show(),
        Command::Version => {
            println!("eventdesk {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn handle_config_show() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn handle_serve() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(Config::from_env());
    tracing::info!(
        admin_venue = config.admin_venue,
        public_venue = config.public_venue,
        timezone = %config.timezone,
        "starting eventdesk"
    );

    // The bundled transport is a loopback recorder; a deployment wires a
    // real chat backend in its place. A stdin console feeds the router so
    // the flows can be driven locally.
    let transport = Arc::new(RecordingTransport::new());
    let stores = Stores::in_memory();
    let router = Arc::new(Router::new(
        transport.clone(),
        stores.clone(),
        config.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let archiver = tokio::spawn(crate::jobs::run_archiver(
        stores,
        config.clone(),
        shutdown_rx,
    ));
    let console = tokio::spawn(console_loop(router, transport, config.admin_venue));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    console.abort();
    let _ = archiver.await;
    Ok(())
}

/// Read stdin lines and feed them to the router as a fixed local operator:
/// `/name` is a command, `cb <data>` a button press, anything else text.
async fn console_loop(
    router: Arc<Router>,
    transport: Arc<RecordingTransport>,
    venue: i64,
) {
    use tokio::io::{AsyncBufReadExt, BufReader};

    use crate::models::ActorInfo;
    use crate::transport::Incoming;

    let operator = ActorInfo::new(1, "operator");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(error = %err, "console read failed");
                return;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let seen_before = transport.sent_to(venue).len();
        let incoming = if let Some(data) = line.strip_prefix("cb ") {
            Incoming::callback(operator.clone(), venue, data)
        } else if line.starts_with('/') {
            Incoming::command(operator.clone(), venue, line)
        } else {
            Incoming::text(operator.clone(), venue, line)
        };
        router.handle(incoming).await;
        for message in transport.sent_to(venue).into_iter().skip(seen_before) {
            println!("<< {}", message.text);
            for row in &message.keyboard.as_ref().map(|kb| kb.rows.clone()).unwrap_or_default() {
                let labels: Vec<String> = row
                    .iter()
                    .map(|b| format!("[{} → cb {}]", b.label, b.action))
                    .collect();
                println!("   {}", labels.join(" "));
            }
        }
    }
}
