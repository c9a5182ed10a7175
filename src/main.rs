use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::time::{timeout, Duration};
use tracing::info;
use witness_live::channel::{wire, SessionChannel, WsTransport};
use witness_live::Config;

#[derive(Parser)]
#[command(
    name = "witness-live",
    about = "Screen + voice assistant client for the hosted live inference API"
)]
struct Cli {
    /// Path to the configuration file (TOML, optional)
    #[arg(long, default_value = "config/witness-live")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Open a live session, wait for it to become active, then close it
    Check,
    /// Print the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    match cli.command.unwrap_or(Command::Check) {
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
        Command::Check => {
            // Capture backends are embedder-provided; the binary only
            // verifies that a session can be opened with this credential
            let api_key = std::env::var("GEMINI_API_KEY")
                .context("GEMINI_API_KEY is not set; a credential is required")?;
            let transport = WsTransport::new(&cfg.live.host, &api_key)?;

            let session_config = cfg.session_config();
            info!(
                "Probing live endpoint {} with model {}",
                cfg.live.host, session_config.model
            );

            let setup = wire::setup(
                &session_config.model,
                &session_config.system_instruction,
            );
            let channel = SessionChannel::open(Box::new(transport), setup);
            timeout(Duration::from_secs(15), channel.ready())
                .await
                .context("Timed out waiting for the live session to open")??;
            channel.stop().await;

            info!("Live endpoint reachable; session closed cleanly");
        }
    }

    Ok(())
}
