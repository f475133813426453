use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use luxapts_voice_agent::room::livekit::LiveKitSessionFactory;
use luxapts_voice_agent::worker::webhook;
use luxapts_voice_agent::{AppContext, RealtimeLauncher, Settings, Worker, WorkerOptions, logging};

#[derive(Parser)]
#[command(name = "luxapts-voice-agent", about = "LuxApts phone agent", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the worker, taking call jobs from LiveKit webhooks.
    Start,
    /// Handle a single call in an existing room.
    Connect {
        /// Name of the LiveKit room.
        #[arg(long)]
        room: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init().context("failed to initialise logging")?;

    let cli = Cli::parse();
    let settings = Settings::from_env().context("failed to load settings")?;
    settings.require_livekit()?;

    let factory = LiveKitSessionFactory::new(
        &settings.livekit_url,
        &settings.livekit_api_key,
        &settings.livekit_api_secret,
        &settings.agent_identity,
    );
    let webhook_addr = settings.webhook_addr;
    let app = Arc::new(AppContext::init(settings)?);
    let worker = Worker::new(
        app,
        WorkerOptions {
            session_factory: Arc::new(factory),
            launcher: Arc::new(RealtimeLauncher),
        },
    );

    match cli.command {
        Commands::Start => {
            let mut server = tokio::spawn(webhook::serve(worker.clone(), webhook_addr));
            tokio::select! {
                result = &mut server => {
                    worker.shutdown().await;
                    result.context("webhook server panicked")??;
                    return Ok(());
                }
                result = tokio::signal::ctrl_c() => {
                    result.context("failed to listen for ctrl-c")?;
                }
            }
            worker.shutdown().await;
            server.await.context("webhook server panicked")??;
        }
        Commands::Connect { room } => {
            worker.dispatch(&room).await?;
            tokio::select! {
                () = worker.drain() => {}
                result = tokio::signal::ctrl_c() => {
                    result.context("failed to listen for ctrl-c")?;
                }
            }
            worker.shutdown().await;
        }
    }
    Ok(())
}
