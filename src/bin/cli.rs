//! CLI binary for sona.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use sona::audio::{CpalCapture, CpalPlayback};
use sona::chat::artifact::HttpArtifactSink;
use sona::chat::backend::HttpBackend;
use sona::chat::{generate_session_id, ChatSession, SessionController};
use sona::store::{FsChatStore, MemoryChatStore, PersistenceBridge};
use sona::voice::{HttpSynthesis, HttpTranscription, PlaybackController, VoiceCaptureController};
use sona::SonaConfig;

/// Sona: voice-enabled streaming chat client.
#[derive(Parser)]
#[command(name = "sona", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Start a text conversation (default).
    Chat {
        /// Resume an existing session by ID.
        #[arg(short, long)]
        session: Option<String>,
    },

    /// List available audio devices.
    Devices,

    /// List stored sessions.
    Sessions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sona=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        SonaConfig::from_file(path)?
    } else {
        SonaConfig::load()?
    };

    match cli.command.unwrap_or(Command::Chat { session: None }) {
        Command::Chat { session } => run_chat(config, session).await,
        Command::Devices => list_devices(),
        Command::Sessions => list_sessions(config).await,
    }
}

async fn run_chat(config: SonaConfig, session_id: Option<String>) -> anyhow::Result<()> {
    println!("Sona v{}", env!("CARGO_PKG_VERSION"));

    let local = FsChatStore::new(config.storage.session_dir())?;
    let bridge = PersistenceBridge::new(Arc::new(local), Arc::new(MemoryChatStore::new()));

    let session = match session_id {
        Some(id) => match bridge.hydrate(&id).await? {
            Some(session) => {
                println!("Resuming session {id} ({} messages)", session.messages.len());
                session
            }
            None => anyhow::bail!("session not found: {id}"),
        },
        None => ChatSession::new(generate_session_id()),
    };

    let backend = Arc::new(HttpBackend::new(config.backend.chat_url.clone()));
    let sink = Arc::new(HttpArtifactSink::new(config.backend.artifact_url.clone()));
    let controller = SessionController::new(session, backend)
        .with_artifact_sink(sink, config.backend.artifact_tools.clone());
    let mut status_rx = controller.subscribe();

    let synthesis = Arc::new(HttpSynthesis::new(
        config.voice.synthesis_url.clone(),
        config.voice.voice.clone(),
    ));
    let mut speaker = PlaybackController::new(
        synthesis,
        Box::new(CpalPlayback::new(config.audio.output_device.clone())),
        config.voice.auto_speak,
    );

    let transcription = Arc::new(HttpTranscription::new(config.voice.transcription_url.clone()));
    let mut voice = VoiceCaptureController::new(
        Box::new(CpalCapture::new(&config.audio)),
        transcription,
    );

    println!("Type a message and press Enter. /rec starts recording, /stop sends it. Ctrl+D to quit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        let sent = match text {
            "/rec" => {
                match voice.start_recording() {
                    Ok(()) => println!("recording... type /stop to send"),
                    Err(e) => eprintln!("error: {e}"),
                }
                continue;
            }
            "/stop" => voice.stop_and_send(&controller).await,
            _ => controller.send(text).await,
        };
        if let Err(e) = sent {
            eprintln!("error: {e}");
            continue;
        }

        let snapshot = controller.snapshot().await;
        if let Some(reply) = snapshot.last_assistant() {
            println!("{}\n", reply.text());
        }

        let transition = *status_rx.borrow_and_update();
        if let Err(e) = speaker.observe_transition(transition, &snapshot).await {
            warn!("failed to speak reply: {e}");
        }

        if let Err(e) = bridge.persist(&snapshot).await {
            warn!("failed to persist session: {e}");
        }
    }

    println!("bye");
    Ok(())
}

fn list_devices() -> anyhow::Result<()> {
    println!("Input devices:");
    for name in CpalCapture::list_input_devices()? {
        println!("  {name}");
    }
    println!("Output devices:");
    for name in CpalPlayback::list_output_devices()? {
        println!("  {name}");
    }
    Ok(())
}

async fn list_sessions(config: SonaConfig) -> anyhow::Result<()> {
    use sona::store::ChatStore;

    let store = FsChatStore::new(config.storage.session_dir())?;
    let metas = store.list().await?;
    if metas.is_empty() {
        println!("no stored sessions");
        return Ok(());
    }
    for meta in metas {
        println!("{}  (updated {})", meta.id, meta.updated_at);
    }
    Ok(())
}
