use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::*;
use rendezvous::PeerId;
use rendezvous::model::MediaConstraints;
use rendezvous::session::{
    ChannelSignalingLink, LinkEndpoint, NoCapture, RtcTransportFactory, SessionConfig,
    SessionController, SessionEvent, TransportConfig,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rendezvous")]
#[command(bin_name = "rendezvous")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect two in-process sessions and exchange data-channel messages.
    Loopback {
        #[arg(short, long, default_value_t = 3)]
        messages: usize,

        #[arg(short, long, default_value = "data")]
        label: String,

        #[arg(long, default_value_t = 20)]
        timeout_secs: u64,

        /// JSON session config applied to both peers.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    match Cli::parse().command {
        Commands::Loopback {
            messages,
            label,
            timeout_secs,
            config,
        } => {
            let base = load_config(config)?;
            let timeout = Duration::from_secs(timeout_secs);
            run_loopback(base, &label, messages, timeout).await?;
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<SessionConfig> {
    let Some(path) = path else {
        return Ok(SessionConfig {
            transport: TransportConfig::host_only(),
            ..SessionConfig::default()
        });
    };

    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    SessionConfig::from_json(&text)
        .with_context(|| format!("Invalid session config {}", path.display()))
}

fn spawn_peer(
    base: &SessionConfig,
    name: &str,
    label: &str,
    endpoint: LinkEndpoint,
) -> (SessionController, mpsc::UnboundedReceiver<SessionEvent>) {
    let config = SessionConfig {
        local_peer: PeerId::from(name),
        media: MediaConstraints::none(),
        data_channel_label: label.to_owned(),
        ..base.clone()
    };

    SessionController::spawn(
        config,
        Arc::new(NoCapture),
        Arc::new(RtcTransportFactory),
        Arc::new(endpoint.link),
        endpoint.events,
    )
}

async fn run_loopback(
    base: SessionConfig,
    label: &str,
    messages: usize,
    timeout: Duration,
) -> Result<()> {
    println!("{}", "🚀 Starting loopback session...".green().bold());

    info!(messages, label, "Running loopback between alice and bob");
    let (alice_end, bob_end) = ChannelSignalingLink::pair();
    let (alice, mut alice_events) = spawn_peer(&base, "alice", label, alice_end);
    let (bob, mut bob_events) = spawn_peer(&base, "bob", label, bob_end);

    alice.start().await.context("alice failed to start")?;
    bob.start().await.context("bob failed to start")?;
    alice
        .create_and_send_offer()
        .await
        .context("alice failed to offer")?;
    println!("{}", "📡 Offer sent, waiting for the data channel...".cyan());

    let (alice_open, bob_open) = tokio::time::timeout(
        timeout,
        futures::future::join(
            wait_for_open(&mut alice_events),
            wait_for_open(&mut bob_events),
        ),
    )
    .await
    .context("Timed out waiting for the data channel to open")?;
    info!("Data channel open on both peers");
    println!(
        "   🔗 alice: '{}'  bob: '{}'",
        alice_open?.yellow(),
        bob_open?.yellow()
    );

    for n in 1..=messages {
        let text = format!("message {n} of {messages}");
        alice
            .send_data(text.clone().into_bytes())
            .await
            .context("alice failed to send")?;

        let received = tokio::time::timeout(timeout, wait_for_message(&mut bob_events))
            .await
            .context("Timed out waiting for a message")??;
        if received != text.as_bytes() {
            bail!("bob received {:?}, expected {:?}", received, text);
        }
        info!(n, "Message delivered");
        println!("   ✉️  {} {}", "alice → bob:".cyan(), text);
    }

    let snapshot = bob.snapshot().await?;
    println!(
        "   📋 bob is bound to {} in {:?}",
        snapshot
            .remote_peer
            .map(|p| p.to_string())
            .unwrap_or_default()
            .yellow(),
        snapshot.signaling_state
    );

    alice.close().await;
    bob.close().await;
    info!("Both sessions closed");
    println!("{}", "✨ Loopback completed successfully!".green().bold());
    Ok(())
}

async fn wait_for_open(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Result<String> {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::DataChannelOpen(label) => return Ok(label),
            SessionEvent::Error { kind, detail } => {
                warn!(?kind, %detail, "Session reported an error");
                println!("   {} {:?}: {}", "⚠️".yellow(), kind, detail);
            }
            _ => {}
        }
    }
    bail!("Session ended before the data channel opened")
}

async fn wait_for_message(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Result<Vec<u8>> {
    while let Some(event) = events.recv().await {
        if let SessionEvent::DataMessage(data) = event {
            return Ok(data.to_vec());
        }
    }
    bail!("Session ended before a message arrived")
}
