use anyhow::{Context, Result};
use clap::Parser;
use meeting_sentinel::{
    Config, LogNotifier, MeetingSession, NatsTransport, SessionConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Follow a live meeting job: reconcile its transcript and classifications,
/// watch for agenda drift, and keep the meeting clock.
#[derive(Debug, Parser)]
#[command(name = "meeting-sentinel", version, about)]
struct Args {
    /// Job identifier to follow (generated when omitted)
    job_id: Option<String>,

    /// Agenda file; the scheduled duration is read from its text
    #[arg(long)]
    agenda: Option<PathBuf>,

    /// Configuration file
    #[arg(long, default_value = "config/meeting-sentinel")]
    config: String,

    /// NATS server URL (overrides the config file)
    #[arg(long)]
    nats_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load_or_default(&args.config)?;

    info!("{} v0.1.0", cfg.service.name);

    let agenda_text = match &args.agenda {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read agenda file {}", path.display()))?,
        None => String::new(),
    };

    let nats_url = args.nats_url.unwrap_or_else(|| cfg.channel.nats_url.clone());
    let transport = Arc::new(
        NatsTransport::connect(&nats_url, cfg.channel.subject_prefix.clone()).await?,
    );

    let mut session_config = SessionConfig::default();
    if let Some(job_id) = args.job_id {
        session_config.job_id = job_id;
    }
    session_config.agenda_text = agenda_text;
    session_config.monitor = cfg.alerts.monitor_config();

    let mut session = MeetingSession::new(session_config, transport, Arc::new(LogNotifier));
    session.start().await?;
    info!("Following job {} (ctrl-c to stop)", session.job_id());

    // Run until the job finishes or the user interrupts
    let mut status = session.watch_status();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            changed = status.changed() => {
                if changed.is_err() || !status.borrow().is_streaming() {
                    break;
                }
            }
        }
    }

    let stats = session.stop().await?;
    info!(
        "Job {}: {} transcript segments, {} classifications, {} malformed messages dropped",
        stats.job_id, stats.transcript_segments, stats.classifications, stats.dropped_messages
    );
    match stats.scheduled_minutes {
        Some(minutes) => info!(
            "Elapsed {}s of {} scheduled minutes ({})",
            stats.elapsed_seconds,
            minutes,
            stats.time_band.as_str()
        ),
        None => info!("Elapsed {}s (no scheduled duration)", stats.elapsed_seconds),
    }
    if let Some(average) = stats.window_average {
        info!("Final drift window average: {}%", average);
    }

    for segment in session.transcript().await {
        println!("[{}] {}: {}", segment.timestamp, segment.speaker, segment.text);
    }

    if let Some(message) = session.failure().await {
        warn!("Job ended with error: {}", message);
    }

    Ok(())
}
