use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    scoring, CaptureSlot, CatalogClient, DetectionService, HttpDetectionClient, HttpTransport,
    SessionEvent, SessionOutcome, SessionPlan, SystemClock, TrackingOptions,
    TrackingSessionController,
};
use shared::{
    domain::{EnvironmentId, ProcessId},
    protocol::{ProcessStep, StepEvent},
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use zone_editor::{CoordinateMapper, Point, Size, ZoneEditor};

mod config;

use config::{load_settings, normalize_service_url, Settings};

#[derive(Parser, Debug)]
#[command(name = "tracker", about = "Process adherence tracking against a remote detector")]
struct Args {
    /// Settings file; defaults to ./tracker.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    service_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detector availability.
    Status,
    /// List the zones of an environment.
    Zones {
        #[arg(long)]
        environment: i64,
    },
    /// Add a 100x100 zone with its top-left corner at (x, y) image pixels.
    AddZone {
        #[arg(long)]
        environment: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
    },
    /// List the steps of a process.
    Steps {
        #[arg(long)]
        process: i64,
    },
    /// Run a tracking session until Ctrl-C or the optional duration elapses.
    Track {
        #[arg(long)]
        environment: i64,
        #[arg(long)]
        process: i64,
        #[arg(long)]
        duration_secs: Option<u64>,
    },
    /// Score a recorded step-event log offline.
    Score {
        #[arg(long)]
        log: PathBuf,
        #[arg(long)]
        steps: PathBuf,
        #[arg(long)]
        actual_secs: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(service_url) = args.service_url.as_deref() {
        settings.service_url = normalize_service_url(service_url)?;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match args.command {
        Command::Status => status(&settings).await,
        Command::Zones { environment } => list_zones(&settings, EnvironmentId(environment)).await,
        Command::AddZone {
            environment,
            name,
            x,
            y,
        } => add_zone(&settings, EnvironmentId(environment), name, Point::new(x, y)).await,
        Command::Steps { process } => list_steps(&settings, ProcessId(process)).await,
        Command::Track {
            environment,
            process,
            duration_secs,
        } => {
            track(
                &settings,
                EnvironmentId(environment),
                ProcessId(process),
                duration_secs.map(Duration::from_secs),
            )
            .await
        }
        Command::Score {
            log,
            steps,
            actual_secs,
        } => score_offline(&log, &steps, actual_secs),
    }
}

fn transport(settings: &Settings) -> Result<HttpTransport> {
    HttpTransport::with_timeout(&settings.service_url, settings.request_timeout())
}

async fn status(settings: &Settings) -> Result<()> {
    let detector = HttpDetectionClient::new(transport(settings)?);
    let availability = detector
        .tracking_status()
        .await
        .context("failed to query detector status")?;
    println!(
        "available={} model_loaded={} webcam_available={}",
        availability.available,
        availability.model_loaded,
        availability
            .webcam_available
            .map_or_else(|| "unknown".to_string(), |v| v.to_string())
    );
    Ok(())
}

async fn list_zones(settings: &Settings, environment_id: EnvironmentId) -> Result<()> {
    let catalog = CatalogClient::new(transport(settings)?);
    let zones = catalog
        .list_zones(environment_id)
        .await
        .context("failed to load zones")?;
    for zone in zones {
        println!(
            "{}\t{}\t({}, {}) - ({}, {})\t{}",
            zone.id.0,
            zone.name,
            zone.rect.x0(),
            zone.rect.y0(),
            zone.rect.x1(),
            zone.rect.y1(),
            zone.color
        );
    }
    Ok(())
}

async fn add_zone(
    settings: &Settings,
    environment_id: EnvironmentId,
    name: String,
    at: Point,
) -> Result<()> {
    let catalog = CatalogClient::new(transport(settings)?);
    let existing = catalog
        .list_zones(environment_id)
        .await
        .context("failed to load zones")?;

    // Coordinates given on the command line are already image pixels.
    let mut editor = ZoneEditor::new(environment_id, CoordinateMapper::identity(Size::default()));
    editor.set_created_by(settings.operator.clone());
    editor.load_zones(existing);
    let added = editor.add_zone(name, at);

    let stored = catalog
        .replace_zones(environment_id, editor.zones().to_vec())
        .await
        .context("failed to save zones")?;
    editor.mark_saved(stored);

    match editor.zones().iter().find(|zone| zone.name == added.name) {
        Some(zone) => println!("zone {} saved as id {}", zone.name, zone.id.0),
        None => warn!(name = %added.name, "saved zone list does not contain the new zone"),
    }
    Ok(())
}

async fn list_steps(settings: &Settings, process_id: ProcessId) -> Result<()> {
    let catalog = CatalogClient::new(transport(settings)?);
    let mut steps = catalog
        .list_steps(process_id)
        .await
        .context("failed to load steps")?;
    steps.sort_by_key(|step| step.step_number);
    for step in steps {
        println!(
            "{}\t{}\tzone {}\t{:.1}s",
            step.step_number, step.name, step.target_zone_id.0, step.target_duration_seconds
        );
    }
    Ok(())
}

async fn track(
    settings: &Settings,
    environment_id: EnvironmentId,
    process_id: ProcessId,
    duration: Option<Duration>,
) -> Result<()> {
    let transport = transport(settings)?;
    let catalog = CatalogClient::new(transport.clone());
    let zones = catalog
        .list_zones(environment_id)
        .await
        .context("failed to load zones")?;
    let steps = catalog
        .list_steps(process_id)
        .await
        .context("failed to load steps")?;

    let controller = TrackingSessionController::with_dependencies(
        Arc::new(HttpDetectionClient::new(transport)),
        Arc::new(SystemClock),
        CaptureSlot::new(),
        TrackingOptions {
            poll_interval: settings.poll_interval(),
        },
    );
    let mut events = controller.subscribe_events();
    let total_steps = steps.len();

    let session = controller
        .start(SessionPlan::new(environment_id, process_id, zones, steps))
        .await?;
    println!("session {} started", session.session_id);

    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let interrupted = loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupt received; stopping session");
                break None;
            }
            _ = &mut deadline => {
                info!("tracking duration elapsed; stopping session");
                break None;
            }
            event = events.recv() => match event {
                Ok(SessionEvent::StepLogAdvanced { current_step_index, events: log }) => {
                    if let Some(last) = log.last() {
                        println!(
                            "step {} done: {} ({:.1}s, target {:.1}s)",
                            last.step_number,
                            last.step_name,
                            last.duration_seconds,
                            last.target_duration_seconds
                        );
                    }
                    println!("progress: {current_step_index}/{total_steps}");
                }
                Ok(SessionEvent::ProcessComplete) => {
                    println!("all steps completed; press Ctrl-C to finish");
                }
                Ok(SessionEvent::TrackingInterrupted(reason)) => break Some(reason),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "session events lagged"),
                Err(RecvError::Closed) => break None,
            }
        }
    };

    if let Some(reason) = interrupted {
        controller.shutdown().await;
        bail!("tracking stopped unexpectedly: {reason}");
    }

    let outcome = finish(controller).await?;
    println!("{}", serde_json::to_string_pretty(&outcome.results)?);
    if !outcome.persisted {
        warn!(session_id = %outcome.session_id, "results were not saved by the service");
    }
    Ok(())
}

/// Stops the session, then tears the controller down whether or not the
/// stop went through.
async fn finish(controller: TrackingSessionController) -> Result<SessionOutcome> {
    let stopped = controller.stop().await;
    controller.shutdown().await;
    Ok(stopped?)
}

fn score_offline(log: &Path, steps: &Path, actual_secs: f64) -> Result<()> {
    let raw_log = fs::read_to_string(log)
        .with_context(|| format!("failed to read step log {}", log.display()))?;
    let events: Vec<StepEvent> = serde_json::from_str(&raw_log)
        .with_context(|| format!("invalid step log {}", log.display()))?;
    let raw_steps = fs::read_to_string(steps)
        .with_context(|| format!("failed to read steps {}", steps.display()))?;
    let steps: Vec<ProcessStep> = serde_json::from_str(&raw_steps)
        .with_context(|| format!("invalid steps {}", steps.display()))?;
    if steps.is_empty() {
        bail!("cannot score a process without steps");
    }

    let result = scoring::local_result(&events, &steps, actual_secs);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
