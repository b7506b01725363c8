//! scand - document scan control daemon
//!
//! Runs the full scanning loop against simulated camera hardware:
//! 1. Discovers a simulated triple-lens rig and picks the initial lens
//! 2. Produces synthetic frames on a dedicated thread, dropping frames
//!    while the loop is busy
//! 3. Runs the synthetic detector, quality scoring and adaptive switching
//! 4. Logs presentation events and periodic session statistics

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TrySendError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use doc_scan_control::camera::{
    CameraInventory, CameraManager, CameraPreference, SimulatedProvider, SimulatedSession,
};
use doc_scan_control::detect::SyntheticDetector;
use doc_scan_control::funnel::StubFunnel;
use doc_scan_control::ingest::{SourceConfig, SyntheticSource};
use doc_scan_control::{Frame, ScanConfig, ScanSession, SessionEvent};

const STATS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON or TOML configuration file.
    #[arg(long, env = "SCAN_CONFIG")]
    config: Option<PathBuf>,
    /// Run time in seconds; 0 runs until Ctrl-C.
    #[arg(long, default_value_t = 30)]
    seconds: u64,
    /// Frames per second for the synthetic source.
    #[arg(long, default_value_t = 30)]
    fps: u32,
    /// Camera preference (auto, wide, ultra_wide, telephoto).
    #[arg(long)]
    camera: Option<CameraPreference>,
    /// Seed for the synthetic detector.
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Stable detections required before an automatic capture.
    #[arg(long, default_value_t = 20)]
    passes_to_scan: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => ScanConfig::from_path(path)?,
        None => ScanConfig::load()?,
    };
    let preference = args.camera.unwrap_or(cfg.preferred_camera);

    let inventory = CameraInventory::discover(&SimulatedProvider::triple())?;
    log::info!(
        "discovered lenses: {}",
        inventory
            .lens_types()
            .map(|l| l.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    let camera = CameraManager::new(
        Box::new(SimulatedSession::new()),
        inventory,
        preference,
        cfg.macro_mode(),
        cfg.controller(),
    );

    let (event_tx, event_rx) = mpsc::channel();
    let printer = spawn_event_printer(event_rx)?;

    let mut session = ScanSession::start(
        cfg.session(),
        camera,
        Box::new(SyntheticDetector::new(args.seed)),
        Box::new(StubFunnel::new(args.passes_to_scan)),
        event_tx,
    )?;

    let stop = session.stop_handle();
    ctrlc::set_handler(move || stop.request_stop())
        .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let source = SyntheticSource::new(SourceConfig {
        target_fps: args.fps,
        ..SourceConfig::default()
    })?;
    let (frames, producer) = spawn_producer(source)?;

    let deadline = (args.seconds > 0).then(|| Instant::now() + Duration::from_secs(args.seconds));
    let mut last_stats = Instant::now();
    log::info!("scand running (preference={}, seed={})", preference, args.seed);

    while session.is_running() {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            log::info!("run time elapsed");
            break;
        }
        match frames.recv_timeout(Duration::from_millis(200)) {
            Ok(frame) => {
                session.process_frame(&frame);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!("frame source ended");
                break;
            }
        }
        if last_stats.elapsed() >= STATS_INTERVAL {
            log::info!("stats {}", serde_json::to_string(&session.stats())?);
            last_stats = Instant::now();
        }
    }

    let stats = session.stop()?;
    drop(frames);
    drop(session);
    join(producer, "frame producer")?;
    join(printer, "event printer")?;
    log::info!("final stats {}", serde_json::to_string(&stats)?);
    Ok(())
}

/// Hands frames over a one-slot channel; a frame that finds the slot full
/// is dropped rather than queued.
fn spawn_producer(mut source: SyntheticSource) -> Result<(Receiver<Frame>, JoinHandle<()>)> {
    source.connect()?;
    let (tx, rx) = mpsc::sync_channel(1);
    let handle = std::thread::Builder::new()
        .name("frame-producer".to_string())
        .spawn(move || {
            let mut dropped = 0u64;
            loop {
                let frame = match source.next_frame() {
                    Ok(frame) => frame,
                    Err(e) => {
                        log::error!("frame source failed: {:#}", e);
                        break;
                    }
                };
                match tx.try_send(frame) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => dropped += 1,
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }
            let stats = source.stats();
            log::info!(
                "frame producer stopped: captured={} dropped_at_handoff={}",
                stats.frames_captured,
                dropped
            );
        })?;
    Ok((rx, handle))
}

fn spawn_event_printer(rx: Receiver<SessionEvent>) -> Result<JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name("event-printer".to_string())
        .spawn(move || {
            for event in rx {
                match event {
                    SessionEvent::DetectionUpdate { quad: Some(_), .. } => {
                        log::debug!("overlay updated")
                    }
                    SessionEvent::DetectionUpdate { quad: None, .. } => {
                        log::info!("overlay cleared")
                    }
                    SessionEvent::CaptureStarted => log::info!("capture started"),
                    SessionEvent::CaptureCompleted { photo, quad } => log::info!(
                        "captured {}x{} photo ({} bytes, outline={})",
                        photo.width,
                        photo.height,
                        photo.data.len(),
                        quad.is_some()
                    ),
                    SessionEvent::LensChanged { lens, origin } => {
                        log::info!("lens changed to {} ({:?})", lens, origin)
                    }
                    SessionEvent::SwitchRolledBack {
                        attempted,
                        restored,
                    } => log::warn!("switch to {} rolled back to {}", attempted, restored),
                    SessionEvent::Error(kind) => log::error!("session error: {:?}", kind),
                }
            }
        })?;
    Ok(handle)
}

fn join(handle: JoinHandle<()>, what: &str) -> Result<()> {
    handle
        .join()
        .map_err(|_| anyhow!("{} thread panicked", what))
}
