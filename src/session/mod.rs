//! Per-frame detection loop.
//!
//! `ScanSession::process_frame` is called once per camera frame from a
//! single frame thread. It runs the detector, scores the result, feeds the
//! adaptive switch controller and the stabilization funnel, and publishes
//! overlay updates. Anything that touches the camera hardware (lens
//! switches, focus, capture) is handed to the control thread; frames that
//! arrive while a switch or capture is in flight are dropped, not queued.

mod control;
mod events;

use std::sync::atomic::Ordering;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Instant;

use crate::camera::{CameraManager, CameraPreference};
use crate::detect::{DetectorConfig, QuadDetector};
use crate::error::{ScanError, ScanResult};
use crate::frame::Frame;
use crate::funnel::{FunnelDecision, StabilizationFunnel};
use crate::geometry::{CoordinateSpace, Point, Quad, Size};
use crate::quality::{self, DetectionQualityScore, QualityConfig};
use crate::transform::{compose_display_transform, to_pixel_space};

use control::{ControlCommand, ControlHandle, SessionFlags};
pub use events::{SessionEvent, SessionStats, SwitchOrigin};

pub const DEFAULT_NO_DETECTION_THRESHOLD: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionConfig {
    pub detector: DetectorConfig,
    pub quality: QualityConfig,
    /// Consecutive empty frames tolerated before the overlay is cleared.
    pub no_detection_threshold: u32,
    pub auto_scan: bool,
    pub view_size: Size,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            quality: QualityConfig::default(),
            no_detection_threshold: DEFAULT_NO_DETECTION_THRESHOLD,
            auto_scan: true,
            view_size: Size::new(390.0, 844.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    CaptureInFlight,
    Switching,
}

/// What happened to one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameOutcome {
    /// Session stopped or failed; the frame was not looked at.
    Stopped,
    Dropped(DropReason),
    Detected {
        quality: DetectionQualityScore,
        decision: FunnelDecision,
        capture_triggered: bool,
    },
    NothingDetected {
        consecutive: u32,
        cleared: bool,
    },
}

/// Cloneable handle that asks a running session to stop, e.g. from a
/// signal handler.
#[derive(Clone, Debug)]
pub struct StopHandle(Arc<SessionFlags>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.stop.load(Ordering::SeqCst)
    }
}

pub struct ScanSession {
    config: SessionConfig,
    detector: Box<dyn QuadDetector>,
    funnel: Box<dyn StabilizationFunnel>,
    camera: Arc<Mutex<CameraManager>>,
    control: ControlHandle,
    events: Sender<SessionEvent>,
    flags: Arc<SessionFlags>,
    displayed: Option<Quad>,
    no_detection_count: u32,
    editing: bool,
    stats: SessionStats,
    stopped: bool,
}

impl ScanSession {
    /// Start the camera and the control thread.
    ///
    /// Authorization and input-device failures are reported on `events`
    /// once and returned.
    pub fn start(
        config: SessionConfig,
        mut camera: CameraManager,
        mut detector: Box<dyn QuadDetector>,
        funnel: Box<dyn StabilizationFunnel>,
        events: Sender<SessionEvent>,
    ) -> ScanResult<Self> {
        let lens = match camera.start() {
            Ok(lens) => lens,
            Err(e) => {
                log::error!("scan session failed to start: {}", e);
                let _ = events.send(SessionEvent::Error(e.kind()));
                return Err(e);
            }
        };
        if let Err(e) = detector.warm_up() {
            log::warn!("detector {} warm-up failed: {:#}", detector.name(), e);
        }

        let camera = Arc::new(Mutex::new(camera));
        let flags = Arc::new(SessionFlags::default());
        let control = ControlHandle::spawn(camera.clone(), events.clone(), flags.clone())?;
        log::info!(
            "scan session started: lens={} detector={} auto_scan={}",
            lens,
            detector.name(),
            config.auto_scan
        );

        Ok(Self {
            config,
            detector,
            funnel,
            camera,
            control,
            events,
            flags,
            displayed: None,
            no_detection_count: 0,
            editing: false,
            stats: SessionStats::default(),
            stopped: false,
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.flags.clone())
    }

    pub fn process_frame(&mut self, frame: &Frame) -> FrameOutcome {
        if self.stopped || self.flags.halted() {
            return FrameOutcome::Stopped;
        }
        if let Some(reason) = self.drop_reason() {
            self.stats.frames_dropped += 1;
            log::debug!("frame {} dropped: {:?}", frame.seq, reason);
            return FrameOutcome::Dropped(reason);
        }
        self.stats.frames_processed += 1;

        let detection = if frame.has_buffer() {
            match self.detector.detect(frame, &self.config.detector) {
                Ok(found) => found,
                Err(e) => {
                    log::debug!("detector error on frame {}: {:#}", frame.seq, e);
                    None
                }
            }
        } else {
            None
        };

        // A switch may have been requested while the detector ran.
        if self.flags.is_switching() {
            self.stats.frames_dropped += 1;
            return FrameOutcome::Dropped(DropReason::Switching);
        }

        match detection {
            Some(quad) if quad.is_valid() => self.on_detection(frame, quad),
            Some(_) => {
                log::debug!("frame {}: self-intersecting quad discarded", frame.seq);
                self.on_no_detection(frame)
            }
            None => self.on_no_detection(frame),
        }
    }

    fn drop_reason(&self) -> Option<DropReason> {
        if self.flags.capturing.load(Ordering::SeqCst) {
            Some(DropReason::CaptureInFlight)
        } else if self.flags.is_switching() {
            Some(DropReason::Switching)
        } else {
            None
        }
    }

    fn on_detection(&mut self, frame: &Frame, quad: Quad) -> FrameOutcome {
        self.stats.detections += 1;
        let frame_size = frame.size();
        let pixel = pixel_quad(&quad, frame_size);
        let quality = quality::score(&pixel, frame_size, &self.config.quality);
        log::debug!(
            "frame {} quality {:.3} (area {:.2}, aspect {:.2})",
            frame.seq,
            quality.value,
            quality.relative_area,
            quality.aspect_ratio
        );
        self.feed_controller(quality.value, frame.captured_at);
        self.no_detection_count = 0;
        if self.flags.halted() {
            return FrameOutcome::Stopped;
        }
        // This frame's own score started a switch: its outline belongs to
        // the outgoing lens, so it must not reach the overlay or a capture.
        if self.flags.is_switching() {
            self.stats.frames_dropped += 1;
            return FrameOutcome::Dropped(DropReason::Switching);
        }

        let (decision, smoothed) = match self.funnel.add(&quad, self.displayed.as_ref()) {
            Ok(result) => result,
            Err(e) => {
                log::debug!("funnel rejected frame {}: {:#}", frame.seq, e);
                (FunnelDecision::Ignore, quad)
            }
        };
        if decision == FunnelDecision::Ignore {
            return FrameOutcome::Detected {
                quality,
                decision,
                capture_triggered: false,
            };
        }

        self.displayed = Some(smoothed);
        let display = compose_display_transform(&smoothed, frame_size, self.config.view_size);
        self.emit(SessionEvent::DetectionUpdate {
            quad: Some(display),
            frame_size,
        });

        let capture_triggered = decision == FunnelDecision::ShowAndAutoScan
            && self.config.auto_scan
            && !self.editing
            && self.trigger_capture(Some(pixel_quad(&smoothed, frame_size)));

        FrameOutcome::Detected {
            quality,
            decision,
            capture_triggered,
        }
    }

    fn on_no_detection(&mut self, frame: &Frame) -> FrameOutcome {
        self.stats.no_detections += 1;
        self.feed_controller(DetectionQualityScore::NONE, frame.captured_at);
        self.no_detection_count = self.no_detection_count.saturating_add(1);

        // Fire once per dropout, on the first frame past the threshold.
        let cleared = self.no_detection_count == self.config.no_detection_threshold + 1;
        if cleared {
            log::debug!(
                "no detection for {} frames; clearing overlay",
                self.no_detection_count
            );
            self.funnel.reset_pass_count();
            self.displayed = None;
            self.emit(SessionEvent::DetectionUpdate {
                quad: None,
                frame_size: frame.size(),
            });
        }
        FrameOutcome::NothingDetected {
            consecutive: self.no_detection_count,
            cleared,
        }
    }

    /// Never blocks: if the control thread holds the camera, this frame's
    /// score is skipped.
    fn feed_controller(&mut self, score: f64, now: Instant) {
        let target = match self.camera.try_lock() {
            Ok(mut camera) => camera.plan_auto_switch(score, now),
            Err(TryLockError::WouldBlock) => {
                log::debug!("camera busy; quality sample skipped");
                return;
            }
            Err(TryLockError::Poisoned(_)) => {
                self.fail(ScanError::lock_poisoned("camera"));
                return;
            }
        };
        if let Some(target) = target {
            self.flags.begin_switch();
            match self.control.send(ControlCommand::AutoSwitch(target)) {
                Ok(()) => self.stats.auto_switches += 1,
                Err(_) => self.flags.end_switch(),
            }
        }
    }

    /// Returns false when a capture is already in flight.
    fn trigger_capture(&mut self, quad: Option<Quad>) -> bool {
        if self.flags.capturing.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.emit(SessionEvent::CaptureStarted);
        if self.control.send(ControlCommand::Capture { quad }).is_err() {
            self.flags.capturing.store(false, Ordering::SeqCst);
            return false;
        }
        self.stats.captures_triggered += 1;
        log::info!("capture triggered");
        true
    }

    /// Capture the currently displayed document now, regardless of auto-scan.
    pub fn capture_now(&mut self, frame_size: Size) -> ScanResult<bool> {
        self.ensure_running()?;
        let quad = self.displayed.map(|q| pixel_quad(&q, frame_size));
        Ok(self.trigger_capture(quad))
    }

    /// Switch to a specific lens, or hand lens choice back to the policy
    /// with `CameraPreference::Auto`.
    pub fn switch_camera(&mut self, preference: CameraPreference) -> ScanResult<()> {
        self.ensure_running()?;
        self.send_switch(ControlCommand::SwitchCamera(preference))
    }

    pub fn toggle_macro_mode(&mut self) -> ScanResult<()> {
        self.ensure_running()?;
        self.send_switch(ControlCommand::ToggleMacro)
    }

    /// Focus on a normalized point of the preview.
    pub fn set_focus_point(&mut self, point: Point) -> ScanResult<()> {
        self.ensure_running()?;
        self.control.send(ControlCommand::FocusPoint(point))
    }

    pub fn reset_focus_to_auto(&mut self) -> ScanResult<()> {
        self.ensure_running()?;
        self.control.send(ControlCommand::ResetFocus)
    }

    pub fn set_auto_scan(&mut self, enabled: bool) {
        self.config.auto_scan = enabled;
    }

    /// While editing, auto-scan never triggers a capture.
    pub fn set_editing(&mut self, editing: bool) {
        self.editing = editing;
    }

    pub fn set_view_size(&mut self, view_size: Size) {
        self.config.view_size = view_size;
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn displayed(&self) -> Option<&Quad> {
        self.displayed.as_ref()
    }

    pub fn is_running(&self) -> bool {
        !self.stopped && !self.flags.halted()
    }

    /// Camera manager shared with the control thread.
    pub fn camera(&self) -> Arc<Mutex<CameraManager>> {
        self.camera.clone()
    }

    /// Stop processing, let any dispatched switch finish, then release the
    /// camera. Safe to call more than once.
    pub fn stop(&mut self) -> ScanResult<SessionStats> {
        if self.stopped {
            return Ok(self.stats);
        }
        self.stopped = true;
        self.flags.stop.store(true, Ordering::SeqCst);
        let joined = self.control.shutdown();
        match self.camera.lock() {
            Ok(mut camera) => camera.stop(),
            Err(_) => return Err(ScanError::lock_poisoned("camera")),
        }
        joined?;
        log::info!(
            "scan session stopped: processed={} dropped={} auto_switches={} captures={}",
            self.stats.frames_processed,
            self.stats.frames_dropped,
            self.stats.auto_switches,
            self.stats.captures_triggered
        );
        Ok(self.stats)
    }

    fn ensure_running(&self) -> ScanResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(ScanError::Stopped)
        }
    }

    fn send_switch(&self, command: ControlCommand) -> ScanResult<()> {
        self.flags.begin_switch();
        let sent = self.control.send(command);
        if sent.is_err() {
            self.flags.end_switch();
        }
        sent
    }

    fn fail(&self, error: ScanError) {
        if self.flags.failed.swap(true, Ordering::SeqCst) {
            return;
        }
        log::error!("scan session failed: {}", error);
        self.emit(SessionEvent::Error(error.kind()));
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            log::debug!("presentation channel closed; event dropped");
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("scan session teardown: {}", e);
        }
    }
}

fn pixel_quad(quad: &Quad, frame_size: Size) -> Quad {
    match quad.space {
        CoordinateSpace::DetectorNormalized => to_pixel_space(quad, frame_size),
        _ => *quad,
    }
}
