//! Dedicated control thread.
//!
//! Lens switches, focus changes and photo captures block on the hardware
//! session, so they run here instead of on the frame thread. Commands are
//! handled strictly in order; a shutdown command is queued behind any
//! switch already dispatched, so that switch (and its rollback) finishes
//! before teardown.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crate::camera::{CameraManager, CameraPreference, LensType, SwitchOutcome};
use crate::error::{ScanError, ScanResult};
use crate::geometry::{Point, Quad};

use super::events::{SessionEvent, SwitchOrigin};

/// State shared between the frame thread and the control thread.
#[derive(Debug, Default)]
pub(crate) struct SessionFlags {
    pub stop: AtomicBool,
    /// Switch and macro commands dispatched but not yet finished.
    pub switches_pending: AtomicU32,
    pub capturing: AtomicBool,
    pub failed: AtomicBool,
}

impl SessionFlags {
    pub fn halted(&self) -> bool {
        self.stop.load(Ordering::SeqCst) || self.failed.load(Ordering::SeqCst)
    }

    pub fn is_switching(&self) -> bool {
        self.switches_pending.load(Ordering::SeqCst) > 0
    }

    pub fn begin_switch(&self) {
        self.switches_pending.fetch_add(1, Ordering::SeqCst);
    }

    pub fn end_switch(&self) {
        let _ = self
            .switches_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

#[derive(Debug)]
pub(crate) enum ControlCommand {
    AutoSwitch(LensType),
    SwitchCamera(CameraPreference),
    ToggleMacro,
    FocusPoint(Point),
    ResetFocus,
    Capture { quad: Option<Quad> },
    Shutdown,
}

#[derive(Debug)]
pub(crate) struct ControlHandle {
    tx: Sender<ControlCommand>,
    join: Option<JoinHandle<()>>,
}

impl ControlHandle {
    pub fn spawn(
        camera: Arc<Mutex<CameraManager>>,
        events: Sender<SessionEvent>,
        flags: Arc<SessionFlags>,
    ) -> ScanResult<Self> {
        let (tx, rx) = mpsc::channel();
        let join = std::thread::Builder::new()
            .name("scan-control".to_string())
            .spawn(move || ControlWorker { camera, events, flags }.run(rx))
            .map_err(|e| ScanError::InputDevice(format!("spawn control thread: {}", e)))?;
        Ok(Self {
            tx,
            join: Some(join),
        })
    }

    pub fn send(&self, command: ControlCommand) -> ScanResult<()> {
        self.tx.send(command).map_err(|_| ScanError::Stopped)
    }

    /// Queue a shutdown behind pending commands and wait for the thread.
    pub fn shutdown(&mut self) -> ScanResult<()> {
        let Some(join) = self.join.take() else {
            return Ok(());
        };
        // The worker may already be gone after a fatal error.
        let _ = self.tx.send(ControlCommand::Shutdown);
        join.join()
            .map_err(|_| ScanError::InputDevice("control thread panicked".to_string()))
    }
}

struct ControlWorker {
    camera: Arc<Mutex<CameraManager>>,
    events: Sender<SessionEvent>,
    flags: Arc<SessionFlags>,
}

impl ControlWorker {
    fn run(self, rx: Receiver<ControlCommand>) {
        for command in rx {
            log::debug!("control command {:?}", command);
            match command {
                ControlCommand::Shutdown => break,
                ControlCommand::AutoSwitch(target) => {
                    let result = self.lock().and_then(|mut cam| cam.apply_auto_switch(target));
                    self.flags.end_switch();
                    self.report_switch(result, SwitchOrigin::Controller);
                }
                ControlCommand::SwitchCamera(preference) => {
                    let result = self.lock().and_then(|mut cam| cam.switch_camera(preference));
                    self.flags.end_switch();
                    self.report_switch(result, SwitchOrigin::Caller);
                }
                ControlCommand::ToggleMacro => {
                    let result = self.lock().and_then(|mut cam| cam.toggle_macro_mode());
                    self.flags.end_switch();
                    if let Err(e) = result {
                        self.fail(e);
                    }
                }
                ControlCommand::FocusPoint(point) => {
                    if let Err(e) = self.lock().and_then(|mut cam| cam.set_focus_point(point)) {
                        self.fail(e);
                    }
                }
                ControlCommand::ResetFocus => {
                    if let Err(e) = self.lock().and_then(|mut cam| cam.reset_focus_to_auto()) {
                        self.fail(e);
                    }
                }
                ControlCommand::Capture { quad } => {
                    let result = self.lock().and_then(|mut cam| cam.capture_photo());
                    self.flags.capturing.store(false, Ordering::SeqCst);
                    match result {
                        Ok(photo) => self.emit(SessionEvent::CaptureCompleted { photo, quad }),
                        Err(e) if !e.is_fatal() => {
                            log::warn!("capture failed: {}", e);
                            self.emit(SessionEvent::Error(e.kind()));
                        }
                        Err(e) => self.fail(e),
                    }
                }
            }
        }
        log::debug!("control thread exiting");
    }

    fn lock(&self) -> ScanResult<MutexGuard<'_, CameraManager>> {
        self.camera
            .lock()
            .map_err(|_| ScanError::lock_poisoned("camera"))
    }

    fn report_switch(&self, result: ScanResult<SwitchOutcome>, origin: SwitchOrigin) {
        match result {
            Ok(SwitchOutcome::Switched { from, to }) => {
                if from != Some(to) {
                    self.emit(SessionEvent::LensChanged { lens: to, origin });
                }
            }
            Ok(SwitchOutcome::RolledBack {
                attempted,
                restored,
                reason,
            }) => {
                log::warn!(
                    "switch to {} rolled back to {}: {}",
                    attempted,
                    restored,
                    reason
                );
                self.emit(SessionEvent::SwitchRolledBack {
                    attempted,
                    restored,
                });
            }
            Err(e) => self.fail(e),
        }
    }

    /// Fatal errors halt detection and are reported once.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switching_holds_until_every_queued_switch_finishes() {
        let flags = SessionFlags::default();
        flags.begin_switch();
        flags.begin_switch();
        flags.end_switch();
        assert!(flags.is_switching());
        flags.end_switch();
        assert!(!flags.is_switching());
        flags.end_switch();
        assert_eq!(flags.switches_pending.load(Ordering::SeqCst), 0);
    }
}
