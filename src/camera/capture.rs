//! Hardware capture-session boundary and the lens-switch transaction.
//!
//! A lens switch is a two-phase resource transaction:
//! 1. acquire: detach the current input, attach the new one, configure it;
//! 2. on any acquire failure, release what was attached and re-attach the
//!    previous lens.
//!
//! The session is never left without an input unless the rollback itself
//! fails, which is reported as a fatal input-device error.

use anyhow::Result;

use super::lens::{LensDescriptor, LensType, MacroMode};
use crate::error::{ScanError, ScanResult};
use crate::geometry::Point;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusMode {
    ContinuousAuto,
    SingleShotAuto,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExposureMode {
    ContinuousAuto,
    Unchanged,
}

/// Device configuration applied after an input is attached.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FocusSettings {
    pub focus: FocusMode,
    pub exposure: ExposureMode,
    pub near_focus_restriction: bool,
    /// Normalized (0..1) point of interest, `None` for the device default.
    pub point_of_interest: Option<Point>,
}

impl FocusSettings {
    /// Scanning defaults for `lens`: continuous autofocus when available,
    /// continuous exposure, near-focus restriction per macro mode.
    pub fn for_lens(lens: &LensDescriptor, macro_mode: MacroMode) -> Self {
        let caps = &lens.capabilities;
        let focus = if caps.continuous_autofocus {
            FocusMode::ContinuousAuto
        } else {
            FocusMode::SingleShotAuto
        };
        let exposure = if caps.continuous_auto_exposure {
            ExposureMode::ContinuousAuto
        } else {
            ExposureMode::Unchanged
        };
        Self {
            focus,
            exposure,
            near_focus_restriction: caps.near_focus_restriction
                && macro_mode.restricts_focus_on(lens.lens_type),
            point_of_interest: None,
        }
    }

    pub fn with_point_of_interest(mut self, point: Point) -> Self {
        self.point_of_interest = Some(point);
        self
    }
}

/// Encoded photo returned by the hardware.
#[derive(Clone, Debug, PartialEq)]
pub struct CapturedPhoto {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Hardware capture session. Implemented by the platform layer; the core
/// only calls into it.
pub trait CaptureSession: Send {
    /// Whether camera access has been granted.
    fn is_authorized(&self) -> bool {
        true
    }

    fn begin_configuration(&mut self);

    fn commit_configuration(&mut self);

    fn add_input(&mut self, lens: &LensDescriptor) -> Result<()>;

    fn remove_input(&mut self, lens: &LensDescriptor);

    /// Lock the device and apply focus/exposure settings.
    fn configure_device(&mut self, lens: &LensDescriptor, settings: &FocusSettings) -> Result<()>;

    fn start_running(&mut self) -> Result<()>;

    fn stop_running(&mut self);

    fn capture_photo(&mut self) -> Result<CapturedPhoto>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum SwitchOutcome {
    Switched {
        from: Option<LensType>,
        to: LensType,
    },
    /// The new lens could not be acquired; the previous one is back in place.
    RolledBack {
        attempted: LensType,
        restored: LensType,
        reason: String,
    },
}

impl SwitchOutcome {
    /// Lens attached to the session after the transaction.
    pub fn active(&self) -> LensType {
        match self {
            SwitchOutcome::Switched { to, .. } => *to,
            SwitchOutcome::RolledBack { restored, .. } => *restored,
        }
    }
}

struct AcquireFailure {
    input_attached: bool,
    reason: String,
}

/// Replace `current` with `next` on `session`, rolling back on failure.
///
/// With no `current` (initial setup) there is nothing to restore and an
/// acquire failure is an input-device error.
pub fn switch_input(
    session: &mut dyn CaptureSession,
    current: Option<&LensDescriptor>,
    next: &LensDescriptor,
    macro_mode: MacroMode,
) -> ScanResult<SwitchOutcome> {
    session.begin_configuration();
    let result = match acquire(session, current, next, macro_mode) {
        Ok(()) => Ok(SwitchOutcome::Switched {
            from: current.map(|lens| lens.lens_type),
            to: next.lens_type,
        }),
        Err(failure) => rollback(session, current, next, macro_mode, failure),
    };
    session.commit_configuration();
    result
}

fn acquire(
    session: &mut dyn CaptureSession,
    current: Option<&LensDescriptor>,
    next: &LensDescriptor,
    macro_mode: MacroMode,
) -> std::result::Result<(), AcquireFailure> {
    if let Some(previous) = current {
        session.remove_input(previous);
    }
    session.add_input(next).map_err(|e| AcquireFailure {
        input_attached: false,
        reason: format!("add input {}: {:#}", next.device, e),
    })?;
    let settings = FocusSettings::for_lens(next, macro_mode);
    session
        .configure_device(next, &settings)
        .map_err(|e| AcquireFailure {
            input_attached: true,
            reason: format!("configure {}: {:#}", next.device, e),
        })?;
    Ok(())
}

fn rollback(
    session: &mut dyn CaptureSession,
    current: Option<&LensDescriptor>,
    next: &LensDescriptor,
    macro_mode: MacroMode,
    failure: AcquireFailure,
) -> ScanResult<SwitchOutcome> {
    if failure.input_attached {
        session.remove_input(next);
    }
    let Some(previous) = current else {
        return Err(ScanError::InputDevice(failure.reason));
    };
    log::warn!(
        "switch to {} failed ({}); restoring {}",
        next.lens_type,
        failure.reason,
        previous.lens_type
    );
    let restore_failed = |e: anyhow::Error| ScanError::SwitchRollback {
        attempted: next.lens_type,
        previous: previous.lens_type,
        reason: format!("{}; restore: {:#}", failure.reason, e),
    };
    session.add_input(previous).map_err(restore_failed)?;
    let settings = FocusSettings::for_lens(previous, macro_mode);
    if let Err(e) = session.configure_device(previous, &settings) {
        session.remove_input(previous);
        return Err(restore_failed(e));
    }
    Ok(SwitchOutcome::RolledBack {
        attempted: next.lens_type,
        restored: previous.lens_type,
        reason: failure.reason,
    })
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use anyhow::anyhow;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Debug, PartialEq)]
    pub enum Call {
        Begin,
        Commit,
        Add(String),
        Remove(String),
        Configure(String, FocusSettings),
        Start,
        Stop,
        Capture,
    }

    /// Capture session that records every call and fails on request.
    #[derive(Clone, Default)]
    pub struct FakeSession {
        pub calls: Arc<Mutex<Vec<Call>>>,
        pub fail_add: Arc<Mutex<HashSet<String>>>,
        pub fail_configure: Arc<Mutex<HashSet<String>>>,
        pub fail_capture: Arc<Mutex<bool>>,
        pub fail_start: Arc<Mutex<bool>>,
        pub denied: bool,
    }

    impl FakeSession {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn fail_add_for(&self, device: &str) {
            self.fail_add.lock().unwrap().insert(device.to_string());
        }

        pub fn fail_configure_for(&self, device: &str) {
            self.fail_configure.lock().unwrap().insert(device.to_string());
        }

        pub fn attached(&self) -> Vec<String> {
            let mut attached = Vec::new();
            for call in self.calls() {
                match call {
                    Call::Add(d) => attached.push(d),
                    Call::Remove(d) => attached.retain(|a| a != &d),
                    _ => {}
                }
            }
            attached
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl CaptureSession for FakeSession {
        fn is_authorized(&self) -> bool {
            !self.denied
        }

        fn begin_configuration(&mut self) {
            self.record(Call::Begin);
        }

        fn commit_configuration(&mut self) {
            self.record(Call::Commit);
        }

        fn add_input(&mut self, lens: &LensDescriptor) -> Result<()> {
            if self.fail_add.lock().unwrap().contains(lens.device.as_str()) {
                return Err(anyhow!("device busy"));
            }
            self.record(Call::Add(lens.device.0.clone()));
            Ok(())
        }

        fn remove_input(&mut self, lens: &LensDescriptor) {
            self.record(Call::Remove(lens.device.0.clone()));
        }

        fn configure_device(
            &mut self,
            lens: &LensDescriptor,
            settings: &FocusSettings,
        ) -> Result<()> {
            if self
                .fail_configure
                .lock()
                .unwrap()
                .contains(lens.device.as_str())
            {
                return Err(anyhow!("lock for configuration failed"));
            }
            self.record(Call::Configure(lens.device.0.clone(), *settings));
            Ok(())
        }

        fn start_running(&mut self) -> Result<()> {
            self.record(Call::Start);
            if *self.fail_start.lock().unwrap() {
                return Err(anyhow!("session interrupted"));
            }
            Ok(())
        }

        fn stop_running(&mut self) {
            self.record(Call::Stop);
        }

        fn capture_photo(&mut self) -> Result<CapturedPhoto> {
            self.record(Call::Capture);
            if *self.fail_capture.lock().unwrap() {
                return Err(anyhow!("no image data"));
            }
            Ok(CapturedPhoto {
                data: vec![0xff, 0xd8, 0xff],
                width: 4032,
                height: 3024,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{Call, FakeSession};
    use super::*;
    use crate::camera::lens::{DeviceHandle, LensCapabilities};

    fn lens(lens_type: LensType) -> LensDescriptor {
        LensDescriptor {
            lens_type,
            capabilities: LensCapabilities {
                continuous_autofocus: lens_type != LensType::UltraWide,
                single_shot_autofocus: true,
                near_focus_restriction: true,
                stabilization: false,
                continuous_auto_exposure: true,
            },
            device: DeviceHandle::new(lens_type.as_str()),
        }
    }

    #[test]
    fn focus_settings_prefer_continuous_autofocus() {
        let wide = FocusSettings::for_lens(&lens(LensType::Wide), MacroMode::Unset);
        assert_eq!(wide.focus, FocusMode::ContinuousAuto);
        assert_eq!(wide.exposure, ExposureMode::ContinuousAuto);
        assert!(!wide.near_focus_restriction);

        let ultra = FocusSettings::for_lens(&lens(LensType::UltraWide), MacroMode::Unset);
        assert_eq!(ultra.focus, FocusMode::SingleShotAuto);
    }

    #[test]
    fn telephoto_restricts_focus_unless_macro_disabled() {
        let tele = lens(LensType::Telephoto);
        assert!(FocusSettings::for_lens(&tele, MacroMode::Unset).near_focus_restriction);
        assert!(!FocusSettings::for_lens(&tele, MacroMode::Disabled).near_focus_restriction);
        assert!(
            FocusSettings::for_lens(&lens(LensType::Wide), MacroMode::Enabled)
                .near_focus_restriction
        );
    }

    #[test]
    fn successful_switch_replaces_input() {
        let mut session = FakeSession::default();
        let wide = lens(LensType::Wide);
        let tele = lens(LensType::Telephoto);
        let outcome = switch_input(&mut session, Some(&wide), &tele, MacroMode::Unset).unwrap();
        assert_eq!(
            outcome,
            SwitchOutcome::Switched {
                from: Some(LensType::Wide),
                to: LensType::Telephoto
            }
        );
        let calls = session.calls();
        assert_eq!(calls.first(), Some(&Call::Begin));
        assert_eq!(calls.last(), Some(&Call::Commit));
        assert!(calls.contains(&Call::Remove("wide".into())));
        assert!(calls.contains(&Call::Add("telephoto".into())));
    }

    #[test]
    fn failed_add_restores_previous_lens() {
        let mut session = FakeSession::default();
        session.fail_add_for("telephoto");
        let wide = lens(LensType::Wide);
        let tele = lens(LensType::Telephoto);
        let outcome = switch_input(&mut session, Some(&wide), &tele, MacroMode::Unset).unwrap();
        assert_eq!(outcome.active(), LensType::Wide);
        assert!(matches!(outcome, SwitchOutcome::RolledBack { .. }));
        assert_eq!(session.attached(), vec!["wide".to_string()]);
        assert_eq!(session.calls().last(), Some(&Call::Commit));
    }

    #[test]
    fn failed_configure_releases_new_input() {
        let mut session = FakeSession::default();
        session.fail_configure_for("ultra_wide");
        let wide = lens(LensType::Wide);
        let ultra = lens(LensType::UltraWide);
        let outcome = switch_input(&mut session, Some(&wide), &ultra, MacroMode::Unset).unwrap();
        assert_eq!(outcome.active(), LensType::Wide);
        assert!(session.calls().contains(&Call::Remove("ultra_wide".into())));
        assert_eq!(session.attached(), vec!["wide".to_string()]);
    }

    #[test]
    fn failed_rollback_is_fatal() {
        let mut session = FakeSession::default();
        session.fail_add_for("telephoto");
        session.fail_add_for("wide");
        let wide = lens(LensType::Wide);
        let tele = lens(LensType::Telephoto);
        let err = switch_input(&mut session, Some(&wide), &tele, MacroMode::Unset).unwrap_err();
        assert!(matches!(err, ScanError::SwitchRollback { .. }));
        assert_eq!(session.calls().last(), Some(&Call::Commit));
    }

    #[test]
    fn initial_failure_has_nothing_to_restore() {
        let mut session = FakeSession::default();
        session.fail_add_for("wide");
        let err = switch_input(&mut session, None, &lens(LensType::Wide), MacroMode::Unset)
            .unwrap_err();
        assert!(matches!(err, ScanError::InputDevice(_)));
        assert!(session.attached().is_empty());
    }
}
