//! Single owner of lens state and the hardware capture session.
//!
//! Every read-modify-write of quality history, cooldown and selection, and
//! every hardware reconfiguration, goes through `&mut CameraManager`. The
//! session wraps it in a mutex and drives reconfigurations from one
//! control thread, so no two reconfigurations ever overlap.

use std::time::Instant;

use super::capture::{
    switch_input, CaptureSession, CapturedPhoto, FocusMode, FocusSettings, SwitchOutcome,
};
use super::controller::{AdaptiveSwitchController, ControllerConfig};
use super::inventory::CameraInventory;
use super::lens::{CameraPreference, LensDescriptor, LensType, MacroMode};
use super::selection::{select_initial, select_next};
use crate::error::{ScanError, ScanResult};
use crate::geometry::Point;

/// Active lens, caller preference and macro mode.
#[derive(Clone, Debug, Default)]
pub struct SelectionState {
    pub active: Option<LensDescriptor>,
    pub preference: CameraPreference,
    pub macro_mode: MacroMode,
}

impl SelectionState {
    pub fn active_type(&self) -> Option<LensType> {
        self.active.as_ref().map(|lens| lens.lens_type)
    }
}

pub struct CameraManager {
    session: Box<dyn CaptureSession>,
    inventory: CameraInventory,
    selection: SelectionState,
    controller: AdaptiveSwitchController,
    running: bool,
}

impl CameraManager {
    pub fn new(
        session: Box<dyn CaptureSession>,
        inventory: CameraInventory,
        preference: CameraPreference,
        macro_mode: MacroMode,
        controller: ControllerConfig,
    ) -> Self {
        Self {
            session,
            inventory,
            selection: SelectionState {
                active: None,
                preference,
                macro_mode,
            },
            controller: AdaptiveSwitchController::new(controller),
            running: false,
        }
    }

    /// Pick the initial lens, attach it and start the hardware session.
    pub fn start(&mut self) -> ScanResult<LensType> {
        if !self.session.is_authorized() {
            log::error!("camera access not authorized");
            return Err(ScanError::Authorization);
        }
        let lens = select_initial(&self.inventory, self.selection.preference)
            .cloned()
            .ok_or_else(|| ScanError::InputDevice("no usable camera found".to_string()))?;

        switch_input(
            self.session.as_mut(),
            None,
            &lens,
            self.selection.macro_mode,
        )?;
        if let Err(e) = self.session.start_running() {
            self.session.begin_configuration();
            self.session.remove_input(&lens);
            self.session.commit_configuration();
            return Err(ScanError::InputDevice(format!("start session: {:#}", e)));
        }

        log::info!(
            "camera started on {} ({}) preference={}",
            lens.lens_type,
            lens.device,
            self.selection.preference
        );
        let lens_type = lens.lens_type;
        self.selection.active = Some(lens);
        self.controller.on_lens_changed();
        self.running = true;
        Ok(lens_type)
    }

    /// Detach the input and stop the hardware session.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        if let Some(active) = self.selection.active.take() {
            self.session.begin_configuration();
            self.session.remove_input(&active);
            self.session.commit_configuration();
        }
        self.session.stop_running();
        self.controller.on_lens_changed();
        self.running = false;
        log::info!("camera stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Feed one frame's quality. Returns the lens to switch to when the
    /// controller decides the active lens is persistently poor.
    ///
    /// The cooldown is recorded here, at decision time, so a second
    /// decision cannot be made while the first switch is being applied.
    pub fn plan_auto_switch(&mut self, score: f64, now: Instant) -> Option<LensType> {
        let auto_mode = self.selection.preference.is_auto();
        if !self.controller.observe(score, auto_mode, now) {
            return None;
        }
        let current = self.selection.active_type()?;
        let target = select_next(&self.inventory, current);
        if target == current {
            log::debug!("no alternative to {} in inventory", current);
            self.controller.on_lens_changed();
            return None;
        }
        self.controller.record_switch(now);
        Some(target)
    }

    /// Apply a switch decided by `plan_auto_switch`. Preference stays auto.
    pub fn apply_auto_switch(&mut self, target: LensType) -> ScanResult<SwitchOutcome> {
        log::info!("auto-switching lens to {}", target);
        self.perform_switch(target)
    }

    /// Plan and apply in one step.
    pub fn record_quality(&mut self, score: f64, now: Instant) -> ScanResult<Option<SwitchOutcome>> {
        match self.plan_auto_switch(score, now) {
            Some(target) => self.apply_auto_switch(target).map(Some),
            None => Ok(None),
        }
    }

    /// Caller-requested camera.
    ///
    /// A present lens pins the preference to it, disabling auto-switching.
    /// `Auto` hands selection back to the policy and moves to the lens it
    /// picks. A lens that is not present leaves preference and hardware as
    /// they are.
    pub fn switch_camera(&mut self, preference: CameraPreference) -> ScanResult<SwitchOutcome> {
        let target = match preference {
            CameraPreference::Lens(lens) if !self.inventory.contains(lens) => {
                log::warn!("requested lens {} is not present", lens);
                let current = self.active_lens().ok_or_else(|| {
                    ScanError::InputDevice("no active lens to switch from".to_string())
                })?;
                return Ok(SwitchOutcome::RolledBack {
                    attempted: lens,
                    restored: current,
                    reason: "lens not present".to_string(),
                });
            }
            CameraPreference::Lens(lens) => lens,
            CameraPreference::Auto => select_initial(&self.inventory, CameraPreference::Auto)
                .map(|lens| lens.lens_type)
                .ok_or_else(|| ScanError::InputDevice("no usable camera found".to_string()))?,
        };
        self.selection.preference = preference;
        log::info!("switching lens to {} on request ({})", target, preference);
        self.perform_switch(target)
    }

    /// Change the preference without switching now.
    pub fn set_preference(&mut self, preference: CameraPreference) {
        self.selection.preference = preference;
    }

    pub fn toggle_macro_mode(&mut self) -> ScanResult<MacroMode> {
        self.selection.macro_mode = self.selection.macro_mode.toggled();
        if let Some(active) = self.selection.active.clone() {
            let settings = FocusSettings::for_lens(&active, self.selection.macro_mode);
            self.reconfigure(&active, &settings)?;
        }
        log::info!("macro mode now {:?}", self.selection.macro_mode);
        Ok(self.selection.macro_mode)
    }

    /// Single-shot autofocus at a normalized point of interest.
    pub fn set_focus_point(&mut self, point: Point) -> ScanResult<()> {
        let Some(active) = self.selection.active.clone() else {
            return Ok(());
        };
        let mut settings =
            FocusSettings::for_lens(&active, self.selection.macro_mode).with_point_of_interest(point);
        settings.focus = FocusMode::SingleShotAuto;
        self.reconfigure(&active, &settings)
    }

    pub fn reset_focus_to_auto(&mut self) -> ScanResult<()> {
        let Some(active) = self.selection.active.clone() else {
            return Ok(());
        };
        let settings = FocusSettings::for_lens(&active, self.selection.macro_mode);
        self.reconfigure(&active, &settings)
    }

    pub fn capture_photo(&mut self) -> ScanResult<CapturedPhoto> {
        if !self.running {
            return Err(ScanError::Stopped);
        }
        let photo = self
            .session
            .capture_photo()
            .map_err(|e| ScanError::Capture(format!("{:#}", e)))?;
        if photo.data.is_empty() {
            return Err(ScanError::Capture("no image data".to_string()));
        }
        Ok(photo)
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn active_lens(&self) -> Option<LensType> {
        self.selection.active_type()
    }

    pub fn inventory(&self) -> &CameraInventory {
        &self.inventory
    }

    pub fn controller(&self) -> &AdaptiveSwitchController {
        &self.controller
    }

    fn perform_switch(&mut self, target: LensType) -> ScanResult<SwitchOutcome> {
        let current = self
            .selection
            .active
            .clone()
            .ok_or_else(|| ScanError::InputDevice("no active lens to switch from".to_string()))?;
        if current.lens_type == target {
            return Ok(SwitchOutcome::Switched {
                from: Some(target),
                to: target,
            });
        }
        let Some(next) = self.inventory.get(target).cloned() else {
            log::warn!("requested lens {} is not present", target);
            return Ok(SwitchOutcome::RolledBack {
                attempted: target,
                restored: current.lens_type,
                reason: "lens not present".to_string(),
            });
        };

        let outcome = switch_input(
            self.session.as_mut(),
            Some(&current),
            &next,
            self.selection.macro_mode,
        );
        match &outcome {
            Ok(SwitchOutcome::Switched { .. }) => {
                log::info!("lens switched {} -> {}", current.lens_type, next.lens_type);
                self.selection.active = Some(next);
            }
            Ok(SwitchOutcome::RolledBack { .. }) => {}
            Err(e) => {
                log::error!("lens switch failed without recovery: {}", e);
                self.selection.active = None;
            }
        }
        self.controller.on_lens_changed();
        outcome
    }

    fn reconfigure(&mut self, lens: &LensDescriptor, settings: &FocusSettings) -> ScanResult<()> {
        self.session.begin_configuration();
        let result = self.session.configure_device(lens, settings);
        self.session.commit_configuration();
        result.map_err(|e| ScanError::InputDevice(format!("configure {}: {:#}", lens.device, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::capture::fake::{Call, FakeSession};
    use crate::camera::lens::{DeviceHandle, LensCapabilities};
    use std::time::Duration;

    fn lens(lens_type: LensType) -> LensDescriptor {
        LensDescriptor {
            lens_type,
            capabilities: LensCapabilities {
                continuous_autofocus: true,
                single_shot_autofocus: true,
                near_focus_restriction: true,
                stabilization: true,
                continuous_auto_exposure: true,
            },
            device: DeviceHandle::new(lens_type.as_str()),
        }
    }

    fn wide_tele() -> CameraInventory {
        CameraInventory::new()
            .with_lens(lens(LensType::Wide))
            .with_lens(lens(LensType::Telephoto))
    }

    fn manager(session: &FakeSession, inventory: CameraInventory) -> CameraManager {
        CameraManager::new(
            Box::new(session.clone()),
            inventory,
            CameraPreference::Auto,
            MacroMode::Unset,
            ControllerConfig::default(),
        )
    }

    #[test]
    fn start_attaches_initial_lens() {
        let session = FakeSession::default();
        let mut mgr = manager(&session, wide_tele());
        assert_eq!(mgr.start().unwrap(), LensType::Wide);
        assert_eq!(session.attached(), vec!["wide".to_string()]);
        assert!(session.calls().contains(&Call::Start));
    }

    #[test]
    fn start_without_cameras_is_input_device_error() {
        let session = FakeSession::default();
        let mut mgr = manager(&session, CameraInventory::new());
        assert!(matches!(mgr.start(), Err(ScanError::InputDevice(_))));
    }

    #[test]
    fn start_without_permission_is_authorization_error() {
        let session = FakeSession {
            denied: true,
            ..FakeSession::default()
        };
        let mut mgr = manager(&session, wide_tele());
        assert!(matches!(mgr.start(), Err(ScanError::Authorization)));
        assert!(session.calls().is_empty());
    }

    #[test]
    fn sustained_low_quality_switches_once_to_telephoto() {
        let session = FakeSession::default();
        let mut mgr = manager(&session, wide_tele());
        mgr.start().unwrap();
        let now = Instant::now();

        let mut outcomes = Vec::new();
        for _ in 0..10 {
            if let Some(outcome) = mgr.record_quality(0.1, now).unwrap() {
                outcomes.push(outcome);
            }
        }
        assert_eq!(
            outcomes,
            vec![SwitchOutcome::Switched {
                from: Some(LensType::Wide),
                to: LensType::Telephoto
            }]
        );
        assert_eq!(mgr.active_lens(), Some(LensType::Telephoto));
        assert!(mgr.controller().history().is_empty());
        assert_eq!(session.attached(), vec!["telephoto".to_string()]);
    }

    #[test]
    fn cooldown_holds_after_auto_switch() {
        let session = FakeSession::default();
        let mut mgr = manager(&session, wide_tele());
        mgr.start().unwrap();
        let start = Instant::now();
        for _ in 0..10 {
            mgr.record_quality(0.0, start).unwrap();
        }
        assert_eq!(mgr.active_lens(), Some(LensType::Telephoto));

        for i in 0..20 {
            let now = start + Duration::from_millis(100 * i);
            assert!(mgr.record_quality(0.0, now).unwrap().is_none());
        }
        let later = start + Duration::from_secs(11);
        let mut switched = None;
        for _ in 0..10 {
            if let Some(o) = mgr.record_quality(0.0, later).unwrap() {
                switched = Some(o);
            }
        }
        assert_eq!(switched.map(|o| o.active()), Some(LensType::Wide));
    }

    #[test]
    fn pinned_preference_disables_auto_switch() {
        let session = FakeSession::default();
        let mut mgr = manager(&session, wide_tele());
        mgr.start().unwrap();
        mgr.set_preference(CameraPreference::Lens(LensType::Wide));
        let now = Instant::now();
        for _ in 0..30 {
            assert!(mgr.record_quality(0.0, now).unwrap().is_none());
        }
    }

    #[test]
    fn explicit_switch_pins_preference_and_clears_history() {
        let session = FakeSession::default();
        let mut mgr = manager(&session, wide_tele());
        mgr.start().unwrap();
        let now = Instant::now();
        for _ in 0..5 {
            mgr.record_quality(0.9, now).unwrap();
        }
        let outcome = mgr.switch_camera(CameraPreference::Lens(LensType::Telephoto)).unwrap();
        assert_eq!(outcome.active(), LensType::Telephoto);
        assert_eq!(
            mgr.selection().preference,
            CameraPreference::Lens(LensType::Telephoto)
        );
        assert!(mgr.controller().history().is_empty());
    }

    #[test]
    fn failed_switch_keeps_previous_lens() {
        let session = FakeSession::default();
        session.fail_add_for("telephoto");
        let mut mgr = manager(&session, wide_tele());
        mgr.start().unwrap();
        let outcome = mgr.switch_camera(CameraPreference::Lens(LensType::Telephoto)).unwrap();
        assert!(matches!(outcome, SwitchOutcome::RolledBack { .. }));
        assert_eq!(mgr.active_lens(), Some(LensType::Wide));
        assert_eq!(session.attached(), vec!["wide".to_string()]);
    }

    #[test]
    fn absent_lens_request_leaves_hardware_alone() {
        let session = FakeSession::default();
        let mut mgr = manager(&session, wide_tele());
        mgr.start().unwrap();
        let before = session.calls().len();
        let outcome = mgr
            .switch_camera(CameraPreference::Lens(LensType::UltraWide))
            .unwrap();
        assert_eq!(outcome.active(), LensType::Wide);
        assert_eq!(session.calls().len(), before);
        assert_eq!(mgr.selection().preference, CameraPreference::Auto);
    }

    #[test]
    fn auto_request_restores_policy_lens_and_auto_switching() {
        let session = FakeSession::default();
        let mut mgr = manager(&session, wide_tele());
        mgr.start().unwrap();
        mgr.switch_camera(CameraPreference::Lens(LensType::Telephoto))
            .unwrap();
        assert_eq!(mgr.active_lens(), Some(LensType::Telephoto));

        let outcome = mgr.switch_camera(CameraPreference::Auto).unwrap();
        assert_eq!(
            outcome,
            SwitchOutcome::Switched {
                from: Some(LensType::Telephoto),
                to: LensType::Wide
            }
        );
        assert_eq!(mgr.selection().preference, CameraPreference::Auto);

        let now = Instant::now();
        let mut switched = None;
        for _ in 0..10 {
            if let Some(o) = mgr.record_quality(0.0, now).unwrap() {
                switched = Some(o.active());
            }
        }
        assert_eq!(switched, Some(LensType::Telephoto));
    }

    #[test]
    fn start_failure_detaches_the_attached_lens() {
        let session = FakeSession::default();
        *session.fail_start.lock().unwrap() = true;
        let mut mgr = manager(&session, wide_tele());
        assert!(matches!(mgr.start(), Err(ScanError::InputDevice(_))));
        assert!(!mgr.is_running());
        assert!(session.attached().is_empty());
        assert_eq!(mgr.active_lens(), None);
    }

    #[test]
    fn macro_toggle_reconfigures_active_lens() {
        let session = FakeSession::default();
        let mut mgr = manager(&session, wide_tele());
        mgr.start().unwrap();
        assert_eq!(mgr.toggle_macro_mode().unwrap(), MacroMode::Enabled);
        let last_configure = session
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Configure(_, s) => Some(s),
                _ => None,
            })
            .last()
            .unwrap();
        assert!(last_configure.near_focus_restriction);
    }

    #[test]
    fn focus_point_uses_single_shot_autofocus() {
        let session = FakeSession::default();
        let mut mgr = manager(&session, wide_tele());
        mgr.start().unwrap();
        mgr.set_focus_point(Point::new(0.25, 0.75)).unwrap();
        mgr.reset_focus_to_auto().unwrap();
        let configured: Vec<FocusSettings> = session
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Configure(_, s) => Some(s),
                _ => None,
            })
            .collect();
        let n = configured.len();
        assert_eq!(configured[n - 2].focus, FocusMode::SingleShotAuto);
        assert_eq!(configured[n - 2].point_of_interest, Some(Point::new(0.25, 0.75)));
        assert_eq!(configured[n - 1].focus, FocusMode::ContinuousAuto);
        assert_eq!(configured[n - 1].point_of_interest, None);
    }

    #[test]
    fn capture_failure_is_reported_as_capture_error() {
        let session = FakeSession::default();
        let mut mgr = manager(&session, wide_tele());
        mgr.start().unwrap();
        assert!(mgr.capture_photo().is_ok());
        *session.fail_capture.lock().unwrap() = true;
        assert!(matches!(mgr.capture_photo(), Err(ScanError::Capture(_))));
    }

    #[test]
    fn stop_detaches_input() {
        let session = FakeSession::default();
        let mut mgr = manager(&session, wide_tele());
        mgr.start().unwrap();
        mgr.stop();
        assert!(session.attached().is_empty());
        assert!(session.calls().contains(&Call::Stop));
        assert!(matches!(mgr.capture_photo(), Err(ScanError::Stopped)));
    }
}
