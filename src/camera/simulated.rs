//! In-process camera hardware for the daemon and integration tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::capture::{CaptureSession, CapturedPhoto, FocusSettings};
use super::inventory::{DevicePosition, DeviceProvider, DiscoveredDevice};
use super::lens::{DeviceHandle, LensCapabilities, LensDescriptor, LensType};

/// Back-facing lens rig: which lenses exist and what they can do.
#[derive(Clone, Debug)]
pub struct SimulatedProvider {
    devices: Vec<DiscoveredDevice>,
}

impl SimulatedProvider {
    pub fn new(lenses: &[LensType]) -> Self {
        let devices = lenses
            .iter()
            .map(|&lens| DiscoveredDevice {
                handle: DeviceHandle::new(format!("sim:{}", lens.as_str())),
                position: DevicePosition::Back,
                lens_type: Some(lens),
                capabilities: LensCapabilities {
                    continuous_autofocus: true,
                    single_shot_autofocus: true,
                    near_focus_restriction: lens == LensType::Telephoto,
                    stabilization: lens != LensType::UltraWide,
                    continuous_auto_exposure: true,
                },
            })
            .collect();
        Self { devices }
    }

    /// Wide, ultra-wide and telephoto.
    pub fn triple() -> Self {
        Self::new(&LensType::RING)
    }
}

impl DeviceProvider for SimulatedProvider {
    fn enumerate(&self) -> Result<Vec<DiscoveredDevice>> {
        Ok(self.devices.clone())
    }
}

#[derive(Debug, Default)]
struct SessionState {
    running: bool,
    attached: Vec<String>,
    configured: Vec<(String, FocusSettings)>,
    captures: u64,
    failing_devices: HashSet<String>,
    fail_capture: bool,
    denied: bool,
}

/// Capture session backed by shared state. Clones observe the same state,
/// so a test can keep one clone while the session owns another.
#[derive(Clone, Debug, Default)]
pub struct SimulatedSession {
    state: Arc<Mutex<SessionState>>,
}

impl SimulatedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny_access(&self) {
        self.with(|s| s.denied = true);
    }

    /// Make `add_input` fail for the given lens.
    pub fn fail_lens(&self, lens: LensType) {
        self.with(|s| {
            s.failing_devices.insert(format!("sim:{}", lens.as_str()));
        });
    }

    pub fn fail_captures(&self, fail: bool) {
        self.with(|s| s.fail_capture = fail);
    }

    pub fn attached(&self) -> Vec<String> {
        self.with(|s| s.attached.clone())
    }

    pub fn last_focus(&self) -> Option<FocusSettings> {
        self.with(|s| s.configured.last().map(|(_, settings)| *settings))
    }

    pub fn captures(&self) -> u64 {
        self.with(|s| s.captures)
    }

    pub fn is_running(&self) -> bool {
        self.with(|s| s.running)
    }

    fn with<T>(&self, f: impl FnOnce(&mut SessionState) -> T) -> T {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

impl CaptureSession for SimulatedSession {
    fn is_authorized(&self) -> bool {
        !self.with(|s| s.denied)
    }

    fn begin_configuration(&mut self) {}

    fn commit_configuration(&mut self) {}

    fn add_input(&mut self, lens: &LensDescriptor) -> Result<()> {
        let id = lens.device.as_str().to_string();
        self.with(|s| {
            if s.failing_devices.contains(&id) {
                return Err(anyhow!("device {} unavailable", id));
            }
            s.attached.push(id);
            Ok(())
        })
    }

    fn remove_input(&mut self, lens: &LensDescriptor) {
        let id = lens.device.as_str();
        self.with(|s| s.attached.retain(|a| a != id));
    }

    fn configure_device(&mut self, lens: &LensDescriptor, settings: &FocusSettings) -> Result<()> {
        let id = lens.device.as_str().to_string();
        self.with(|s| s.configured.push((id, *settings)));
        Ok(())
    }

    fn start_running(&mut self) -> Result<()> {
        self.with(|s| s.running = true);
        Ok(())
    }

    fn stop_running(&mut self) {
        self.with(|s| s.running = false);
    }

    fn capture_photo(&mut self) -> Result<CapturedPhoto> {
        self.with(|s| {
            if s.fail_capture {
                return Err(anyhow!("no image data"));
            }
            s.captures += 1;
            Ok(CapturedPhoto {
                data: vec![0xff, 0xd8, 0xff, 0xd9],
                width: 4032,
                height: 3024,
            })
        })
    }
}
