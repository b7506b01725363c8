//! Lens inventory, selection policy and adaptive switching.
//!
//! - `lens`: lens tags, capabilities and descriptors
//! - `inventory`: snapshot of back-facing lenses at session start
//! - `evaluator`: static suitability score per lens
//! - `selection`: initial choice and ring-order next lens
//! - `capture`: hardware session boundary and the switch transaction
//! - `controller`: quality history, cooldown, switch decisions
//! - `manager`: single owner tying the above together
//! - `simulated`: in-process hardware for the daemon and tests

pub mod capture;
pub mod controller;
pub mod evaluator;
pub mod inventory;
pub mod lens;
pub mod manager;
pub mod selection;
pub mod simulated;

pub use capture::{
    switch_input, CaptureSession, CapturedPhoto, ExposureMode, FocusMode, FocusSettings,
    SwitchOutcome,
};
pub use controller::{
    AdaptiveSwitchController, ControllerConfig, ControllerState, QualityHistory, SwitchCooldown,
};
pub use evaluator::suitability;
pub use inventory::{CameraInventory, DevicePosition, DeviceProvider, DiscoveredDevice};
pub use lens::{
    CameraPreference, DeviceHandle, LensCapabilities, LensDescriptor, LensType, MacroMode,
};
pub use manager::{CameraManager, SelectionState};
pub use selection::{select_initial, select_next};
pub use simulated::{SimulatedProvider, SimulatedSession};
