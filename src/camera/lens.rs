use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};

/// Physical back-facing lens category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LensType {
    Wide,
    UltraWide,
    Telephoto,
}

impl LensType {
    /// Fixed priority ring used for both fallback order and auto-switching.
    pub const RING: [LensType; 3] = [LensType::Wide, LensType::UltraWide, LensType::Telephoto];

    pub fn as_str(&self) -> &'static str {
        match self {
            LensType::Wide => "wide",
            LensType::UltraWide => "ultra_wide",
            LensType::Telephoto => "telephoto",
        }
    }

    fn ring_index(&self) -> usize {
        match self {
            LensType::Wide => 0,
            LensType::UltraWide => 1,
            LensType::Telephoto => 2,
        }
    }

    /// The ring entry after this one, wrapping.
    pub fn ring_successor(&self) -> LensType {
        Self::RING[(self.ring_index() + 1) % Self::RING.len()]
    }
}

impl fmt::Display for LensType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller asked for: a specific lens, or let the policy decide.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraPreference {
    #[default]
    Auto,
    Lens(LensType),
}

impl CameraPreference {
    pub fn is_auto(&self) -> bool {
        matches!(self, CameraPreference::Auto)
    }
}

impl FromStr for CameraPreference {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(CameraPreference::Auto),
            "wide" => Ok(CameraPreference::Lens(LensType::Wide)),
            "ultra_wide" | "ultrawide" | "ultra-wide" => {
                Ok(CameraPreference::Lens(LensType::UltraWide))
            }
            "telephoto" | "tele" => Ok(CameraPreference::Lens(LensType::Telephoto)),
            other => Err(anyhow!(
                "unknown camera type '{}' (expected auto, wide, ultra_wide, telephoto)",
                other
            )),
        }
    }
}

impl fmt::Display for CameraPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraPreference::Auto => f.write_str("auto"),
            CameraPreference::Lens(lens) => lens.fmt(f),
        }
    }
}

/// Static capability flags reported by the hardware at discovery time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LensCapabilities {
    pub continuous_autofocus: bool,
    pub single_shot_autofocus: bool,
    pub near_focus_restriction: bool,
    pub stabilization: bool,
    pub continuous_auto_exposure: bool,
}

/// Opaque platform identifier for the underlying device.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceHandle(pub String);

impl DeviceHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable description of one lens, tagged with its type at discovery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LensDescriptor {
    pub lens_type: LensType,
    pub capabilities: LensCapabilities,
    pub device: DeviceHandle,
}

/// Macro (near-focus) mode as the caller last left it.
///
/// `Unset` lets the telephoto lens restrict focus range on its own;
/// `Disabled` means the caller turned it off explicitly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MacroMode {
    #[default]
    Unset,
    Enabled,
    Disabled,
}

impl MacroMode {
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            MacroMode::Enabled
        } else {
            MacroMode::Unset
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            MacroMode::Enabled => MacroMode::Disabled,
            MacroMode::Unset | MacroMode::Disabled => MacroMode::Enabled,
        }
    }

    /// Whether near-focus restriction applies on `lens`.
    pub fn restricts_focus_on(self, lens: LensType) -> bool {
        match self {
            MacroMode::Enabled => true,
            MacroMode::Disabled => false,
            MacroMode::Unset => lens == LensType::Telephoto,
        }
    }
}
