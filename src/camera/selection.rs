//! Lens selection policy.
//!
//! `select_initial` picks the lens a session starts on; `select_next`
//! walks the fixed priority ring when the switch controller asks for a
//! different lens.

use super::evaluator::suitability;
use super::inventory::CameraInventory;
use super::lens::{CameraPreference, LensDescriptor, LensType};

/// Minimum suitability for each lens in auto mode, in priority order.
pub const AUTO_THRESHOLDS: [(LensType, f64); 3] = [
    (LensType::Wide, 0.7),
    (LensType::UltraWide, 0.6),
    (LensType::Telephoto, 0.5),
];

/// Choose the starting lens. `None` means there is no usable camera at all.
pub fn select_initial(
    inventory: &CameraInventory,
    preference: CameraPreference,
) -> Option<&LensDescriptor> {
    match preference {
        CameraPreference::Lens(requested) => inventory
            .get(requested)
            .or_else(|| inventory.get(LensType::Wide))
            .or_else(|| inventory.system_default()),
        CameraPreference::Auto => {
            for (lens_type, threshold) in AUTO_THRESHOLDS {
                if let Some(lens) = inventory.get(lens_type) {
                    let score = suitability(lens);
                    log::debug!(
                        "lens {} suitability {:.2} (threshold {:.2})",
                        lens_type,
                        score,
                        threshold
                    );
                    if score >= threshold {
                        return Some(lens);
                    }
                }
            }
            LensType::RING
                .iter()
                .find_map(|lens_type| inventory.get(*lens_type))
                .or_else(|| inventory.system_default())
        }
    }
}

/// The ring entry after `current` that is present in the inventory.
///
/// Returns `current` when no other lens is present.
pub fn select_next(inventory: &CameraInventory, current: LensType) -> LensType {
    let mut candidate = current.ring_successor();
    for _ in 0..LensType::RING.len() {
        if inventory.contains(candidate) {
            return candidate;
        }
        candidate = candidate.ring_successor();
    }
    current
}
