use super::lens::{LensDescriptor, LensType};

const BASE_SCORE: f64 = 0.5;
const CONTINUOUS_AF_BONUS: f64 = 0.2;
const NEAR_FOCUS_BONUS: f64 = 0.1;
const STABILIZATION_BONUS: f64 = 0.1;

fn lens_type_bonus(lens: LensType) -> f64 {
    match lens {
        LensType::Wide => 0.1,
        LensType::UltraWide => 0.05,
        LensType::Telephoto => 0.05,
    }
}

/// Static fitness of a lens for document scanning, in [0, 1].
pub fn suitability(lens: &LensDescriptor) -> f64 {
    let caps = &lens.capabilities;
    let mut score = BASE_SCORE;
    if caps.continuous_autofocus {
        score += CONTINUOUS_AF_BONUS;
    }
    if caps.near_focus_restriction {
        score += NEAR_FOCUS_BONUS;
    }
    if caps.stabilization {
        score += STABILIZATION_BONUS;
    }
    score += lens_type_bonus(lens.lens_type);
    score.min(1.0)
}
