mod backend;
mod backends;
mod result;

pub use backend::{DetectorConfig, QuadDetector};
pub use backends::{StubDetector, SyntheticDetector};
pub use result::{select_best, RectangleObservation};
