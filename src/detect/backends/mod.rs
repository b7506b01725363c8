pub mod stub;
pub mod synthetic;

pub use stub::StubDetector;
pub use synthetic::SyntheticDetector;
