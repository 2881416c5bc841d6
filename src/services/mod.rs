pub mod detector;
pub mod window_source;

pub use detector::create_detectors;
