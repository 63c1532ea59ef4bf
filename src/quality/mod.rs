pub mod recorder;

pub use recorder::QualityRecorder;
