pub mod night;

pub use night::{NightId, SleepNight, QUALITY_MAX, QUALITY_UNRATED};
