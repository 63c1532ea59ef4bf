mod connection;
pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::{NightId, SleepNight, QUALITY_MAX, QUALITY_UNRATED};
