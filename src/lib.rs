pub mod clock;
mod commands;
pub mod db;
pub mod lifecycle;
pub mod quality;
pub mod settings;
pub mod store;
pub mod tracker;

use std::path::PathBuf;

use anyhow::Context;
use log::info;

pub use commands::{Command, USAGE};
pub use db::{Database, NightId, SleepNight};
pub use quality::QualityRecorder;
pub use store::SessionStore;
pub use tracker::SessionController;

use commands::AppState;
use settings::SettingsStore;

fn data_dir() -> PathBuf {
    std::env::var_os("SLEEPTRACK_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".sleeptrack"))
}

pub fn run() -> anyhow::Result<()> {
    let debug_mode = std::env::var("SLEEPTRACK_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::new()
        .filter_level(if debug_mode {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .init();

    let command = Command::parse(std::env::args().skip(1))?;

    let app_data_dir = data_dir();
    std::fs::create_dir_all(&app_data_dir).with_context(|| {
        format!("failed to create data directory {}", app_data_dir.display())
    })?;

    let state = AppState {
        db: Database::new(app_data_dir.join("sleeptrack.sqlite3"))?,
        settings: SettingsStore::new(app_data_dir.join("settings.json"))?,
    };
    info!("Running {command:?}");

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let output = runtime.block_on(commands::execute(&state, command))?;
    println!("{output}");

    Ok(())
}
