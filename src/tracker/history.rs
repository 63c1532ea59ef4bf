use std::fmt::Write;

use chrono::{DateTime, Local, Utc};

use crate::{db::SleepNight, settings::HistorySettings};

/// Renders nights into the strings the history list shows, one per night.
pub trait HistoryFormatter: Send + Sync {
    fn format_night(&self, night: &SleepNight) -> String;

    fn format_nights(&self, nights: &[SleepNight]) -> Vec<String> {
        nights.iter().map(|night| self.format_night(night)).collect()
    }
}

pub fn quality_label(quality: i32) -> &'static str {
    match quality {
        0 => "Very bad",
        1 => "Poor",
        2 => "So-so",
        3 => "OK",
        4 => "Pretty good",
        5 => "Excellent",
        _ => "--",
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlainFormatter {
    settings: HistorySettings,
}

impl PlainFormatter {
    pub fn new(settings: HistorySettings) -> Self {
        Self { settings }
    }

    fn timestamp(&self, ms: i64) -> String {
        let Some(utc) = DateTime::<Utc>::from_timestamp_millis(ms) else {
            return format!("{ms}ms");
        };

        let mut out = String::new();
        let written = if self.settings.use_utc {
            write!(out, "{}", utc.format(&self.settings.time_format))
        } else {
            write!(
                out,
                "{}",
                utc.with_timezone(&Local).format(&self.settings.time_format)
            )
        };

        match written {
            Ok(()) => out,
            // Bad strftime pattern in settings.
            Err(_) => utc.to_rfc3339(),
        }
    }
}

impl HistoryFormatter for PlainFormatter {
    fn format_night(&self, night: &SleepNight) -> String {
        let end = if night.is_open() {
            "in progress".to_string()
        } else {
            self.timestamp(night.end_time_ms)
        };

        let quality = if night.is_rated() {
            quality_label(night.quality)
        } else {
            "not rated"
        };

        let mut text = format!(
            "Start: {}\nEnd: {}\nQuality: {}",
            self.timestamp(night.start_time_ms),
            end,
            quality,
        );

        if !night.is_open() {
            let total_secs = night.duration_ms() / 1_000;
            let _ = write!(
                text,
                "\nDuration: {}h {}m {}s",
                total_secs / 3_600,
                total_secs % 3_600 / 60,
                total_secs % 60
            );
        }

        text
    }
}
