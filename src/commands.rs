use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::format::{Item, StrftimeItems};

use crate::{
    db::{Database, NightId, QUALITY_MAX},
    quality::QualityRecorder,
    settings::{HistorySettings, SettingsStore},
    store::SessionStore,
    tracker::{HistoryFormatter, PlainFormatter, SessionController},
};

pub const USAGE: &str =
    "usage: sleeptrack <status|start|stop|clear|history|rate <night-id> <0-5>|format <pattern> [--utc]>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Start,
    Stop,
    Clear,
    History,
    Rate { night_id: NightId, rating: i32 },
    Format { time_format: String, use_utc: bool },
}

impl Command {
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<S> = args.into_iter().collect();
        let words: Vec<&str> = args.iter().map(AsRef::as_ref).collect();

        match words.as_slice() {
            [] | ["status"] => Ok(Command::Status),
            ["start"] => Ok(Command::Start),
            ["stop"] => Ok(Command::Stop),
            ["clear"] => Ok(Command::Clear),
            ["history"] => Ok(Command::History),
            ["rate", night_id, rating] => {
                let night_id = night_id
                    .parse::<i64>()
                    .with_context(|| format!("invalid night id '{night_id}'"))?;
                let rating = rating
                    .parse::<i32>()
                    .with_context(|| format!("invalid rating '{rating}'"))?;
                Ok(Command::Rate {
                    night_id: NightId(night_id),
                    rating,
                })
            }
            ["format", pattern] => Ok(Command::Format {
                time_format: pattern.to_string(),
                use_utc: false,
            }),
            ["format", pattern, "--utc"] => Ok(Command::Format {
                time_format: pattern.to_string(),
                use_utc: true,
            }),
            _ => Err(anyhow!("{USAGE}")),
        }
    }
}

pub(crate) struct AppState {
    pub(crate) db: Database,
    pub(crate) settings: SettingsStore,
}

impl AppState {
    fn formatter(&self) -> Arc<dyn HistoryFormatter> {
        Arc::new(PlainFormatter::new(self.settings.history()))
    }

    fn controller(&self) -> SessionController {
        SessionController::new(Arc::new(self.db.clone()), self.formatter())
    }
}

/// Runs one command and returns what to print.
pub(crate) async fn execute(state: &AppState, command: Command) -> Result<String> {
    match command {
        Command::Status => {
            let controller = state.controller();
            controller.settled().await;
            Ok(match controller.current_session() {
                Some(night) => format!(
                    "Night {} in progress\n{}",
                    night.id,
                    state.formatter().format_night(&night)
                ),
                None => "No night in progress".to_string(),
            })
        }
        Command::Start => {
            let controller = state.controller();
            controller.settled().await;
            controller.on_start_tracking().await??;
            let night = controller
                .current_session()
                .ok_or_else(|| anyhow!("night was stored but could not be read back"))?;
            Ok(format!("Started night {}", night.id))
        }
        Command::Stop => {
            let controller = state.controller();
            controller.settled().await;
            controller.on_stop_tracking().await??;
            Ok(match controller.navigate_to_quality() {
                Some(id) => {
                    controller.done_navigating();
                    format!("Stopped night {id}; rate it with `sleeptrack rate {id} <0-{QUALITY_MAX}>`")
                }
                None => "No night in progress".to_string(),
            })
        }
        Command::Clear => {
            let controller = state.controller();
            controller.settled().await;
            controller.on_clear().await??;
            Ok("Cleared all nights".to_string())
        }
        Command::History => {
            let nights = SessionStore::get_all(&state.db).await?;
            if nights.is_empty() {
                return Ok("No nights recorded".to_string());
            }
            Ok(state.formatter().format_nights(&nights).join("\n\n"))
        }
        Command::Rate { night_id, rating } => {
            let recorder = QualityRecorder::new(Arc::new(state.db.clone()), night_id);
            recorder.on_set_quality(rating).await??;
            if recorder.navigate() == Some(true) {
                recorder.done_navigating();
                Ok(format!("Rated night {night_id}"))
            } else {
                bail!("night {night_id} not found")
            }
        }
        Command::Format {
            time_format,
            use_utc,
        } => {
            if StrftimeItems::new(&time_format).any(|item| matches!(item, Item::Error)) {
                bail!("invalid time format '{time_format}'");
            }
            state.settings.update_history(HistorySettings {
                time_format: time_format.clone(),
                use_utc,
            })?;
            Ok(format!(
                "History times now use '{time_format}'{} (saved to {})",
                if use_utc { " in UTC" } else { "" },
                state.settings.path().display()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState {
            db: Database::in_memory().unwrap(),
            settings: SettingsStore::new(dir.path().join("settings.json")).unwrap(),
        };
        (dir, state)
    }

    #[test]
    fn parses_every_command() {
        assert_eq!(Command::parse(Vec::<String>::new()).unwrap(), Command::Status);
        assert_eq!(Command::parse(["start"]).unwrap(), Command::Start);
        assert_eq!(Command::parse(["stop"]).unwrap(), Command::Stop);
        assert_eq!(Command::parse(["clear"]).unwrap(), Command::Clear);
        assert_eq!(Command::parse(["history"]).unwrap(), Command::History);
        assert_eq!(
            Command::parse(["rate", "7", "3"]).unwrap(),
            Command::Rate {
                night_id: NightId(7),
                rating: 3
            }
        );
    }

    #[test]
    fn parses_format_with_and_without_utc() {
        assert_eq!(
            Command::parse(["format", "%H:%M"]).unwrap(),
            Command::Format {
                time_format: "%H:%M".into(),
                use_utc: false
            }
        );
        assert_eq!(
            Command::parse(["format", "%H:%M", "--utc"]).unwrap(),
            Command::Format {
                time_format: "%H:%M".into(),
                use_utc: true
            }
        );
        assert!(Command::parse(["format"]).is_err());
        assert!(Command::parse(["format", "%H", "--local"]).is_err());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(Command::parse(["sleep"]).is_err());
        assert!(Command::parse(["rate", "x", "3"]).is_err());
        assert!(Command::parse(["rate", "1"]).is_err());
    }

    #[tokio::test]
    async fn full_night_through_commands() {
        let (_dir, state) = state();

        assert_eq!(execute(&state, Command::Status).await.unwrap(), "No night in progress");
        assert!(execute(&state, Command::Start).await.unwrap().starts_with("Started night"));
        assert!(execute(&state, Command::Status).await.unwrap().contains("in progress"));

        let stopped = execute(&state, Command::Stop).await.unwrap();
        assert!(stopped.starts_with("Stopped night"));

        let id = state.db.get_tonight().await.unwrap().unwrap().id;
        let rated = execute(&state, Command::Rate { night_id: id, rating: 5 })
            .await
            .unwrap();
        assert_eq!(rated, format!("Rated night {id}"));

        let history = execute(&state, Command::History).await.unwrap();
        assert!(history.contains("Quality: Excellent"));

        execute(&state, Command::Clear).await.unwrap();
        assert_eq!(execute(&state, Command::History).await.unwrap(), "No nights recorded");
    }

    #[tokio::test]
    async fn format_is_saved_and_used_by_history() {
        let (dir, state) = state();
        let command = Command::Format {
            time_format: "%Y/%m/%d".into(),
            use_utc: true,
        };

        let saved = execute(&state, command).await.unwrap();
        assert!(saved.contains("in UTC"));
        assert!(saved.contains("settings.json"));

        let reloaded = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(reloaded.history().time_format, "%Y/%m/%d");
        assert!(reloaded.history().use_utc);

        state.db.insert_night(&crate::db::SleepNight::begin(0)).await.unwrap();
        let history = execute(&state, Command::History).await.unwrap();
        assert!(history.contains("Start: 1970/01/01"));
        assert!(history.contains("Quality: not rated"));
    }

    #[tokio::test]
    async fn invalid_format_is_rejected_and_not_saved() {
        let (_dir, state) = state();
        let command = Command::Format {
            time_format: "%Q".into(),
            use_utc: false,
        };

        assert!(execute(&state, command).await.is_err());
        assert_eq!(state.settings.history(), HistorySettings::default());
    }

    #[tokio::test]
    async fn rating_unknown_night_is_reported() {
        let (_dir, state) = state();
        let result = execute(
            &state,
            Command::Rate {
                night_id: NightId(99),
                rating: 2,
            },
        )
        .await;
        assert!(result.is_err());
    }
}
