use serde::Serialize;

use crate::db::SleepNight;

/// Which tracker actions currently make sense to offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonState {
    pub start_enabled: bool,
    pub stop_enabled: bool,
    pub clear_enabled: bool,
}

impl ButtonState {
    pub fn derive(tonight: Option<&SleepNight>, history_len: usize) -> Self {
        Self {
            start_enabled: tonight.is_none(),
            stop_enabled: tonight.is_some(),
            clear_enabled: history_len > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_with_empty_history() {
        let state = ButtonState::derive(None, 0);
        assert!(state.start_enabled);
        assert!(!state.stop_enabled);
        assert!(!state.clear_enabled);
    }

    #[test]
    fn tracking_night() {
        let night = SleepNight::begin(1_000);
        let state = ButtonState::derive(Some(&night), 1);
        assert!(!state.start_enabled);
        assert!(state.stop_enabled);
        assert!(state.clear_enabled);
    }
}
