// Per-profile derived state: current zone, level and rendered note.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classify::LineEvent;

/// Zone shown before any zone line has been read.
pub const LOADING_ZONE: &str = "Loading";
/// Zone a fresh character starts in; the target of a reset.
pub const STARTING_ZONE: &str = "The Twilight Strand";
pub const STARTING_LEVEL: u32 = 1;

/// What the overlay displays for one client profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneLevelState {
    pub zone: String,
    pub level: u32,
    /// HTML rendered from the notes matching the last matched zone and level.
    pub html_note: Option<String>,
    /// When zone or level last changed.
    pub updated_at: DateTime<Utc>,
}

impl ZoneLevelState {
    pub fn new() -> Self {
        Self {
            zone: LOADING_ZONE.to_string(),
            level: 0,
            html_note: None,
            updated_at: Utc::now(),
        }
    }

    /// Apply one classified line. Returns whether zone or level changed.
    pub fn apply(&mut self, event: LineEvent) -> bool {
        let changed = match event {
            LineEvent::Zone(zone) => {
                let changed = zone != self.zone;
                self.zone = zone;
                changed
            }
            LineEvent::Level(level) => {
                let changed = level != self.level;
                self.level = level;
                changed
            }
        };
        if changed {
            self.updated_at = Utc::now();
        }
        changed
    }

    /// Put the character back at the start of the campaign.
    pub fn reset(&mut self) {
        self.zone = STARTING_ZONE.to_string();
        self.level = STARTING_LEVEL;
        self.updated_at = Utc::now();
    }
}

impl Default for ZoneLevelState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;

    #[test]
    fn test_initial_state() {
        let state = ZoneLevelState::new();
        assert_eq!(state.zone, "Loading");
        assert_eq!(state.level, 0);
        assert!(state.html_note.is_none());
    }

    #[test]
    fn test_last_zone_and_last_level_win_independently() {
        let mut state = ZoneLevelState::new();
        for line in [
            "You have entered The Coast.\n",
            "Witchy is now level 5\n",
            "You have entered The Ledge.\n",
        ] {
            if let Some(event) = classify(line) {
                state.apply(event);
            }
        }
        assert_eq!(state.zone, "The Ledge");
        assert_eq!(state.level, 5);
    }

    #[test]
    fn test_apply_same_value_is_not_a_change() {
        let mut state = ZoneLevelState::new();
        assert!(state.apply(LineEvent::Zone("The Coast".into())));
        let stamp = state.updated_at;
        assert!(!state.apply(LineEvent::Zone("The Coast".into())));
        assert_eq!(state.updated_at, stamp);
    }

    #[test]
    fn test_reset() {
        let mut state = ZoneLevelState::new();
        state.apply(LineEvent::Zone("The Docks".into()));
        state.apply(LineEvent::Level(33));
        state.reset();
        assert_eq!(state.zone, STARTING_ZONE);
        assert_eq!(state.level, 1);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(ZoneLevelState::new()).unwrap();
        assert_eq!(json["zone"], "Loading");
        assert_eq!(json["level"], 0);
        assert!(json["htmlNote"].is_null());
        assert!(json["updatedAt"].is_string());
    }
}
