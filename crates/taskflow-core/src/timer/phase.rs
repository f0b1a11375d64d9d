use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Work,
    ShortBreak,
    LongBreak,
}

impl SessionPhase {
    pub const ALL: [SessionPhase; 3] = [
        SessionPhase::Work,
        SessionPhase::ShortBreak,
        SessionPhase::LongBreak,
    ];

    pub fn is_break(&self) -> bool {
        !matches!(self, SessionPhase::Work)
    }

    /// Storage form, also used in JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Work => "work",
            SessionPhase::ShortBreak => "short_break",
            SessionPhase::LongBreak => "long_break",
        }
    }

    /// Human-readable name for displays.
    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::Work => "Focus",
            SessionPhase::ShortBreak => "Short Break",
            SessionPhase::LongBreak => "Long Break",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionPhase {
    type Err = ValidationError;

    /// Accepts the storage form as well as the dashed CLI form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "work" | "focus" => Ok(SessionPhase::Work),
            "short_break" | "short" => Ok(SessionPhase::ShortBreak),
            "long_break" | "long" => Ok(SessionPhase::LongBreak),
            _ => Err(ValidationError::InvalidValue {
                field: "phase".into(),
                message: format!("unknown phase '{s}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cli_and_storage_forms() {
        assert_eq!("short-break".parse::<SessionPhase>().unwrap(), SessionPhase::ShortBreak);
        assert_eq!("long_break".parse::<SessionPhase>().unwrap(), SessionPhase::LongBreak);
        assert_eq!("Work".parse::<SessionPhase>().unwrap(), SessionPhase::Work);
        assert!("nap".parse::<SessionPhase>().is_err());
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&SessionPhase::ShortBreak).unwrap();
        assert_eq!(json, "\"short_break\"");
        let state = serde_json::to_string(&TimerState::Paused).unwrap();
        assert_eq!(state, "\"paused\"");
    }

    #[test]
    fn only_work_is_not_a_break() {
        assert!(!SessionPhase::Work.is_break());
        assert!(SessionPhase::ShortBreak.is_break());
        assert!(SessionPhase::LongBreak.is_break());
    }
}
