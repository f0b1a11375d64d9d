use serde::{Deserialize, Serialize};

use super::phase::SessionPhase;
use crate::error::ConfigError;

pub const DEFAULT_WORK_MIN: u32 = 25;
pub const DEFAULT_SHORT_BREAK_MIN: u32 = 5;
pub const DEFAULT_LONG_BREAK_MIN: u32 = 15;

/// Phase durations in minutes, owned by the user profile.
///
/// All three values are strictly positive; construction fails otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawProfile", into = "RawProfile")]
pub struct FocusProfile {
    work_min: u32,
    short_break_min: u32,
    long_break_min: u32,
}

impl FocusProfile {
    pub fn new(work_min: u32, short_break_min: u32, long_break_min: u32) -> Result<Self, ConfigError> {
        for (key, value) in [
            ("focus.work_min", work_min),
            ("focus.short_break_min", short_break_min),
            ("focus.long_break_min", long_break_min),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: "duration must be a positive number of minutes".into(),
                });
            }
        }
        Ok(Self {
            work_min,
            short_break_min,
            long_break_min,
        })
    }

    /// Fill absent values with 25/5/15. Present values are still validated.
    pub fn with_defaults(
        work_min: Option<u32>,
        short_break_min: Option<u32>,
        long_break_min: Option<u32>,
    ) -> Result<Self, ConfigError> {
        Self::new(
            work_min.unwrap_or(DEFAULT_WORK_MIN),
            short_break_min.unwrap_or(DEFAULT_SHORT_BREAK_MIN),
            long_break_min.unwrap_or(DEFAULT_LONG_BREAK_MIN),
        )
    }

    pub fn work_min(&self) -> u32 {
        self.work_min
    }

    pub fn short_break_min(&self) -> u32 {
        self.short_break_min
    }

    pub fn long_break_min(&self) -> u32 {
        self.long_break_min
    }

    pub fn duration_min(&self, phase: SessionPhase) -> u32 {
        match phase {
            SessionPhase::Work => self.work_min,
            SessionPhase::ShortBreak => self.short_break_min,
            SessionPhase::LongBreak => self.long_break_min,
        }
    }

    /// Saturates instead of overflowing for absurd durations.
    pub fn duration_secs(&self, phase: SessionPhase) -> u64 {
        u64::from(self.duration_min(phase)).saturating_mul(60)
    }
}

impl Default for FocusProfile {
    fn default() -> Self {
        Self {
            work_min: DEFAULT_WORK_MIN,
            short_break_min: DEFAULT_SHORT_BREAK_MIN,
            long_break_min: DEFAULT_LONG_BREAK_MIN,
        }
    }
}

/// Unvalidated wire form; deserialization goes through [`FocusProfile::new`].
#[derive(Serialize, Deserialize)]
struct RawProfile {
    work_min: u32,
    short_break_min: u32,
    long_break_min: u32,
}

impl TryFrom<RawProfile> for FocusProfile {
    type Error = ConfigError;

    fn try_from(raw: RawProfile) -> Result<Self, Self::Error> {
        Self::new(raw.work_min, raw.short_break_min, raw.long_break_min)
    }
}

impl From<FocusProfile> for RawProfile {
    fn from(profile: FocusProfile) -> Self {
        Self {
            work_min: profile.work_min,
            short_break_min: profile.short_break_min,
            long_break_min: profile.long_break_min,
        }
    }
}
