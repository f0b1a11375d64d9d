//! Completion listeners.
//!
//! Sounds, celebrations and toasts are side effects of a completion, not
//! part of the timer. They hang off [`CompletionListener`] so the state
//! machine stays deterministic.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::RecorderError;
use crate::timer::{Completion, SessionPhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A short user-facing message, the equivalent of a toast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    fn new(level: NoticeLevel, title: &str, description: impl Into<String>) -> Self {
        Self {
            level,
            title: title.to_string(),
            description: description.into(),
        }
    }

    /// Messages shown when a countdown finishes.
    ///
    /// A work completion yields the celebration plus a break suggestion;
    /// a break completion yields a single prompt to get back to work.
    pub fn for_completion(completion: &Completion) -> Vec<Notice> {
        match completion.record.phase {
            SessionPhase::Work => {
                let count = completion.work_intervals;
                let plural = if count == 1 { "" } else { "s" };
                let celebrate = Notice::new(
                    NoticeLevel::Success,
                    "Pomodoro complete!",
                    format!("{count} session{plural} completed today"),
                );
                let suggestion = match completion.next_phase {
                    SessionPhase::LongBreak => Notice::new(
                        NoticeLevel::Info,
                        "Time for a long break!",
                        format!("You completed {count} pomodoros. Rest for a while."),
                    ),
                    _ => Notice::new(
                        NoticeLevel::Info,
                        "Time for a short break!",
                        "Stand up, stretch, drink some water.",
                    ),
                };
                vec![celebrate, suggestion]
            }
            SessionPhase::ShortBreak | SessionPhase::LongBreak => vec![Notice::new(
                NoticeLevel::Success,
                "Break over!",
                "Ready for another pomodoro?",
            )],
        }
    }

    pub fn for_persistence_failure(err: &RecorderError) -> Notice {
        Notice::new(
            NoticeLevel::Error,
            "Could not save your session",
            err.to_string(),
        )
    }
}

/// Observer of completions and persistence failures.
pub trait CompletionListener: Send + Sync {
    fn on_completion(&self, _completion: &Completion) {}

    fn on_persistence_failure(&self, _completion: &Completion, _error: &RecorderError) {}
}

/// Writes completions and failures to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl CompletionListener for LogListener {
    fn on_completion(&self, completion: &Completion) {
        for notice in Notice::for_completion(completion) {
            info!(title = %notice.title, "{}", notice.description);
        }
    }

    fn on_persistence_failure(&self, completion: &Completion, error: &RecorderError) {
        error!(phase = %completion.record.phase, error = %error, "session not saved");
    }
}
