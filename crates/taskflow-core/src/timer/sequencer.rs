//! Phase sequencing after a countdown completes.
//!
//! Work completions bump the work-interval counter and pick a short or
//! long break; break completions always return to work. The sequencer
//! only decides and describes; persisting the result is the recorder's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::phase::SessionPhase;
use super::profile::FocusProfile;
use crate::error::ConfigError;
use crate::recorder::{CompletedSessionRecord, TaskTimeCredit};
use crate::task::TaskId;

/// Every N-th completed work interval earns a long break.
pub const DEFAULT_LONG_BREAK_EVERY: u32 = 4;

/// Everything that follows from one finished countdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// History entry to persist.
    pub record: CompletedSessionRecord,
    /// Time to credit to the bound task (work phases only).
    pub task_time: Option<TaskTimeCredit>,
    /// Phase the clock has been loaded with, idle.
    pub next_phase: SessionPhase,
    /// Completed work intervals today, after this completion.
    pub work_intervals: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSequencer {
    /// Completed work phases today. Never decremented.
    work_intervals: u32,
    long_break_every: u32,
}

impl PhaseSequencer {
    /// Seed the counter from persisted history.
    pub fn new(work_intervals: u32, long_break_every: u32) -> Result<Self, ConfigError> {
        if long_break_every == 0 {
            return Err(ConfigError::InvalidValue {
                key: "focus.long_break_every".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(Self {
            work_intervals,
            long_break_every,
        })
    }

    pub fn seeded(work_intervals: u32) -> Self {
        Self {
            work_intervals,
            long_break_every: DEFAULT_LONG_BREAK_EVERY,
        }
    }

    pub fn work_intervals(&self) -> u32 {
        self.work_intervals
    }

    pub fn long_break_every(&self) -> u32 {
        self.long_break_every
    }

    /// Break that follows the work interval numbered `count` (1-based).
    pub fn break_after(&self, count: u32) -> SessionPhase {
        if count % self.long_break_every == 0 {
            SessionPhase::LongBreak
        } else {
            SessionPhase::ShortBreak
        }
    }

    /// Account for a finished `phase` and describe what follows.
    pub fn complete(
        &mut self,
        phase: SessionPhase,
        profile: &FocusProfile,
        bound_task: Option<&TaskId>,
        completed_at: DateTime<Utc>,
    ) -> Completion {
        let duration_min = profile.duration_min(phase);
        match phase {
            SessionPhase::Work => {
                self.work_intervals = self.work_intervals.saturating_add(1);
                let task_id = bound_task.cloned();
                let task_time = task_id.clone().map(|task_id| TaskTimeCredit {
                    task_id,
                    minutes: duration_min,
                });
                Completion {
                    record: CompletedSessionRecord {
                        task_id,
                        duration_min,
                        phase,
                        completed_at,
                    },
                    task_time,
                    next_phase: self.break_after(self.work_intervals),
                    work_intervals: self.work_intervals,
                }
            }
            SessionPhase::ShortBreak | SessionPhase::LongBreak => Completion {
                record: CompletedSessionRecord {
                    task_id: None,
                    duration_min,
                    phase,
                    completed_at,
                },
                task_time: None,
                next_phase: SessionPhase::Work,
                work_intervals: self.work_intervals,
            },
        }
    }
}

impl Default for PhaseSequencer {
    fn default() -> Self {
        Self::seeded(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_work(seq: &mut PhaseSequencer, task: Option<&TaskId>) -> Completion {
        seq.complete(SessionPhase::Work, &FocusProfile::default(), task, Utc::now())
    }

    #[test]
    fn every_fourth_work_interval_earns_long_break() {
        let mut seq = PhaseSequencer::default();
        let next: Vec<_> = (0..8).map(|_| complete_work(&mut seq, None).next_phase).collect();
        assert_eq!(
            next,
            vec![
                SessionPhase::ShortBreak,
                SessionPhase::ShortBreak,
                SessionPhase::ShortBreak,
                SessionPhase::LongBreak,
                SessionPhase::ShortBreak,
                SessionPhase::ShortBreak,
                SessionPhase::ShortBreak,
                SessionPhase::LongBreak,
            ]
        );
        assert_eq!(seq.work_intervals(), 8);
    }

    #[test]
    fn seeded_counter_continues_cadence() {
        let mut seq = PhaseSequencer::seeded(3);
        assert_eq!(complete_work(&mut seq, None).next_phase, SessionPhase::LongBreak);
    }

    #[test]
    fn breaks_return_to_work_without_task() {
        let mut seq = PhaseSequencer::seeded(2);
        let task = TaskId::from("task-1");
        for phase in [SessionPhase::ShortBreak, SessionPhase::LongBreak] {
            let c = seq.complete(phase, &FocusProfile::default(), Some(&task), Utc::now());
            assert_eq!(c.next_phase, SessionPhase::Work);
            assert_eq!(c.record.task_id, None);
            assert_eq!(c.record.phase, phase);
            assert!(c.task_time.is_none());
        }
        assert_eq!(seq.work_intervals(), 2);
    }

    #[test]
    fn bound_work_completion_credits_task() {
        let mut seq = PhaseSequencer::default();
        let task = TaskId::from("task-1");
        let c = complete_work(&mut seq, Some(&task));
        assert_eq!(c.record.task_id, Some(task.clone()));
        assert_eq!(c.record.duration_min, 25);
        assert_eq!(
            c.task_time,
            Some(TaskTimeCredit {
                task_id: task,
                minutes: 25
            })
        );
    }

    #[test]
    fn custom_cadence_and_validation() {
        assert!(PhaseSequencer::new(0, 0).is_err());
        let mut seq = PhaseSequencer::new(0, 2).unwrap();
        assert_eq!(complete_work(&mut seq, None).next_phase, SessionPhase::ShortBreak);
        assert_eq!(complete_work(&mut seq, None).next_phase, SessionPhase::LongBreak);
    }
}
