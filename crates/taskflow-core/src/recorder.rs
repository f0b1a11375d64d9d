//! Session recorder contract.
//!
//! The focus controller never persists anything itself. A completed
//! countdown yields a [`Completion`]; [`persist_completion`] hands its
//! record and optional task credit to a [`SessionRecorder`]. The two calls
//! are attempted independently so one failing never blocks the other, and
//! neither outcome can roll back the local phase transition.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::RecorderError;
use crate::task::TaskId;
use crate::timer::{Completion, SessionPhase};

/// Immutable history entry, one per completed countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedSessionRecord {
    /// Bound task, work phases only.
    pub task_id: Option<TaskId>,
    pub duration_min: u32,
    pub phase: SessionPhase,
    pub completed_at: DateTime<Utc>,
}

/// Request to add minutes to a task's accumulated time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTimeCredit {
    pub task_id: TaskId,
    pub minutes: u32,
}

/// Persistence boundary for completed sessions.
///
/// Implementations are append-only for sessions. `add_task_time` is only
/// called for work completions with a bound task.
pub trait SessionRecorder: Send {
    fn record_session(&self, record: &CompletedSessionRecord) -> Result<(), RecorderError>;

    fn add_task_time(&self, task_id: &TaskId, minutes: u32) -> Result<(), RecorderError>;
}

impl<R> SessionRecorder for Arc<R>
where
    R: SessionRecorder + Sync + ?Sized,
{
    fn record_session(&self, record: &CompletedSessionRecord) -> Result<(), RecorderError> {
        (**self).record_session(record)
    }

    fn add_task_time(&self, task_id: &TaskId, minutes: u32) -> Result<(), RecorderError> {
        (**self).add_task_time(task_id, minutes)
    }
}

/// Outcome of persisting one completion.
#[derive(Debug)]
pub struct PersistenceReport {
    pub session: Result<(), RecorderError>,
    /// `None` when there was no task to credit.
    pub task_time: Option<Result<(), RecorderError>>,
}

impl PersistenceReport {
    pub fn is_ok(&self) -> bool {
        self.session.is_ok() && !matches!(self.task_time, Some(Err(_)))
    }

    pub fn errors(&self) -> Vec<&RecorderError> {
        let mut errors = Vec::new();
        if let Err(e) = &self.session {
            errors.push(e);
        }
        if let Some(Err(e)) = &self.task_time {
            errors.push(e);
        }
        errors
    }

    pub fn into_errors(self) -> Vec<RecorderError> {
        let mut errors = Vec::new();
        if let Err(e) = self.session {
            errors.push(e);
        }
        if let Some(Err(e)) = self.task_time {
            errors.push(e);
        }
        errors
    }
}

/// Record the session and credit the bound task, each attempted regardless
/// of the other's outcome.
pub fn persist_completion<R>(recorder: &R, completion: &Completion) -> PersistenceReport
where
    R: SessionRecorder + ?Sized,
{
    let session = recorder.record_session(&completion.record);
    match &session {
        Ok(()) => debug!(phase = %completion.record.phase, "session recorded"),
        Err(e) => warn!(phase = %completion.record.phase, error = %e, "failed to record session"),
    }

    let task_time = completion.task_time.as_ref().map(|credit| {
        let result = recorder.add_task_time(&credit.task_id, credit.minutes);
        if let Err(e) = &result {
            warn!(task_id = %credit.task_id, minutes = credit.minutes, error = %e, "failed to credit task time");
        }
        result
    });

    PersistenceReport { session, task_time }
}

#[derive(Debug, Default)]
struct MemoryState {
    sessions: Vec<CompletedSessionRecord>,
    task_minutes: HashMap<TaskId, u32>,
    credit_calls: usize,
}

/// Recorder that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    inner: Mutex<MemoryState>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions(&self) -> Vec<CompletedSessionRecord> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sessions
            .clone()
    }

    pub fn task_minutes(&self, task_id: &TaskId) -> u32 {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .task_minutes
            .get(task_id)
            .copied()
            .unwrap_or(0)
    }

    /// Number of `add_task_time` calls received.
    pub fn credit_calls(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .credit_calls
    }
}

impl SessionRecorder for MemoryRecorder {
    fn record_session(&self, record: &CompletedSessionRecord) -> Result<(), RecorderError> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| RecorderError::Unavailable("memory recorder poisoned".into()))?;
        state.sessions.push(record.clone());
        Ok(())
    }

    fn add_task_time(&self, task_id: &TaskId, minutes: u32) -> Result<(), RecorderError> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| RecorderError::Unavailable("memory recorder poisoned".into()))?;
        state.credit_calls += 1;
        *state.task_minutes.entry(task_id.clone()).or_insert(0) += minutes;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{FocusProfile, PhaseSequencer};

    /// Fails whichever half it is told to.
    struct FlakyRecorder {
        inner: MemoryRecorder,
        fail_sessions: bool,
        fail_credits: bool,
    }

    impl SessionRecorder for FlakyRecorder {
        fn record_session(&self, record: &CompletedSessionRecord) -> Result<(), RecorderError> {
            if self.fail_sessions {
                return Err(RecorderError::Unavailable("sessions offline".into()));
            }
            self.inner.record_session(record)
        }

        fn add_task_time(&self, task_id: &TaskId, minutes: u32) -> Result<(), RecorderError> {
            if self.fail_credits {
                return Err(RecorderError::TaskNotFound(task_id.clone()));
            }
            self.inner.add_task_time(task_id, minutes)
        }
    }

    fn bound_work_completion() -> Completion {
        let task = TaskId::from("task-1");
        PhaseSequencer::default().complete(
            SessionPhase::Work,
            &FocusProfile::default(),
            Some(&task),
            Utc::now(),
        )
    }

    #[test]
    fn persists_record_and_credit() {
        let recorder = MemoryRecorder::new();
        let report = persist_completion(&recorder, &bound_work_completion());
        assert!(report.is_ok());
        assert_eq!(recorder.sessions().len(), 1);
        assert_eq!(recorder.task_minutes(&"task-1".into()), 25);
        assert_eq!(recorder.credit_calls(), 1);
    }

    #[test]
    fn session_failure_does_not_skip_credit() {
        let recorder = FlakyRecorder {
            inner: MemoryRecorder::new(),
            fail_sessions: true,
            fail_credits: false,
        };
        let report = persist_completion(&recorder, &bound_work_completion());
        assert!(!report.is_ok());
        assert_eq!(report.errors().len(), 1);
        assert_eq!(recorder.inner.task_minutes(&"task-1".into()), 25);
    }

    #[test]
    fn credit_failure_does_not_skip_session() {
        let recorder = FlakyRecorder {
            inner: MemoryRecorder::new(),
            fail_sessions: false,
            fail_credits: true,
        };
        let report = persist_completion(&recorder, &bound_work_completion());
        assert!(report.session.is_ok());
        assert!(matches!(report.task_time, Some(Err(RecorderError::TaskNotFound(_)))));
        assert_eq!(recorder.inner.sessions().len(), 1);
        assert_eq!(report.into_errors().len(), 1);
    }

    #[test]
    fn unbound_completion_skips_credit() {
        let recorder = MemoryRecorder::new();
        let completion = PhaseSequencer::default().complete(
            SessionPhase::Work,
            &FocusProfile::default(),
            None,
            Utc::now(),
        );
        let report = persist_completion(&recorder, &completion);
        assert!(report.task_time.is_none());
        assert_eq!(recorder.credit_calls(), 0);
    }
}
