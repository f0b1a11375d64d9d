use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::TaskId;
use crate::timer::{Completion, FocusSnapshot, SessionPhase};

/// Every accepted command and every completion produces an Event.
/// The UI polls snapshots; listeners subscribe to completions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        phase: SessionPhase,
        duration_secs: u64,
        task_id: Option<TaskId>,
        at: DateTime<Utc>,
    },
    TimerResumed {
        phase: SessionPhase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        phase: SessionPhase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        phase: SessionPhase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    PhaseSelected {
        phase: SessionPhase,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    TaskBound {
        task_id: TaskId,
        at: DateTime<Utc>,
    },
    TaskUnbound {
        task_id: Option<TaskId>,
        at: DateTime<Utc>,
    },
    PhaseCompleted(Completion),
    /// A recorder call failed; the phase transition stands.
    PersistenceFailed {
        phase: SessionPhase,
        message: String,
        at: DateTime<Utc>,
    },
    StateSnapshot(FocusSnapshot),
}
