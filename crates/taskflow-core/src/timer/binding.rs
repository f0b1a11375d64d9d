use serde::{Deserialize, Serialize};

use super::phase::{SessionPhase, TimerState};
use crate::error::CommandError;
use crate::task::TaskId;

/// Optional task credited when the current work phase completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBinding {
    task: Option<TaskId>,
}

impl TaskBinding {
    pub fn task(&self) -> Option<&TaskId> {
        self.task.as_ref()
    }

    pub fn bind(
        &mut self,
        task_id: TaskId,
        phase: SessionPhase,
        state: TimerState,
    ) -> Result<(), CommandError> {
        Self::check(phase, state)?;
        self.task = Some(task_id);
        Ok(())
    }

    /// Returns the previously bound task, if any.
    pub fn unbind(
        &mut self,
        phase: SessionPhase,
        state: TimerState,
    ) -> Result<Option<TaskId>, CommandError> {
        Self::check(phase, state)?;
        Ok(self.task.take())
    }

    fn check(phase: SessionPhase, state: TimerState) -> Result<(), CommandError> {
        if state == TimerState::Running {
            return Err(CommandError::BindWhileRunning);
        }
        if phase != SessionPhase::Work {
            return Err(CommandError::BindOutsideWork);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_only_outside_countdown_in_work() {
        let mut b = TaskBinding::default();
        b.bind("a".into(), SessionPhase::Work, TimerState::Idle).unwrap();
        assert_eq!(b.task(), Some(&TaskId::from("a")));

        assert_eq!(
            b.bind("b".into(), SessionPhase::Work, TimerState::Running),
            Err(CommandError::BindWhileRunning)
        );
        assert_eq!(
            b.bind("b".into(), SessionPhase::ShortBreak, TimerState::Idle),
            Err(CommandError::BindOutsideWork)
        );
        assert_eq!(b.task(), Some(&TaskId::from("a")));

        b.bind("c".into(), SessionPhase::Work, TimerState::Paused).unwrap();
        assert_eq!(b.task(), Some(&TaskId::from("c")));
    }

    #[test]
    fn unbind_follows_same_rules() {
        let mut b = TaskBinding::default();
        b.bind("a".into(), SessionPhase::Work, TimerState::Idle).unwrap();
        assert_eq!(
            b.unbind(SessionPhase::Work, TimerState::Running),
            Err(CommandError::BindWhileRunning)
        );
        assert_eq!(b.unbind(SessionPhase::Work, TimerState::Idle), Ok(Some("a".into())));
        assert_eq!(b.task(), None);
    }
}
