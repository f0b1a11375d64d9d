//! Focus controller: clock, sequencer and task binding behind one
//! command surface.
//!
//! The controller is a pure state machine. It performs no I/O; a completed
//! countdown is returned from `tick()` as a [`Completion`] and the caller
//! decides how to persist and announce it.
//!
//! ## Usage
//!
//! ```ignore
//! let mut focus = FocusController::new(profile, todays_work_sessions);
//! focus.bind("task-1".into())?;
//! focus.start()?;
//! // Once per second:
//! if let Some(done) = focus.tick() {
//!     persist_completion(&recorder, &done);
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::binding::TaskBinding;
use super::clock::SessionClock;
use super::format::{format_clock, progress_pct};
use super::phase::{SessionPhase, TimerState};
use super::profile::FocusProfile;
use super::sequencer::{Completion, PhaseSequencer};
use crate::error::{CommandError, ConfigError};
use crate::events::Event;
use crate::task::TaskId;

/// Observable state, published to the UI after every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusSnapshot {
    pub phase: SessionPhase,
    pub phase_label: String,
    pub state: TimerState,
    pub remaining_secs: u64,
    pub total_secs: u64,
    /// `MM:SS` countdown.
    pub display: String,
    pub progress_pct: f64,
    pub bound_task: Option<TaskId>,
    pub work_intervals: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusController {
    clock: SessionClock,
    sequencer: PhaseSequencer,
    binding: TaskBinding,
}

impl FocusController {
    /// Start at an idle work phase with the counter seeded from history.
    pub fn new(profile: FocusProfile, work_intervals: u32) -> Self {
        Self::with_sequencer(profile, PhaseSequencer::seeded(work_intervals))
    }

    pub fn with_sequencer(profile: FocusProfile, sequencer: PhaseSequencer) -> Self {
        Self {
            clock: SessionClock::new(profile, SessionPhase::Work),
            sequencer,
            binding: TaskBinding::default(),
        }
    }

    /// Build from raw minute values, refusing non-positive durations.
    pub fn from_minutes(
        work_min: u32,
        short_break_min: u32,
        long_break_min: u32,
        work_intervals: u32,
    ) -> Result<Self, ConfigError> {
        let profile = FocusProfile::new(work_min, short_break_min, long_break_min)?;
        Ok(Self::new(profile, work_intervals))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn profile(&self) -> &FocusProfile {
        self.clock.profile()
    }

    pub fn phase(&self) -> SessionPhase {
        self.clock.phase()
    }

    pub fn state(&self) -> TimerState {
        self.clock.state()
    }

    pub fn remaining_secs(&self) -> u64 {
        self.clock.remaining_secs()
    }

    pub fn bound_task(&self) -> Option<&TaskId> {
        self.binding.task()
    }

    pub fn work_intervals(&self) -> u32 {
        self.sequencer.work_intervals()
    }

    pub fn snapshot(&self) -> FocusSnapshot {
        let remaining = self.clock.remaining_secs();
        let total = self.clock.total_secs();
        FocusSnapshot {
            phase: self.phase(),
            phase_label: self.phase().label().to_string(),
            state: self.state(),
            remaining_secs: remaining,
            total_secs: total,
            display: format_clock(remaining),
            progress_pct: progress_pct(remaining, total),
            bound_task: self.binding.task().cloned(),
            work_intervals: self.work_intervals(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Result<Event, CommandError> {
        let resuming = self.state() == TimerState::Paused;
        self.clock.start().map_err(rejected)?;
        let at = Utc::now();
        if resuming {
            debug!(phase = %self.phase(), remaining = self.remaining_secs(), "timer resumed");
            Ok(Event::TimerResumed {
                phase: self.phase(),
                remaining_secs: self.remaining_secs(),
                at,
            })
        } else {
            info!(phase = %self.phase(), task = ?self.bound_task(), "timer started");
            Ok(Event::TimerStarted {
                phase: self.phase(),
                duration_secs: self.clock.total_secs(),
                task_id: self.task_for_phase(),
                at,
            })
        }
    }

    pub fn pause(&mut self) -> Result<Event, CommandError> {
        self.clock.pause().map_err(rejected)?;
        debug!(phase = %self.phase(), remaining = self.remaining_secs(), "timer paused");
        Ok(Event::TimerPaused {
            phase: self.phase(),
            remaining_secs: self.remaining_secs(),
            at: Utc::now(),
        })
    }

    /// Always succeeds; the current phase is kept.
    pub fn reset(&mut self) -> Event {
        self.clock.reset();
        debug!(phase = %self.phase(), "timer reset");
        Event::TimerReset {
            phase: self.phase(),
            remaining_secs: self.remaining_secs(),
            at: Utc::now(),
        }
    }

    pub fn select_phase(&mut self, phase: SessionPhase) -> Result<Event, CommandError> {
        self.clock.select_phase(phase).map_err(rejected)?;
        Ok(Event::PhaseSelected {
            phase,
            duration_secs: self.clock.total_secs(),
            at: Utc::now(),
        })
    }

    pub fn bind(&mut self, task_id: TaskId) -> Result<Event, CommandError> {
        self.binding
            .bind(task_id.clone(), self.phase(), self.state())
            .map_err(rejected)?;
        Ok(Event::TaskBound {
            task_id,
            at: Utc::now(),
        })
    }

    pub fn unbind(&mut self) -> Result<Event, CommandError> {
        let task_id = self
            .binding
            .unbind(self.phase(), self.state())
            .map_err(rejected)?;
        Ok(Event::TaskUnbound {
            task_id,
            at: Utc::now(),
        })
    }

    /// Call once per second. Returns the completion on the finishing tick.
    pub fn tick(&mut self) -> Option<Completion> {
        let phase = self.clock.tick()?;
        Some(self.finish(phase, Utc::now()))
    }

    /// Catch up `secs` seconds at once, stopping at the first completion.
    ///
    /// `completed_at` stamps the record if a countdown finishes.
    pub fn advance_by(&mut self, secs: u64, completed_at: DateTime<Utc>) -> Option<Completion> {
        let (_, finished) = self.clock.advance_by(secs);
        finished.map(|phase| self.finish(phase, completed_at))
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn finish(&mut self, phase: SessionPhase, at: DateTime<Utc>) -> Completion {
        let completion =
            self.sequencer
                .complete(phase, self.clock.profile(), self.binding.task(), at);
        self.clock.load_phase(completion.next_phase);
        info!(
            phase = %phase,
            next = %completion.next_phase,
            work_intervals = completion.work_intervals,
            "phase completed"
        );
        completion
    }

    fn task_for_phase(&self) -> Option<TaskId> {
        match self.phase() {
            SessionPhase::Work => self.binding.task().cloned(),
            _ => None,
        }
    }
}

fn rejected(err: CommandError) -> CommandError {
    warn!(error = %err, "timer command rejected");
    err
}
