//! Session clock: the countdown for the currently selected phase.
//!
//! The clock is tick-driven and owns no thread. The caller invokes
//! `tick()` once per second while the timer runs.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> Paused -> Running -> ... -> Idle (on completion)
//! any  -> Idle (reset / select_phase)
//! ```
//!
//! Completion is reported only on the Running, 1 -> 0 edge. The clock drops
//! to `Idle` in the same step, so ticks that arrive afterwards are no-ops.

use serde::{Deserialize, Serialize};

use super::phase::{SessionPhase, TimerState};
use super::profile::FocusProfile;
use crate::error::CommandError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClock {
    profile: FocusProfile,
    phase: SessionPhase,
    state: TimerState,
    /// Always within `0..=profile.duration_secs(phase)`.
    remaining_secs: u64,
}

impl SessionClock {
    /// A clock for `phase`, idle with the full duration loaded.
    pub fn new(profile: FocusProfile, phase: SessionPhase) -> Self {
        Self {
            profile,
            phase,
            state: TimerState::Idle,
            remaining_secs: profile.duration_secs(phase),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn profile(&self) -> &FocusProfile {
        &self.profile
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn total_secs(&self) -> u64 {
        self.profile.duration_secs(self.phase)
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Result<(), CommandError> {
        match self.state {
            TimerState::Running => Err(CommandError::AlreadyRunning),
            TimerState::Idle | TimerState::Paused => {
                if self.remaining_secs == 0 {
                    self.remaining_secs = self.total_secs();
                }
                self.state = TimerState::Running;
                Ok(())
            }
        }
    }

    pub fn pause(&mut self) -> Result<(), CommandError> {
        match self.state {
            TimerState::Running => {
                self.state = TimerState::Paused;
                Ok(())
            }
            _ => Err(CommandError::NotRunning),
        }
    }

    pub fn reset(&mut self) {
        self.remaining_secs = self.total_secs();
        self.state = TimerState::Idle;
    }

    pub fn select_phase(&mut self, phase: SessionPhase) -> Result<(), CommandError> {
        if self.is_running() {
            return Err(CommandError::PhaseChangeWhileRunning);
        }
        self.load_phase(phase);
        Ok(())
    }

    /// Advance one second. Returns the completed phase on the 1 -> 0 edge.
    pub fn tick(&mut self) -> Option<SessionPhase> {
        if self.state != TimerState::Running {
            return None;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.state = TimerState::Idle;
            return Some(self.phase);
        }
        None
    }

    /// Apply up to `secs` ticks, stopping at the first completion.
    ///
    /// Returns the number of ticks consumed and the completed phase, if any.
    pub fn advance_by(&mut self, secs: u64) -> (u64, Option<SessionPhase>) {
        if self.state != TimerState::Running || secs == 0 {
            return (0, None);
        }
        // Everything but the final second can be applied in one step.
        let bulk = secs.min(self.remaining_secs.saturating_sub(1));
        self.remaining_secs -= bulk;
        if bulk == secs {
            return (bulk, None);
        }
        (bulk + 1, self.tick())
    }

    /// Load `phase` at full duration, idle. Used after a completion.
    pub(crate) fn load_phase(&mut self, phase: SessionPhase) {
        self.phase = phase;
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn clock() -> SessionClock {
        SessionClock::new(FocusProfile::default(), SessionPhase::Work)
    }

    #[test]
    fn start_pause_resume() {
        let mut c = clock();
        assert_eq!(c.state(), TimerState::Idle);
        c.start().unwrap();
        assert_eq!(c.state(), TimerState::Running);
        c.pause().unwrap();
        assert_eq!(c.state(), TimerState::Paused);
        c.start().unwrap();
        assert_eq!(c.state(), TimerState::Running);
    }

    #[test]
    fn start_while_running_is_rejected() {
        let mut c = clock();
        c.start().unwrap();
        c.tick();
        assert_eq!(c.start(), Err(CommandError::AlreadyRunning));
        assert_eq!(c.remaining_secs(), 1499);
        assert_eq!(c.state(), TimerState::Running);
    }

    #[test]
    fn pause_requires_running() {
        let mut c = clock();
        assert_eq!(c.pause(), Err(CommandError::NotRunning));
        c.start().unwrap();
        c.pause().unwrap();
        assert_eq!(c.pause(), Err(CommandError::NotRunning));
    }

    #[test]
    fn ticks_ignored_unless_running() {
        let mut c = clock();
        assert!(c.tick().is_none());
        assert_eq!(c.remaining_secs(), 1500);

        c.start().unwrap();
        c.tick();
        c.pause().unwrap();
        for _ in 0..10 {
            assert!(c.tick().is_none());
        }
        assert_eq!(c.remaining_secs(), 1499);
    }

    #[test]
    fn completion_signalled_once() {
        let profile = FocusProfile::new(1, 1, 1).unwrap();
        let mut c = SessionClock::new(profile, SessionPhase::ShortBreak);
        c.start().unwrap();
        let completions: Vec<_> = (0..100).filter_map(|_| c.tick()).collect();
        assert_eq!(completions, vec![SessionPhase::ShortBreak]);
        assert_eq!(c.remaining_secs(), 0);
        assert_eq!(c.state(), TimerState::Idle);
    }

    #[test]
    fn reset_restores_full_duration() {
        for phase in SessionPhase::ALL {
            let mut c = SessionClock::new(FocusProfile::default(), phase);
            c.start().unwrap();
            c.tick();
            c.tick();
            c.reset();
            assert_eq!(c.remaining_secs(), FocusProfile::default().duration_secs(phase));
            assert_eq!(c.state(), TimerState::Idle);
        }
    }

    #[test]
    fn select_phase_rejected_while_running() {
        let mut c = clock();
        c.start().unwrap();
        c.tick();
        assert_eq!(
            c.select_phase(SessionPhase::ShortBreak),
            Err(CommandError::PhaseChangeWhileRunning)
        );
        assert_eq!(c.phase(), SessionPhase::Work);
        assert_eq!(c.remaining_secs(), 1499);
        assert!(c.is_running());
    }

    #[test]
    fn select_phase_when_paused_loads_new_duration() {
        let mut c = clock();
        c.start().unwrap();
        c.tick();
        c.pause().unwrap();
        c.select_phase(SessionPhase::LongBreak).unwrap();
        assert_eq!(c.phase(), SessionPhase::LongBreak);
        assert_eq!(c.remaining_secs(), 900);
        assert_eq!(c.state(), TimerState::Idle);
    }

    #[test]
    fn advance_by_stops_at_completion() {
        let mut c = clock();
        c.start().unwrap();
        assert_eq!(c.advance_by(100), (100, None));
        assert_eq!(c.remaining_secs(), 1400);
        assert_eq!(c.advance_by(5000), (1400, Some(SessionPhase::Work)));
        assert_eq!(c.state(), TimerState::Idle);
        assert_eq!(c.advance_by(10), (0, None));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Start,
        Pause,
        Reset,
        Tick,
        Select(SessionPhase),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            1 => Just(Op::Start),
            1 => Just(Op::Pause),
            1 => Just(Op::Reset),
            8 => Just(Op::Tick),
            1 => prop::sample::select(SessionPhase::ALL.to_vec()).prop_map(Op::Select),
        ]
    }

    proptest! {
        #[test]
        fn remaining_stays_within_phase_bounds(ops in prop::collection::vec(op(), 0..400)) {
            let profile = FocusProfile::new(1, 1, 2).unwrap();
            let mut c = SessionClock::new(profile, SessionPhase::Work);
            for op in ops {
                match op {
                    Op::Start => { let _ = c.start(); }
                    Op::Pause => { let _ = c.pause(); }
                    Op::Reset => c.reset(),
                    Op::Tick => { c.tick(); }
                    Op::Select(p) => { let _ = c.select_phase(p); }
                }
                prop_assert!(c.remaining_secs() <= c.total_secs());
                if c.is_running() {
                    prop_assert!(c.remaining_secs() > 0);
                }
            }
        }
    }
}
