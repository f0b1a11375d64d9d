mod binding;
mod clock;
mod controller;
mod format;
mod phase;
mod profile;
mod sequencer;

pub use binding::TaskBinding;
pub use clock::SessionClock;
pub use controller::{FocusController, FocusSnapshot};
pub use format::{format_clock, progress_pct};
pub use phase::{SessionPhase, TimerState};
pub use profile::{
    FocusProfile, DEFAULT_LONG_BREAK_MIN, DEFAULT_SHORT_BREAK_MIN, DEFAULT_WORK_MIN,
};
pub use sequencer::{Completion, PhaseSequencer, DEFAULT_LONG_BREAK_EVERY};
