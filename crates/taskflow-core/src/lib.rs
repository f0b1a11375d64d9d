//! # Taskflow Core Library
//!
//! Core logic for the taskflow focus timer. Everything the CLI does goes
//! through this crate; the binary is a thin layer over it.
//!
//! ## Architecture
//!
//! - **Timer**: a pure countdown state machine. The caller drives it with
//!   `tick()` once per second and receives a [`Completion`] when a phase ends.
//! - **Recorder**: the persistence boundary for finished sessions and task
//!   time credits.
//! - **Service**: a tokio task that owns the controller, generates ticks and
//!   persists completions off the tick path.
//! - **Storage**: SQLite session/task storage and TOML configuration.
//!
//! ## Key Components
//!
//! - [`FocusController`]: clock, phase sequencing and task binding
//! - [`FocusService`]: async driver around the controller
//! - [`SessionRecorder`]: trait implemented by [`Database`]
//! - [`Config`]: application configuration management

pub mod error;
pub mod events;
pub mod notify;
pub mod recorder;
pub mod service;
pub mod storage;
pub mod task;
pub mod timer;

pub use error::{CommandError, ConfigError, CoreError, DatabaseError, RecorderError, ValidationError};
pub use events::Event;
pub use notify::{CompletionListener, LogListener, Notice, NoticeLevel};
pub use recorder::{
    persist_completion, CompletedSessionRecord, MemoryRecorder, PersistenceReport,
    SessionRecorder, TaskTimeCredit,
};
pub use service::{FocusCommand, FocusHandle, FocusService, ServiceError, ServiceNotice};
pub use storage::{Config, Database, FocusSummary, StoredSession};
pub use task::{Task, TaskId, TaskPriority, TaskStatus};
pub use timer::{
    format_clock, Completion, FocusController, FocusProfile, FocusSnapshot, PhaseSequencer,
    SessionPhase, TimerState,
};
