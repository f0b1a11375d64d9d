use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Utc};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use taskflow_core::storage::{Config, Database, NotificationsConfig};
use taskflow_core::{
    persist_completion, Completion, CompletionListener, Event, FocusController, FocusHandle,
    FocusService, FocusSnapshot, LogListener, Notice, NoticeLevel, RecorderError, ServiceNotice,
    SessionPhase, TaskId, TimerState,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::{print_json, CliResult};

const CONTROLLER_KEY: &str = "focus_controller";
const RUNNER_KEY: &str = "focus_runner";
/// A lease without a heartbeat for this long belongs to a dead `timer run`.
const RUNNER_STALE_SECS: i64 = 5;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start or resume the countdown
    Start,
    /// Pause the countdown
    Pause,
    /// Reload the current phase at full duration
    Reset,
    /// Print current timer state as JSON
    Status,
    /// Switch to a phase (work, short-break, long-break) while not running
    Phase {
        phase: SessionPhase,
    },
    /// Bind a task to the work phase
    Bind {
        /// Task ID
        task_id: String,
    },
    /// Clear the bound task
    Unbind,
    /// Drive the countdown in the foreground until interrupted
    Run {
        /// Exit after the first phase completes
        #[arg(long)]
        until_complete: bool,
    },
}

/// Controller state kept between invocations.
#[derive(Serialize, Deserialize)]
struct StoredTimer {
    controller: FocusController,
    /// Instant the countdown was last brought up to date.
    synced_at: DateTime<Utc>,
}

/// Claim held by a foreground `timer run` while it owns the countdown.
///
/// Other invocations read the snapshot instead of catching up on their own.
#[derive(Serialize, Deserialize)]
struct RunnerLease {
    pid: u32,
    heartbeat_at: DateTime<Utc>,
    snapshot: FocusSnapshot,
}

impl RunnerLease {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now - self.heartbeat_at < Duration::seconds(RUNNER_STALE_SECS)
    }
}

fn active_runner(db: &Database) -> CliResult<Option<RunnerLease>> {
    let lease = match db.kv_get(RUNNER_KEY)? {
        Some(json) => match serde_json::from_str::<RunnerLease>(&json) {
            Ok(lease) => lease,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable runner lease");
                return Ok(None);
            }
        },
        None => return Ok(None),
    };
    if lease.is_live(Utc::now()) {
        Ok(Some(lease))
    } else {
        debug!(pid = lease.pid, "ignoring stale runner lease");
        Ok(None)
    }
}

fn write_lease(db: &Database, snapshot: FocusSnapshot) -> CliResult {
    let lease = RunnerLease {
        pid: std::process::id(),
        heartbeat_at: Utc::now(),
        snapshot,
    };
    db.kv_set(RUNNER_KEY, &serde_json::to_string(&lease)?)?;
    Ok(())
}

/// Prints completion notices on stderr according to the notification settings.
struct NoticePrinter {
    settings: NotificationsConfig,
}

impl NoticePrinter {
    fn show(&self, notice: &Notice) {
        eprintln!("{}: {}", notice.title, notice.description);
    }
}

impl CompletionListener for NoticePrinter {
    fn on_completion(&self, completion: &Completion) {
        if !self.settings.enabled {
            return;
        }
        if self.settings.sound {
            eprint!("\x07");
        }
        for notice in Notice::for_completion(completion) {
            if notice.level == NoticeLevel::Success && !self.settings.celebrate {
                continue;
            }
            self.show(&notice);
        }
    }

    fn on_persistence_failure(&self, _completion: &Completion, error: &RecorderError) {
        if self.settings.enabled {
            self.show(&Notice::for_persistence_failure(error));
        }
    }
}

fn fresh_controller(config: &Config, work_intervals: u32) -> CliResult<FocusController> {
    let sequencer = config.focus.sequencer(work_intervals)?;
    Ok(FocusController::with_sequencer(config.focus.profile()?, sequencer))
}

/// Work intervals to seed a rebuilt controller with.
///
/// History is the source of truth, but a completion whose record failed to
/// save still counts for the rest of the day it happened on.
fn work_interval_seed(
    stored: &FocusController,
    synced_at: DateTime<Utc>,
    db: &Database,
) -> CliResult<u32> {
    let recorded = db.work_sessions_today()?;
    let same_day = synced_at.with_timezone(&Local).date_naive() == Local::now().date_naive();
    if same_day {
        Ok(recorded.max(stored.work_intervals()))
    } else {
        Ok(recorded)
    }
}

/// An idle controller is rebuilt from the current config and history so
/// profile edits and a new day take effect. Phase and binding carry over.
fn refresh_idle(
    stored: FocusController,
    synced_at: DateTime<Utc>,
    config: &Config,
    db: &Database,
) -> CliResult<FocusController> {
    let mut fresh = fresh_controller(config, work_interval_seed(&stored, synced_at, db)?)?;
    // Binding is only allowed in Work, which a fresh controller starts in.
    if let Some(task_id) = stored.bound_task() {
        fresh.bind(task_id.clone())?;
    }
    if stored.phase() != fresh.phase() {
        fresh.select_phase(stored.phase())?;
    }
    Ok(fresh)
}

fn persist_and_announce(
    db: &Database,
    completion: &Completion,
    listeners: &[&dyn CompletionListener],
) -> CliResult {
    for listener in listeners {
        listener.on_completion(completion);
    }
    print_json(&Event::PhaseCompleted(completion.clone()))?;
    let report = persist_completion(db, completion);
    for error in report.errors() {
        for listener in listeners {
            listener.on_persistence_failure(completion, error);
        }
        print_json(&Event::PersistenceFailed {
            phase: completion.record.phase,
            message: error.to_string(),
            at: Utc::now(),
        })?;
    }
    Ok(())
}

/// Load the controller and catch up on whole seconds elapsed since the
/// last sync. Returns the instant the controller is now current as of.
fn load_controller(
    db: &Database,
    config: &Config,
) -> CliResult<(FocusController, DateTime<Utc>)> {
    let now = Utc::now();
    let stored = match db.kv_get(CONTROLLER_KEY)? {
        Some(json) => match serde_json::from_str::<StoredTimer>(&json) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "discarding unreadable timer state");
                return Ok((fresh_controller(config, db.work_sessions_today()?)?, now));
            }
        },
        None => return Ok((fresh_controller(config, db.work_sessions_today()?)?, now)),
    };

    let mut controller = stored.controller;
    match controller.state() {
        TimerState::Idle => Ok((refresh_idle(controller, stored.synced_at, config, db)?, now)),
        TimerState::Paused => Ok((controller, now)),
        TimerState::Running => {
            let elapsed = (now - stored.synced_at).num_seconds().max(0);
            let remaining = i64::try_from(controller.remaining_secs()).unwrap_or(0);
            let finished_at = stored.synced_at + Duration::seconds(remaining);
            let completion = controller.advance_by(u64::try_from(elapsed).unwrap_or(0), finished_at);
            debug!(elapsed, remaining = controller.remaining_secs(), "timer caught up");
            match completion {
                Some(completion) => {
                    let printer = NoticePrinter {
                        settings: config.notifications.clone(),
                    };
                    let listeners: [&dyn CompletionListener; 2] = [&LogListener, &printer];
                    persist_and_announce(db, &completion, &listeners)?;
                    Ok((controller, now))
                }
                // Sub-second remainders stay on the books for the next sync.
                None => Ok((controller, stored.synced_at + Duration::seconds(elapsed))),
            }
        }
    }
}

fn save_controller(
    db: &Database,
    controller: &FocusController,
    synced_at: DateTime<Utc>,
) -> CliResult {
    let stored = StoredTimer {
        controller: controller.clone(),
        synced_at,
    };
    db.kv_set(CONTROLLER_KEY, &serde_json::to_string(&stored)?)?;
    Ok(())
}

pub fn run(action: TimerAction) -> CliResult {
    let config = Config::load()?;
    let db = Database::open()?;

    if let Some(lease) = active_runner(&db)? {
        if matches!(action, TimerAction::Status) {
            return print_json(&Event::StateSnapshot(lease.snapshot));
        }
        return Err(format!(
            "timer is driven by `taskflow timer run` (pid {}); stop it first",
            lease.pid
        )
        .into());
    }

    let (mut controller, synced_at) = load_controller(&db, &config)?;
    // A completion found while catching up is already recorded, so the
    // caught-up state must be stored before the command can fail.
    save_controller(&db, &controller, synced_at)?;

    let event = match action {
        TimerAction::Start => controller.start()?,
        TimerAction::Pause => controller.pause()?,
        TimerAction::Reset => controller.reset(),
        TimerAction::Phase { phase } => controller.select_phase(phase)?,
        TimerAction::Bind { task_id } => {
            let task_id = TaskId::from(task_id);
            match db.get_task(&task_id)? {
                Some(task) if task.is_selectable() => {}
                Some(_) => return Err(format!("task cannot be bound: {task_id}").into()),
                None => return Err(format!("task not found: {task_id}").into()),
            }
            controller.bind(task_id)?
        }
        TimerAction::Unbind => controller.unbind()?,
        TimerAction::Status => return print_json(&Event::StateSnapshot(controller.snapshot())),
        TimerAction::Run { until_complete } => {
            let result = drive(&db, controller, &config, until_complete);
            if let Err(e) = db.kv_delete(RUNNER_KEY) {
                warn!(error = %e, "failed to release runner lease");
            }
            let controller = result?;
            save_controller(&db, &controller, Utc::now())?;
            return print_json(&Event::StateSnapshot(controller.snapshot()));
        }
    };

    print_json(&event)?;
    save_controller(&db, &controller, Utc::now())
}

fn heartbeat(db: &Database, handle: &FocusHandle) {
    if let Err(e) = write_lease(db, handle.snapshot()) {
        warn!(error = %e, "failed to refresh runner lease");
    }
}

/// Run the focus service in the foreground and return the controller when
/// it stops.
fn drive(
    db: &Database,
    controller: FocusController,
    config: &Config,
    until_complete: bool,
) -> CliResult<FocusController> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let recorder = Database::open()?;
        let printer = NoticePrinter {
            settings: config.notifications.clone(),
        };
        let handle = FocusService::new(controller, recorder)
            .listener(Arc::new(LogListener))
            .listener(Arc::new(printer))
            .spawn();
        let mut notices = handle.subscribe();
        let mut snapshots = handle.watch();
        write_lease(db, handle.snapshot())?;
        let mut lease_ticks = tokio::time::interval(std::time::Duration::from_secs(1));

        if handle.snapshot().state != TimerState::Running {
            print_json(&handle.start().await?)?;
        }

        let mut awaiting_persist = false;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = lease_ticks.tick() => heartbeat(db, &handle),
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snap = snapshots.borrow_and_update().clone();
                    eprint!("\r{} {} ", snap.phase_label, snap.display);
                    let _ = std::io::stderr().flush();
                }
                notice = notices.recv() => match notice {
                    Ok(ServiceNotice::Completed(completion)) => {
                        eprintln!();
                        print_json(&Event::PhaseCompleted(completion))?;
                        awaiting_persist = until_complete;
                    }
                    Ok(ServiceNotice::Persisted { .. }) => {
                        if awaiting_persist {
                            break;
                        }
                    }
                    Ok(ServiceNotice::PersistenceFailed { phase, message }) => {
                        print_json(&Event::PersistenceFailed { phase, message, at: Utc::now() })?;
                        if awaiting_persist {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed service notices"),
                    Err(RecvError::Closed) => break,
                },
            }
        }
        eprintln!();

        Ok::<_, Box<dyn std::error::Error>>(handle.shutdown().await?)
    })
}
