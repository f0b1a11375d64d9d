//! Async driver for the focus controller.
//!
//! One tokio task owns the [`FocusController`] and handles, strictly one
//! at a time, either a tick from a fixed interval or a command from a
//! [`FocusHandle`]. A tick runs its whole transition, completion included,
//! before the next input is looked at.
//!
//! Completions are persisted on the blocking pool so the tick loop never
//! waits on storage. Outcomes come back as [`ServiceNotice`]s on a
//! broadcast channel; snapshots are published on a watch channel.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::CommandError;
use crate::events::Event;
use crate::notify::CompletionListener;
use crate::recorder::{persist_completion, SessionRecorder};
use crate::task::TaskId;
use crate::timer::{Completion, FocusController, FocusSnapshot, SessionPhase};

const COMMAND_BUFFER: usize = 32;
const NOTICE_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusCommand {
    Start,
    Pause,
    Reset,
    SelectPhase(SessionPhase),
    Bind(TaskId),
    Unbind,
}

/// Out-of-band results of the tick loop.
#[derive(Debug, Clone)]
pub enum ServiceNotice {
    Completed(Completion),
    /// Both recorder calls for this completion succeeded.
    Persisted { phase: SessionPhase },
    /// One recorder call failed. The phase transition stands.
    PersistenceFailed { phase: SessionPhase, message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Rejected(#[from] CommandError),

    #[error("focus service has stopped")]
    Stopped,
}

enum Request {
    Command(FocusCommand, oneshot::Sender<Result<Event, CommandError>>),
    Shutdown(oneshot::Sender<FocusController>),
}

/// Builder for the background focus task.
pub struct FocusService<R> {
    controller: FocusController,
    recorder: R,
    tick_period: Duration,
    listeners: Vec<Arc<dyn CompletionListener>>,
}

impl<R> FocusService<R>
where
    R: SessionRecorder + 'static,
{
    pub fn new(controller: FocusController, recorder: R) -> Self {
        Self {
            controller,
            recorder,
            tick_period: Duration::from_secs(1),
            listeners: Vec::new(),
        }
    }

    pub fn tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    pub fn listener(mut self, listener: Arc<dyn CompletionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Spawn the loop on the current runtime.
    pub fn spawn(self) -> FocusHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(self.controller.snapshot());
        let (notice_tx, _) = broadcast::channel(NOTICE_BUFFER);

        let worker = Worker {
            controller: self.controller,
            recorder: Arc::new(Mutex::new(self.recorder)),
            listeners: Arc::new(self.listeners),
            snapshots: snapshot_tx,
            notices: notice_tx.clone(),
        };
        tokio::spawn(worker.run(command_rx, self.tick_period));

        FocusHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            notices: notice_tx,
        }
    }
}

/// Cloneable front end to a running focus service.
#[derive(Clone)]
pub struct FocusHandle {
    commands: mpsc::Sender<Request>,
    snapshots: watch::Receiver<FocusSnapshot>,
    notices: broadcast::Sender<ServiceNotice>,
}

impl FocusHandle {
    pub async fn send(&self, command: FocusCommand) -> Result<Event, ServiceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Request::Command(command, reply_tx))
            .await
            .map_err(|_| ServiceError::Stopped)?;
        let result = reply_rx.await.map_err(|_| ServiceError::Stopped)?;
        Ok(result?)
    }

    pub async fn start(&self) -> Result<Event, ServiceError> {
        self.send(FocusCommand::Start).await
    }

    pub async fn pause(&self) -> Result<Event, ServiceError> {
        self.send(FocusCommand::Pause).await
    }

    pub async fn reset(&self) -> Result<Event, ServiceError> {
        self.send(FocusCommand::Reset).await
    }

    pub async fn select_phase(&self, phase: SessionPhase) -> Result<Event, ServiceError> {
        self.send(FocusCommand::SelectPhase(phase)).await
    }

    pub async fn bind(&self, task_id: TaskId) -> Result<Event, ServiceError> {
        self.send(FocusCommand::Bind(task_id)).await
    }

    pub async fn unbind(&self) -> Result<Event, ServiceError> {
        self.send(FocusCommand::Unbind).await
    }

    /// Latest published state.
    pub fn snapshot(&self) -> FocusSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<FocusSnapshot> {
        self.snapshots.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServiceNotice> {
        self.notices.subscribe()
    }

    /// Stop the loop and hand back the controller as it stands.
    pub async fn shutdown(&self) -> Result<FocusController, ServiceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Request::Shutdown(reply_tx))
            .await
            .map_err(|_| ServiceError::Stopped)?;
        reply_rx.await.map_err(|_| ServiceError::Stopped)
    }
}

struct Worker<R> {
    controller: FocusController,
    recorder: Arc<Mutex<R>>,
    listeners: Arc<Vec<Arc<dyn CompletionListener>>>,
    snapshots: watch::Sender<FocusSnapshot>,
    notices: broadcast::Sender<ServiceNotice>,
}

impl<R> Worker<R>
where
    R: SessionRecorder + 'static,
{
    async fn run(mut self, mut commands: mpsc::Receiver<Request>, period: Duration) {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval fires immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                request = commands.recv() => match request {
                    Some(Request::Command(command, reply)) => {
                        let starting = command == FocusCommand::Start;
                        let result = self.apply(command);
                        if starting && result.is_ok() {
                            // A full period must pass before the first decrement.
                            ticker.reset();
                        }
                        self.publish_snapshot();
                        let _ = reply.send(result);
                    }
                    Some(Request::Shutdown(reply)) => {
                        debug!("focus service shutting down");
                        let _ = reply.send(self.controller.clone());
                        return;
                    }
                    None => {
                        debug!("all focus handles dropped");
                        return;
                    }
                },
                _ = ticker.tick() => {
                    let completion = self.controller.tick();
                    self.publish_snapshot();
                    if let Some(completion) = completion {
                        self.dispatch(completion);
                    }
                }
            }
        }
    }

    fn apply(&mut self, command: FocusCommand) -> Result<Event, CommandError> {
        match command {
            FocusCommand::Start => self.controller.start(),
            FocusCommand::Pause => self.controller.pause(),
            FocusCommand::Reset => Ok(self.controller.reset()),
            FocusCommand::SelectPhase(phase) => self.controller.select_phase(phase),
            FocusCommand::Bind(task_id) => self.controller.bind(task_id),
            FocusCommand::Unbind => self.controller.unbind(),
        }
    }

    fn publish_snapshot(&self) {
        let snapshot = self.controller.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    fn dispatch(&self, completion: Completion) {
        for listener in self.listeners.iter() {
            listener.on_completion(&completion);
        }
        let _ = self.notices.send(ServiceNotice::Completed(completion.clone()));

        let recorder = Arc::clone(&self.recorder);
        let listeners = Arc::clone(&self.listeners);
        let notices = self.notices.clone();
        tokio::task::spawn_blocking(move || {
            let report = {
                let guard = recorder.lock().unwrap_or_else(PoisonError::into_inner);
                persist_completion(&*guard, &completion)
            };
            let phase = completion.record.phase;
            let errors = report.into_errors();
            if errors.is_empty() {
                let _ = notices.send(ServiceNotice::Persisted { phase });
                return;
            }
            for error in errors {
                warn!(phase = %phase, error = %error, "persistence failed; phase already advanced");
                for listener in listeners.iter() {
                    listener.on_persistence_failure(&completion, &error);
                }
                let _ = notices.send(ServiceNotice::PersistenceFailed {
                    phase,
                    message: error.to_string(),
                });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecorderError;
    use crate::recorder::{CompletedSessionRecord, MemoryRecorder};
    use crate::timer::{FocusProfile, TimerState};

    fn one_minute_controller() -> FocusController {
        FocusController::new(FocusProfile::new(1, 1, 1).unwrap(), 0)
    }

    async fn next_completion(rx: &mut broadcast::Receiver<ServiceNotice>) -> Completion {
        loop {
            if let ServiceNotice::Completed(c) = rx.recv().await.unwrap() {
                return c;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completes_and_persists_once() {
        let recorder = Arc::new(MemoryRecorder::new());
        let handle = FocusService::new(one_minute_controller(), Arc::clone(&recorder)).spawn();
        let mut notices = handle.subscribe();

        handle.bind("task-1".into()).await.unwrap();
        handle.start().await.unwrap();

        let done = next_completion(&mut notices).await;
        assert_eq!(done.record.phase, SessionPhase::Work);
        assert_eq!(done.next_phase, SessionPhase::ShortBreak);
        loop {
            match notices.recv().await.unwrap() {
                ServiceNotice::Persisted { phase } => {
                    assert_eq!(phase, SessionPhase::Work);
                    break;
                }
                other => panic!("unexpected notice: {other:?}"),
            }
        }

        // Later ticks must not produce a second completion.
        time::sleep(Duration::from_secs(30)).await;
        assert!(notices.try_recv().is_err());

        let snap = handle.snapshot();
        assert_eq!(snap.phase, SessionPhase::ShortBreak);
        assert_eq!(snap.state, TimerState::Idle);
        assert_eq!(snap.work_intervals, 1);

        assert_eq!(recorder.sessions().len(), 1);
        assert_eq!(recorder.task_minutes(&"task-1".into()), 1);
        assert_eq!(recorder.credit_calls(), 1);
    }

    struct OfflineRecorder;

    impl SessionRecorder for OfflineRecorder {
        fn record_session(&self, _record: &CompletedSessionRecord) -> Result<(), RecorderError> {
            Err(RecorderError::Unavailable("offline".into()))
        }

        fn add_task_time(&self, _task_id: &TaskId, _minutes: u32) -> Result<(), RecorderError> {
            Err(RecorderError::Unavailable("offline".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn phase_advances_when_persistence_fails() {
        let handle = FocusService::new(one_minute_controller(), OfflineRecorder).spawn();
        let mut notices = handle.subscribe();
        handle.bind("task-1".into()).await.unwrap();
        handle.start().await.unwrap();

        next_completion(&mut notices).await;
        let mut failures = 0;
        while failures < 2 {
            if let ServiceNotice::PersistenceFailed { message, .. } = notices.recv().await.unwrap() {
                assert_eq!(message, "recorder unavailable: offline");
                failures += 1;
            }
        }
        assert_eq!(handle.snapshot().phase, SessionPhase::ShortBreak);
        assert_eq!(handle.snapshot().work_intervals, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_commands_surface_as_errors() {
        let handle = FocusService::new(one_minute_controller(), MemoryRecorder::new()).spawn();
        handle.start().await.unwrap();
        assert_eq!(
            handle.select_phase(SessionPhase::LongBreak).await.unwrap_err(),
            ServiceError::Rejected(CommandError::PhaseChangeWhileRunning)
        );
        assert_eq!(
            handle.start().await.unwrap_err(),
            ServiceError::Rejected(CommandError::AlreadyRunning)
        );
        handle.pause().await.unwrap();

        let controller = handle.shutdown().await.unwrap();
        assert_eq!(controller.state(), TimerState::Paused);
        assert_eq!(controller.phase(), SessionPhase::Work);
        assert!(handle.start().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn paused_timer_does_not_count_down() {
        let handle = FocusService::new(one_minute_controller(), MemoryRecorder::new()).spawn();
        handle.start().await.unwrap();
        time::sleep(Duration::from_millis(10_500)).await;
        handle.pause().await.unwrap();
        let paused_at = handle.snapshot().remaining_secs;
        assert_eq!(paused_at, 50);

        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(handle.snapshot().remaining_secs, paused_at);
        assert_eq!(handle.snapshot().state, TimerState::Paused);
    }
}
