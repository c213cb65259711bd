//! Tokio driver for an [`IntervalTimer`].
//!
//! A single spawned task owns the session and selects over a one-second
//! interval and a command channel. The interval branch does nothing but call
//! `tick()`; every user action arrives as a command, so the session has
//! exactly one writer and needs no lock.
//!
//! Dropping the [`SessionHandle`] aborts the task, so a torn-down front end
//! can never leave a callback ticking a discarded session.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::engine::{IntervalTimer, WorkoutSummary};
use crate::error::{CoreError, Result, ValidationError};
use crate::events::Event;

/// Period of one tick.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

enum SessionCommand {
    Start,
    Pause,
    Reset,
    SetWorkDuration(u64, oneshot::Sender<Result<(), ValidationError>>),
    SetRestDuration(u64, oneshot::Sender<Result<(), ValidationError>>),
    Snapshot(oneshot::Sender<Event>),
    Shutdown(oneshot::Sender<WorkoutSummary>),
}

/// Control surface of a running session task.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    task: Option<JoinHandle<()>>,
}

/// Spawn the driver task for `timer`, ticking every `period`.
///
/// Must be called from within a tokio runtime. Events produced by commands
/// and ticks arrive on the returned receiver in order.
pub fn spawn_session(
    timer: IntervalTimer,
    period: Duration,
) -> (SessionHandle, mpsc::UnboundedReceiver<Event>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_session(timer, period, cmd_rx, event_tx));
    (
        SessionHandle {
            commands: cmd_tx,
            task: Some(task),
        },
        event_rx,
    )
}

async fn run_session(
    mut timer: IntervalTimer,
    period: Duration,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    events: mpsc::UnboundedSender<Event>,
) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // A closed receiver only means nobody is rendering; the session goes on.
    let emit = |event: Option<Event>| {
        if let Some(event) = event {
            let _ = events.send(event);
        }
    };

    loop {
        tokio::select! {
            _ = interval.tick() => emit(timer.tick()),
            command = commands.recv() => {
                let Some(command) = command else {
                    tracing::debug!("all session handles dropped, stopping driver");
                    break;
                };
                match command {
                    SessionCommand::Start => {
                        let event = timer.start();
                        if event.is_some() {
                            // First tick lands a full period after start.
                            interval.reset();
                        }
                        emit(event);
                    }
                    SessionCommand::Pause => emit(timer.pause()),
                    SessionCommand::Reset => emit(timer.reset()),
                    SessionCommand::SetWorkDuration(secs, reply) => {
                        let result = timer.set_work_duration(secs);
                        let _ = reply.send(result.map(|event| emit(Some(event))));
                    }
                    SessionCommand::SetRestDuration(secs, reply) => {
                        let result = timer.set_rest_duration(secs);
                        let _ = reply.send(result.map(|event| emit(Some(event))));
                    }
                    SessionCommand::Snapshot(reply) => {
                        let _ = reply.send(timer.snapshot());
                    }
                    SessionCommand::Shutdown(reply) => {
                        let _ = reply.send(timer.summary());
                        break;
                    }
                }
            }
        }
    }
}

impl SessionHandle {
    pub fn start(&self) -> Result<()> {
        self.send(SessionCommand::Start)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(SessionCommand::Pause)
    }

    pub fn reset(&self) -> Result<()> {
        self.send(SessionCommand::Reset)
    }

    pub async fn set_work_duration(&self, secs: u64) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::SetWorkDuration(secs, tx))?;
        rx.await.map_err(|_| CoreError::SessionClosed)??;
        Ok(())
    }

    pub async fn set_rest_duration(&self, secs: u64) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::SetRestDuration(secs, tx))?;
        rx.await.map_err(|_| CoreError::SessionClosed)??;
        Ok(())
    }

    /// Current `Event::StateSnapshot` of the session.
    pub async fn snapshot(&self) -> Result<Event> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot(tx))?;
        rx.await.map_err(|_| CoreError::SessionClosed)
    }

    /// Stop the driver and return what the session amounted to.
    pub async fn shutdown(mut self) -> Result<WorkoutSummary> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Shutdown(tx))?;
        let summary = rx.await.map_err(|_| CoreError::SessionClosed)?;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        Ok(summary)
    }

    fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| CoreError::SessionClosed)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{AdvancePolicy, IntervalPlan, TimerPhase};

    fn session(work: u64, rest: u64, rounds: u32) -> (SessionHandle, mpsc::UnboundedReceiver<Event>) {
        let plan = IntervalPlan::new(work, rest, rounds).unwrap();
        spawn_session(IntervalTimer::new(plan, AdvancePolicy::default()), TICK_PERIOD)
    }

    async fn remaining(handle: &SessionHandle) -> u64 {
        match handle.snapshot().await.unwrap() {
            Event::StateSnapshot { remaining_secs, .. } => remaining_secs,
            other => panic!("Expected StateSnapshot, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_one_round_on_virtual_clock() {
        let (handle, mut events) = session(3, 2, 1);
        handle.start().unwrap();

        assert!(matches!(events.recv().await, Some(Event::TimerStarted { .. })));
        let started = Instant::now();
        assert!(matches!(
            events.recv().await,
            Some(Event::PhaseChanged { phase: TimerPhase::Rest, running: true, .. })
        ));
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert!(matches!(events.recv().await, Some(Event::SessionFinished { .. })));
        assert_eq!(started.elapsed(), Duration::from_secs(5));

        let summary = handle.shutdown().await.unwrap();
        assert!(summary.finished);
        assert_eq!(summary.work_elapsed_secs, 3);
        assert_eq!(summary.rest_elapsed_secs, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_does_not_count() {
        let (handle, _events) = session(3, 2, 1);
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(remaining(&handle).await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_remaining() {
        let (handle, _events) = session(10, 2, 1);
        handle.start().unwrap();
        time::sleep(Duration::from_millis(2500)).await;
        handle.pause().unwrap();
        assert_eq!(remaining(&handle).await, 8);

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(remaining(&handle).await, 8);

        handle.start().unwrap();
        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(remaining(&handle).await, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn duration_change_is_validated() {
        let (handle, mut events) = session(10, 2, 1);
        assert!(matches!(
            handle.set_work_duration(0).await,
            Err(CoreError::Validation(_))
        ));
        handle.set_rest_duration(20).await.unwrap();
        assert!(matches!(
            events.recv().await,
            Some(Event::PlanChanged { phase: TimerPhase::Rest, duration_secs: 20, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_the_task() {
        let (handle, mut events) = session(3, 2, 1);
        handle.start().unwrap();
        assert!(matches!(events.recv().await, Some(Event::TimerStarted { .. })));
        drop(handle);
        assert!(events.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_rewinds_running_session() {
        let (handle, mut events) = session(5, 2, 2);
        handle.start().unwrap();
        time::sleep(Duration::from_millis(3500)).await;
        handle.reset().unwrap();
        assert_eq!(remaining(&handle).await, 5);

        let mut saw_reset = false;
        while let Ok(event) = events.try_recv() {
            saw_reset |= matches!(event, Event::TimerReset { .. });
        }
        assert!(saw_reset);
    }
}
