//! Interval timer engine.
//!
//! The engine is a tick-driven state machine. It does not use internal
//! threads or read the clock - the caller invokes `tick()` once per elapsed
//! second (see [`super::driver`] for the tokio loop that does this).
//!
//! ## Phase transitions
//!
//! ```text
//! Work(r) --0--> Rest(r) --0--> Work(r+1) ... Rest(total) --0--> Finished
//! ```
//!
//! ## Usage
//!
//! ```
//! use fitround_core::timer::{AdvancePolicy, IntervalPlan, IntervalTimer, TimerPhase};
//!
//! let plan = IntervalPlan::new(3, 2, 1).unwrap();
//! let mut timer = IntervalTimer::new(plan, AdvancePolicy::default());
//! timer.start();
//! for _ in 0..3 {
//!     timer.tick();
//! }
//! assert_eq!(timer.phase(), TimerPhase::Rest);
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::countdown::{format_clock, RoundTimer};
use super::plan::{AdvancePolicy, IntervalPlan, TimerPhase};
use crate::error::ValidationError;
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    /// Active phase is armed and nothing has elapsed yet.
    Ready,
    Running,
    /// Active phase is partially elapsed and stopped.
    Paused,
    /// Final rest reached zero. Only `reset()` leaves this state.
    Finished,
}

/// What a session amounted to, for the history store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutSummary {
    pub rounds_completed: u32,
    pub total_rounds: u32,
    pub work_elapsed_secs: u64,
    pub rest_elapsed_secs: u64,
    pub finished: bool,
}

/// One interval session: rounds of work and rest.
///
/// The plan only feeds phases when they are armed, so changing a duration
/// never touches a countdown already in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalTimer {
    /// Plan the session was created with; `reset()` returns to it.
    initial_plan: IntervalPlan,
    plan: IntervalPlan,
    policy: AdvancePolicy,
    phase: TimerPhase,
    current_round: u32,
    work: RoundTimer,
    rest: RoundTimer,
    finished: bool,
    work_elapsed_secs: u64,
    rest_elapsed_secs: u64,
}

impl IntervalTimer {
    /// Create a session at round 1, Work phase, nothing running.
    pub fn new(plan: IntervalPlan, policy: AdvancePolicy) -> Self {
        Self {
            initial_plan: plan,
            plan,
            policy,
            phase: TimerPhase::Work,
            current_round: 1,
            work: RoundTimer::armed(plan.work_secs()),
            rest: RoundTimer::armed(plan.rest_secs()),
            finished: false,
            work_elapsed_secs: 0,
            rest_elapsed_secs: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn total_rounds(&self) -> u32 {
        self.plan.total_rounds()
    }

    pub fn plan(&self) -> &IntervalPlan {
        &self.plan
    }

    pub fn policy(&self) -> &AdvancePolicy {
        &self.policy
    }

    pub fn work_timer(&self) -> &RoundTimer {
        &self.work
    }

    pub fn rest_timer(&self) -> &RoundTimer {
        &self.rest
    }

    /// The countdown belonging to the current phase.
    pub fn active(&self) -> &RoundTimer {
        match self.phase {
            TimerPhase::Work => &self.work,
            TimerPhase::Rest => &self.rest,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active().is_running()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn remaining_secs(&self) -> u64 {
        self.active().remaining_secs()
    }

    /// Remaining time of the active phase as `mm:ss`.
    pub fn remaining_display(&self) -> String {
        format_clock(self.remaining_secs())
    }

    /// 0.0 .. 1.0 progress within the active phase.
    pub fn progress_fraction(&self) -> f64 {
        self.active().progress_fraction()
    }

    pub fn state(&self) -> TimerState {
        let active = self.active();
        if self.finished {
            TimerState::Finished
        } else if active.is_running() {
            TimerState::Running
        } else if active.remaining_secs() == active.configured_secs() {
            TimerState::Ready
        } else {
            TimerState::Paused
        }
    }

    pub fn summary(&self) -> WorkoutSummary {
        let rounds_completed = if self.finished {
            self.plan.total_rounds()
        } else {
            self.current_round - 1
        };
        WorkoutSummary {
            rounds_completed,
            total_rounds: self.plan.total_rounds(),
            work_elapsed_secs: self.work_elapsed_secs,
            rest_elapsed_secs: self.rest_elapsed_secs,
            finished: self.finished,
        }
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        let active = self.active();
        Event::StateSnapshot {
            state: self.state(),
            phase: self.phase,
            current_round: self.current_round,
            total_rounds: self.plan.total_rounds(),
            remaining_secs: active.remaining_secs(),
            remaining_display: self.remaining_display(),
            configured_secs: active.configured_secs(),
            progress: self.progress_fraction(),
            running: active.is_running(),
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        if self.finished {
            return None;
        }
        if !self.active_mut().start() {
            return None;
        }
        Some(Event::TimerStarted {
            round: self.current_round,
            phase: self.phase,
            remaining_secs: self.remaining_secs(),
            at: Utc::now(),
        })
    }

    pub fn pause(&mut self) -> Option<Event> {
        if !self.active_mut().stop() {
            return None;
        }
        Some(Event::TimerPaused {
            round: self.current_round,
            phase: self.phase,
            remaining_secs: self.remaining_secs(),
            at: Utc::now(),
        })
    }

    /// Back to round 1, Work, both phases re-armed with the durations the
    /// session was created with. Duration changes made since are dropped.
    pub fn reset(&mut self) -> Option<Event> {
        *self = Self::new(self.initial_plan, self.policy);
        tracing::debug!("interval session reset");
        Some(Event::TimerReset { at: Utc::now() })
    }

    /// Advance one second. Returns an event when a phase completes.
    pub fn tick(&mut self) -> Option<Event> {
        if self.finished || !self.is_running() {
            return None;
        }
        let reached_zero = self.active_mut().tick_down();
        match self.phase {
            TimerPhase::Work => self.work_elapsed_secs += 1,
            TimerPhase::Rest => self.rest_elapsed_secs += 1,
        }
        if !reached_zero {
            return None;
        }
        Some(self.complete_phase())
    }

    /// Change the work duration for the next time work is armed.
    pub fn set_work_duration(&mut self, secs: u64) -> Result<Event, ValidationError> {
        self.set_duration(TimerPhase::Work, secs)
    }

    /// Change the rest duration for the next time rest is armed.
    pub fn set_rest_duration(&mut self, secs: u64) -> Result<Event, ValidationError> {
        self.set_duration(TimerPhase::Rest, secs)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn active_mut(&mut self) -> &mut RoundTimer {
        match self.phase {
            TimerPhase::Work => &mut self.work,
            TimerPhase::Rest => &mut self.rest,
        }
    }

    fn set_duration(&mut self, phase: TimerPhase, secs: u64) -> Result<Event, ValidationError> {
        self.plan.set_duration(phase, secs)?;
        Ok(Event::PlanChanged {
            phase,
            duration_secs: secs,
            at: Utc::now(),
        })
    }

    /// The active countdown just hit zero and is already stopped.
    fn complete_phase(&mut self) -> Event {
        let completed = self.phase;
        match completed {
            TimerPhase::Work => self.arm(TimerPhase::Rest),
            TimerPhase::Rest if self.current_round < self.plan.total_rounds() => {
                self.current_round += 1;
                self.arm(TimerPhase::Work)
            }
            TimerPhase::Rest => {
                self.finished = true;
                tracing::info!(
                    rounds = self.plan.total_rounds(),
                    work_secs = self.work_elapsed_secs,
                    rest_secs = self.rest_elapsed_secs,
                    "interval session finished"
                );
                Event::SessionFinished {
                    total_rounds: self.plan.total_rounds(),
                    work_elapsed_secs: self.work_elapsed_secs,
                    rest_elapsed_secs: self.rest_elapsed_secs,
                    at: Utc::now(),
                }
            }
        }
    }

    fn arm(&mut self, next: TimerPhase) -> Event {
        let completed = self.phase;
        let duration_secs = self.plan.duration_for(next);
        self.phase = next;
        self.active_mut().rearm(duration_secs);
        let running = self.policy.auto_start(next) && self.active_mut().start();
        tracing::debug!(
            round = self.current_round,
            from = %completed,
            to = %next,
            duration_secs,
            running,
            "phase transition"
        );
        Event::PhaseChanged {
            completed,
            phase: next,
            round: self.current_round,
            duration_secs,
            running,
            at: Utc::now(),
        }
    }
}

impl Default for IntervalTimer {
    fn default() -> Self {
        Self::new(IntervalPlan::default(), AdvancePolicy::default())
    }
}
