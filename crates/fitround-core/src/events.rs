use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{TimerPhase, TimerState};

/// Every state change of an interval session produces an Event.
/// Front ends render them; the CLI also feeds them to the history store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        round: u32,
        phase: TimerPhase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        round: u32,
        phase: TimerPhase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// A phase hit zero and the next one was armed.
    PhaseChanged {
        completed: TimerPhase,
        phase: TimerPhase,
        round: u32,
        duration_secs: u64,
        /// Whether the new phase started counting on its own.
        running: bool,
        at: DateTime<Utc>,
    },
    /// Rest of the final round hit zero. Terminal.
    SessionFinished {
        total_rounds: u32,
        work_elapsed_secs: u64,
        rest_elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        at: DateTime<Utc>,
    },
    /// A phase duration changed; it applies the next time that phase is armed.
    PlanChanged {
        phase: TimerPhase,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        phase: TimerPhase,
        current_round: u32,
        total_rounds: u32,
        remaining_secs: u64,
        remaining_display: String,
        configured_secs: u64,
        progress: f64,
        running: bool,
        at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_snake_case_tag() {
        let event = Event::TimerReset { at: Utc::now() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "timer_reset");
    }

    #[test]
    fn phase_is_lowercase_on_the_wire() {
        let event = Event::PhaseChanged {
            completed: TimerPhase::Work,
            phase: TimerPhase::Rest,
            round: 1,
            duration_secs: 30,
            running: true,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["completed"], "work");
        assert_eq!(json["phase"], "rest");
    }
}
