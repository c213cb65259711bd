use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Round-duration presets offered by the duration selector, in seconds.
pub const ROUND_DURATION_OPTIONS: [u64; 5] = [20, 25, 30, 35, 40];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    Work,
    Rest,
}

impl TimerPhase {
    pub fn label(self) -> &'static str {
        match self {
            TimerPhase::Work => "Work",
            TimerPhase::Rest => "Rest",
        }
    }
}

impl std::fmt::Display for TimerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Durations and round count used whenever a phase is armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalPlan {
    work_secs: u64,
    rest_secs: u64,
    total_rounds: u32,
}

impl IntervalPlan {
    /// Build a plan, rejecting zero durations and a zero round count.
    pub fn new(work_secs: u64, rest_secs: u64, total_rounds: u32) -> Result<Self, ValidationError> {
        validate_duration("work_secs", work_secs)?;
        validate_duration("rest_secs", rest_secs)?;
        if total_rounds == 0 {
            return Err(ValidationError::invalid(
                "total_rounds",
                "a session needs at least one round",
            ));
        }
        Ok(Self {
            work_secs,
            rest_secs,
            total_rounds,
        })
    }

    pub fn work_secs(&self) -> u64 {
        self.work_secs
    }

    pub fn rest_secs(&self) -> u64 {
        self.rest_secs
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    pub fn duration_for(&self, phase: TimerPhase) -> u64 {
        match phase {
            TimerPhase::Work => self.work_secs,
            TimerPhase::Rest => self.rest_secs,
        }
    }

    pub(crate) fn set_duration(&mut self, phase: TimerPhase, secs: u64) -> Result<(), ValidationError> {
        let field = match phase {
            TimerPhase::Work => "work_secs",
            TimerPhase::Rest => "rest_secs",
        };
        validate_duration(field, secs)?;
        match phase {
            TimerPhase::Work => self.work_secs = secs,
            TimerPhase::Rest => self.rest_secs = secs,
        }
        Ok(())
    }

    /// Wall time of a full session when every phase runs to zero.
    ///
    /// Uses saturating arithmetic so absurd configs cannot overflow.
    pub fn total_duration_secs(&self) -> u64 {
        self.work_secs
            .saturating_add(self.rest_secs)
            .saturating_mul(self.total_rounds as u64)
    }
}

impl Default for IntervalPlan {
    /// 2:30 of work, 0:30 of rest, five rounds.
    fn default() -> Self {
        Self {
            work_secs: 150,
            rest_secs: 30,
            total_rounds: 5,
        }
    }
}

fn validate_duration(field: &str, secs: u64) -> Result<(), ValidationError> {
    if secs == 0 {
        return Err(ValidationError::invalid(field, "duration must be greater than zero"));
    }
    Ok(())
}

/// Whether the next phase starts counting on its own after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancePolicy {
    /// Rest begins counting as soon as work reaches zero.
    pub auto_start_rest: bool,
    /// Work of the next round begins counting as soon as rest reaches zero.
    pub auto_start_next_round: bool,
}

impl AdvancePolicy {
    /// Every phase starts on its own; one `start()` runs the whole session.
    pub fn continuous() -> Self {
        Self {
            auto_start_rest: true,
            auto_start_next_round: true,
        }
    }

    /// Every phase waits for an explicit `start()`.
    pub fn manual() -> Self {
        Self {
            auto_start_rest: false,
            auto_start_next_round: false,
        }
    }

    pub(crate) fn auto_start(&self, phase: TimerPhase) -> bool {
        match phase {
            TimerPhase::Work => self.auto_start_next_round,
            TimerPhase::Rest => self.auto_start_rest,
        }
    }
}

impl Default for AdvancePolicy {
    fn default() -> Self {
        Self {
            auto_start_rest: true,
            auto_start_next_round: false,
        }
    }
}
