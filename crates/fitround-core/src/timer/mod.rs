mod countdown;
pub mod driver;
mod engine;
mod plan;

pub use countdown::{format_clock, RoundTimer};
pub use driver::{spawn_session, SessionHandle, TICK_PERIOD};
pub use engine::{IntervalTimer, TimerState, WorkoutSummary};
pub use plan::{AdvancePolicy, IntervalPlan, TimerPhase, ROUND_DURATION_OPTIONS};
