//! # fitround Core Library
//!
//! Core logic for the fitround workout interval timer. The `fitround` CLI is
//! a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A tick-driven state machine for rounds of work and
//!   rest; the caller invokes `tick()` once per second
//! - **Driver**: A tokio task that owns one session and feeds it ticks and
//!   user commands
//! - **Storage**: TOML-based configuration and a SQLite workout history
//!
//! ## Key Components
//!
//! - [`IntervalTimer`]: Core timer state machine
//! - [`SessionHandle`]: Control surface of a driven session
//! - [`Config`]: Application configuration management
//! - [`Database`]: Finished workout history and statistics

pub mod error;
pub mod events;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::Event;
pub use storage::{Config, Database, WorkoutRecord, WorkoutStats};
pub use timer::{
    spawn_session, AdvancePolicy, IntervalPlan, IntervalTimer, SessionHandle, TimerPhase,
    TimerState, WorkoutSummary,
};
