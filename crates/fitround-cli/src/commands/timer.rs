use std::io::Write;

use chrono::Utc;
use clap::{Args, Subcommand};
use fitround_core::timer::{format_clock, TICK_PERIOD};
use fitround_core::{
    spawn_session, AdvancePolicy, Config, CoreError, Database, Event, IntervalPlan,
    IntervalTimer, SessionHandle, TimerPhase, TimerState, ValidationError, WorkoutSummary,
};
use tokio::io::{AsyncBufReadExt, BufReader};

const PROGRESS_WIDTH: usize = 20;

const LINE_COMMANDS_HELP: &str =
    "commands: s=start p=pause r=reset q=quit w <secs> rest <secs> o <preset>";

/// Overrides on top of the configured plan.
#[derive(Args, Debug, Default)]
pub struct PlanArgs {
    /// Work duration in seconds
    #[arg(long)]
    work: Option<u64>,
    /// Rest duration in seconds
    #[arg(long)]
    rest: Option<u64>,
    /// Number of rounds
    #[arg(long)]
    rounds: Option<u32>,
}

impl PlanArgs {
    fn resolve(&self, config: &Config) -> Result<IntervalPlan, ValidationError> {
        IntervalPlan::new(
            self.work.unwrap_or(config.timer.work_secs),
            self.rest.unwrap_or(config.timer.rest_secs),
            self.rounds.unwrap_or(config.timer.total_rounds),
        )
    }
}

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run a live session (stdin: s, p, r, q, w <secs>, rest <secs>, o <preset>)
    Run {
        #[command(flatten)]
        plan: PlanArgs,
        /// Start every phase automatically
        #[arg(long, conflicts_with = "manual_rest")]
        auto: bool,
        /// Wait for an explicit start before rest
        #[arg(long)]
        manual_rest: bool,
        /// Do not write the session to the history database
        #[arg(long)]
        no_record: bool,
    },
    /// Print the resolved plan as JSON
    Plan {
        #[command(flatten)]
        plan: PlanArgs,
    },
    /// Run the session instantly and print events as JSON lines
    Simulate {
        #[command(flatten)]
        plan: PlanArgs,
        /// Stop after this many ticks (default: until finished)
        #[arg(long)]
        ticks: Option<u64>,
    },
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();

    match action {
        TimerAction::Run {
            plan,
            auto,
            manual_rest,
            no_record,
        } => {
            let plan = plan.resolve(&config)?;
            let policy = resolve_policy(config.policy(), auto, manual_rest);
            let record = config.behavior.record_history && !no_record;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_live(plan, policy, &config.timer.round_options, record))
        }
        TimerAction::Plan { plan } => {
            let plan = plan.resolve(&config)?;
            let json = serde_json::json!({
                "work_secs": plan.work_secs(),
                "rest_secs": plan.rest_secs(),
                "total_rounds": plan.total_rounds(),
                "total_duration_secs": plan.total_duration_secs(),
                "total_duration": format_clock(plan.total_duration_secs()),
                "policy": config.policy(),
                "round_options": config.timer.round_options,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
            Ok(())
        }
        TimerAction::Simulate { plan, ticks } => {
            let plan = plan.resolve(&config)?;
            let stdout = std::io::stdout();
            simulate(plan, ticks, &mut stdout.lock())
        }
    }
}

fn resolve_policy(configured: AdvancePolicy, auto: bool, manual_rest: bool) -> AdvancePolicy {
    let mut policy = if auto { AdvancePolicy::continuous() } else { configured };
    if manual_rest {
        policy.auto_start_rest = false;
    }
    policy
}

/// Drive a session without waiting, one JSON line per event.
fn simulate(
    plan: IntervalPlan,
    ticks: Option<u64>,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut timer = IntervalTimer::new(plan, AdvancePolicy::continuous());
    if let Some(event) = timer.start() {
        writeln!(out, "{}", serde_json::to_string(&event)?)?;
    }
    let limit = ticks.unwrap_or_else(|| plan.total_duration_secs());
    for _ in 0..limit {
        if let Some(event) = timer.tick() {
            writeln!(out, "{}", serde_json::to_string(&event)?)?;
        }
        if timer.is_finished() {
            break;
        }
    }
    writeln!(out, "{}", serde_json::to_string(&timer.snapshot())?)?;
    Ok(())
}

/// A line typed into a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineCommand {
    Start,
    Pause,
    Reset,
    Quit,
    SetWork(u64),
    SetRest(u64),
}

/// `Ok(None)` for a blank line. `o <n>` picks the n-th (1-based) preset as
/// the work duration.
fn parse_command(line: &str, round_options: &[u64]) -> Result<Option<LineCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    if words.next().is_some() {
        return Err(format!("too many arguments: {}", line.trim()));
    }
    let seconds = |arg: Option<&str>| -> Result<u64, String> {
        let arg = arg.ok_or_else(|| format!("'{name}' needs a number"))?;
        arg.parse()
            .map_err(|_| format!("cannot parse '{arg}' as a whole number"))
    };

    let command = match (name, arg) {
        ("s", None) => LineCommand::Start,
        ("p", None) => LineCommand::Pause,
        ("r", None) => LineCommand::Reset,
        ("q", None) => LineCommand::Quit,
        ("w", _) => LineCommand::SetWork(seconds(arg)?),
        ("rest", _) => LineCommand::SetRest(seconds(arg)?),
        ("o", _) => {
            let index = seconds(arg)?;
            let secs = index
                .checked_sub(1)
                .and_then(|i| round_options.get(i as usize))
                .ok_or_else(|| format!("no preset {index}, options are {round_options:?}"))?;
            LineCommand::SetWork(*secs)
        }
        _ => return Err(format!("unknown command: {}", line.trim())),
    };
    Ok(Some(command))
}

/// Forwards a duration change; a rejected value is reported and the session
/// keeps going.
async fn apply_duration(handle: &SessionHandle, command: LineCommand) -> Result<(), CoreError> {
    let outcome = match command {
        LineCommand::SetWork(secs) => handle.set_work_duration(secs).await,
        LineCommand::SetRest(secs) => handle.set_rest_duration(secs).await,
        _ => return Ok(()),
    };
    match outcome {
        Err(CoreError::Validation(e)) => {
            eprintln!("rejected: {e}");
            Ok(())
        }
        other => other,
    }
}

async fn run_live(
    plan: IntervalPlan,
    policy: AdvancePolicy,
    round_options: &[u64],
    record: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let started_at = Utc::now();
    let (handle, mut events) = spawn_session(IntervalTimer::new(plan, policy), TICK_PERIOD);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut redraw = tokio::time::interval(TICK_PERIOD);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    eprintln!("{LINE_COMMANDS_HELP}");
    handle.start()?;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if let Some(message) = describe(&event) {
                    println!("\r{message:<60}");
                }
                if matches!(event, Event::SessionFinished { .. }) {
                    break;
                }
            }
            _ = redraw.tick() => {
                if let Some(line) = status_line(&handle.snapshot().await?) {
                    print!("\r{line}");
                    std::io::stdout().flush()?;
                }
            }
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => match parse_command(&line, round_options) {
                    Ok(Some(LineCommand::Start)) => handle.start()?,
                    Ok(Some(LineCommand::Pause)) => handle.pause()?,
                    Ok(Some(LineCommand::Reset)) => handle.reset()?,
                    Ok(Some(LineCommand::Quit)) => break,
                    Ok(Some(command)) => apply_duration(&handle, command).await?,
                    Ok(None) => {}
                    Err(message) => eprintln!("{message}"),
                },
                None => stdin_open = false,
            },
            _ = &mut ctrl_c => break,
        }
    }

    let summary = handle.shutdown().await?;
    println!();
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if record && summary.work_elapsed_secs > 0 {
        save_summary(&plan, &summary, started_at)?;
    }
    Ok(())
}

fn save_summary(
    plan: &IntervalPlan,
    summary: &WorkoutSummary,
    started_at: chrono::DateTime<Utc>,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let id = db.record_workout(plan, summary, started_at, Utc::now())?;
    tracing::info!(id, finished = summary.finished, "workout recorded");
    Ok(())
}

/// One-line message for events worth keeping in the scrollback.
fn describe(event: &Event) -> Option<String> {
    match event {
        Event::TimerStarted { round, phase, remaining_secs, .. } => Some(format!(
            "round {round}: {phase} started ({})",
            format_clock(*remaining_secs)
        )),
        Event::TimerPaused { round, phase, remaining_secs, .. } => Some(format!(
            "round {round}: {phase} paused at {}",
            format_clock(*remaining_secs)
        )),
        Event::PhaseChanged { phase, round, running, .. } => Some(match (phase, running) {
            (TimerPhase::Rest, true) => format!("round {round}: rest"),
            (TimerPhase::Rest, false) => format!("round {round}: rest ready, press s"),
            (TimerPhase::Work, true) => format!("round {round}: work"),
            (TimerPhase::Work, false) => format!("round {round}: work ready, press s"),
        }),
        Event::SessionFinished { total_rounds, .. } => {
            Some(format!("workout finished: {total_rounds} rounds"))
        }
        Event::TimerReset { .. } => Some("reset to round 1".to_string()),
        Event::PlanChanged { phase, duration_secs, .. } => Some(format!(
            "{phase} set to {} from the next round",
            format_clock(*duration_secs)
        )),
        Event::StateSnapshot { .. } => None,
    }
}

/// `[2/5] Work  01:15 [##########..........]`
fn status_line(snapshot: &Event) -> Option<String> {
    let Event::StateSnapshot {
        phase,
        current_round,
        total_rounds,
        remaining_display,
        progress,
        state,
        ..
    } = snapshot
    else {
        return None;
    };
    let filled = ((progress * PROGRESS_WIDTH as f64).round() as usize).min(PROGRESS_WIDTH);
    let bar = format!("{}{}", "#".repeat(filled), ".".repeat(PROGRESS_WIDTH - filled));
    let marker = match state {
        TimerState::Running => "",
        TimerState::Ready => " (ready)",
        TimerState::Paused => " (paused)",
        TimerState::Finished => " (finished)",
    };
    Some(format!(
        "[{current_round}/{total_rounds}] {:<5} {remaining_display} [{bar}]{marker}",
        phase.label()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_renders_progress_bar() {
        let plan = IntervalPlan::new(4, 2, 3).unwrap();
        let mut timer = IntervalTimer::new(plan, AdvancePolicy::default());
        timer.start();
        timer.tick();
        timer.tick();
        let line = status_line(&timer.snapshot()).unwrap();
        assert_eq!(line, "[1/3] Work  00:02 [##########..........]");
    }

    #[test]
    fn status_line_marks_untouched_phase_ready() {
        let line = status_line(&IntervalTimer::default().snapshot()).unwrap();
        assert!(line.ends_with("(ready)"));
        assert!(line.contains("02:30"));
    }

    #[test]
    fn status_line_marks_paused() {
        let mut timer = IntervalTimer::default();
        timer.start();
        timer.tick();
        timer.pause();
        let line = status_line(&timer.snapshot()).unwrap();
        assert!(line.ends_with("(paused)"));
        assert!(line.contains("02:29"));
    }

    #[test]
    fn status_line_marks_finished() {
        let mut timer = IntervalTimer::new(IntervalPlan::new(1, 1, 1).unwrap(), AdvancePolicy::continuous());
        timer.start();
        timer.tick();
        timer.tick();
        let line = status_line(&timer.snapshot()).unwrap();
        assert_eq!(line, "[1/1] Rest  00:00 [####################] (finished)");
    }

    #[test]
    fn describe_covers_every_event() {
        let at = Utc::now();
        let cases = [
            (
                Event::TimerStarted { round: 2, phase: TimerPhase::Work, remaining_secs: 75, at },
                Some("round 2: Work started (01:15)"),
            ),
            (
                Event::TimerPaused { round: 1, phase: TimerPhase::Rest, remaining_secs: 9, at },
                Some("round 1: Rest paused at 00:09"),
            ),
            (
                Event::PhaseChanged {
                    completed: TimerPhase::Work,
                    phase: TimerPhase::Rest,
                    round: 1,
                    duration_secs: 30,
                    running: true,
                    at,
                },
                Some("round 1: rest"),
            ),
            (
                Event::PhaseChanged {
                    completed: TimerPhase::Work,
                    phase: TimerPhase::Rest,
                    round: 1,
                    duration_secs: 30,
                    running: false,
                    at,
                },
                Some("round 1: rest ready, press s"),
            ),
            (
                Event::PhaseChanged {
                    completed: TimerPhase::Rest,
                    phase: TimerPhase::Work,
                    round: 2,
                    duration_secs: 150,
                    running: true,
                    at,
                },
                Some("round 2: work"),
            ),
            (
                Event::PhaseChanged {
                    completed: TimerPhase::Rest,
                    phase: TimerPhase::Work,
                    round: 2,
                    duration_secs: 150,
                    running: false,
                    at,
                },
                Some("round 2: work ready, press s"),
            ),
            (
                Event::SessionFinished {
                    total_rounds: 5,
                    work_elapsed_secs: 750,
                    rest_elapsed_secs: 150,
                    at,
                },
                Some("workout finished: 5 rounds"),
            ),
            (Event::TimerReset { at }, Some("reset to round 1")),
            (
                Event::PlanChanged { phase: TimerPhase::Rest, duration_secs: 45, at },
                Some("Rest set to 00:45 from the next round"),
            ),
            (IntervalTimer::default().snapshot(), None),
        ];
        for (event, expected) in cases {
            assert_eq!(describe(&event).as_deref(), expected, "{event:?}");
        }
    }

    #[test]
    fn policy_flags_override_config() {
        let configured = AdvancePolicy::default();
        assert_eq!(resolve_policy(configured, false, false), configured);
        assert_eq!(resolve_policy(configured, true, false), AdvancePolicy::continuous());

        let manual_rest = resolve_policy(configured, false, true);
        assert!(!manual_rest.auto_start_rest);
        assert!(!manual_rest.auto_start_next_round);

        let configured = AdvancePolicy::continuous();
        let manual_rest = resolve_policy(configured, false, true);
        assert!(!manual_rest.auto_start_rest);
        assert!(manual_rest.auto_start_next_round);
    }

    #[test]
    fn parse_basic_commands() {
        let options = [20, 25, 30];
        assert_eq!(parse_command("s", &options), Ok(Some(LineCommand::Start)));
        assert_eq!(parse_command(" p ", &options), Ok(Some(LineCommand::Pause)));
        assert_eq!(parse_command("r", &options), Ok(Some(LineCommand::Reset)));
        assert_eq!(parse_command("q", &options), Ok(Some(LineCommand::Quit)));
        assert_eq!(parse_command("   ", &options), Ok(None));
        assert!(parse_command("x", &options).unwrap_err().contains("unknown command"));
        assert!(parse_command("s now", &options).is_err());
    }

    #[test]
    fn parse_duration_commands() {
        let options = [20, 25, 30];
        assert_eq!(parse_command("w 45", &options), Ok(Some(LineCommand::SetWork(45))));
        assert_eq!(parse_command("rest 10", &options), Ok(Some(LineCommand::SetRest(10))));
        // zero parses; the session rejects it
        assert_eq!(parse_command("w 0", &options), Ok(Some(LineCommand::SetWork(0))));
        assert!(parse_command("w", &options).is_err());
        assert!(parse_command("w ten", &options).unwrap_err().contains("ten"));
        assert!(parse_command("w 1 2", &options).is_err());
    }

    #[test]
    fn parse_preset_picks_round_option() {
        let options = [20, 25, 30];
        assert_eq!(parse_command("o 1", &options), Ok(Some(LineCommand::SetWork(20))));
        assert_eq!(parse_command("o 3", &options), Ok(Some(LineCommand::SetWork(30))));
        assert!(parse_command("o 0", &options).unwrap_err().contains("no preset"));
        assert!(parse_command("o 4", &options).is_err());
        assert!(parse_command("o 1", &[]).is_err());
    }

    #[test]
    fn status_line_ignores_other_events() {
        assert!(status_line(&Event::TimerReset { at: Utc::now() }).is_none());
    }

    #[test]
    fn plan_args_override_config() {
        let args = PlanArgs {
            work: Some(40),
            rest: None,
            rounds: Some(2),
        };
        let plan = args.resolve(&Config::default()).unwrap();
        assert_eq!(plan.work_secs(), 40);
        assert_eq!(plan.rest_secs(), 30);
        assert_eq!(plan.total_rounds(), 2);
    }

    #[test]
    fn plan_args_reject_zero_rounds() {
        let args = PlanArgs {
            rounds: Some(0),
            ..PlanArgs::default()
        };
        assert!(args.resolve(&Config::default()).is_err());
    }

    #[test]
    fn simulate_prints_full_session() {
        let mut out = Vec::new();
        simulate(IntervalPlan::new(3, 2, 2).unwrap(), None, &mut out).unwrap();
        let lines: Vec<serde_json::Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let types: Vec<&str> = lines.iter().map(|v| v["type"].as_str().unwrap()).collect();
        assert_eq!(
            types,
            [
                "timer_started",
                "phase_changed",
                "phase_changed",
                "phase_changed",
                "session_finished",
                "state_snapshot"
            ]
        );
        assert_eq!(lines[5]["state"], "finished");
    }

    #[test]
    fn simulate_respects_tick_limit() {
        let mut out = Vec::new();
        simulate(IntervalPlan::new(3, 2, 2).unwrap(), Some(4), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let last: serde_json::Value = serde_json::from_str(text.lines().last().unwrap()).unwrap();
        assert_eq!(last["phase"], "rest");
        assert_eq!(last["remaining_secs"], 1);
    }
}
