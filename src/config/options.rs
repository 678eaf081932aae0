//! Type-safe options for engine operations.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Base position for a `position` command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// The standard initial position.
    #[default]
    StartPos,
    /// An arbitrary position in FEN notation.
    Fen(String),
}

impl Position {
    /// Create a FEN position.
    pub fn fen(fen: impl Into<String>) -> Self {
        Position::Fen(fen.into())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::StartPos => write!(f, "startpos"),
            Position::Fen(fen) => write!(f, "fen {}", fen.trim()),
        }
    }
}

impl From<&str> for Position {
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("startpos") {
            Position::StartPos
        } else {
            Position::Fen(s.to_string())
        }
    }
}

/// Remaining time on both clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Clock {
    pub white: Duration,
    pub black: Duration,
    pub white_increment: Duration,
    pub black_increment: Duration,
    /// Moves until the next time control, if any.
    pub moves_to_go: Option<u32>,
}

impl Clock {
    /// Both sides with the same time and increment.
    pub fn symmetric(time: Duration, increment: Duration) -> Self {
        Self {
            white: time,
            black: time,
            white_increment: increment,
            black_increment: increment,
            moves_to_go: None,
        }
    }

    /// The largest amount of time either side could spend on this move.
    pub fn budget(&self) -> Duration {
        self.white
            .max(self.black)
            .saturating_add(self.white_increment.max(self.black_increment))
    }
}

/// Limits for a `go` command.
///
/// Fields combine the way the engine combines them: a depth limit can be
/// sent alongside clock times, and a fixed move time overrides the clock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct SearchOptions {
    pub depth: Option<u32>,
    pub clock: Option<Clock>,
    pub move_time: Option<Duration>,
}

impl SearchOptions {
    /// Search to a fixed depth.
    pub fn depth(depth: u32) -> Self {
        Self {
            depth: Some(depth),
            ..Default::default()
        }
    }

    /// Search for a fixed amount of time.
    pub fn move_time(time: Duration) -> Self {
        Self {
            move_time: Some(time),
            ..Default::default()
        }
    }

    /// Search with game clock information.
    pub fn clock(clock: Clock) -> Self {
        Self {
            clock: Some(clock),
            ..Default::default()
        }
    }

    /// Add a depth limit.
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }
}

/// How the benchmark search phase is bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchMode {
    /// Search every benchmark position to a fixed depth.
    Depth(u32),
    /// Search every benchmark position for a fixed time.
    MoveTime(Duration),
}

impl Default for BenchMode {
    fn default() -> Self {
        BenchMode::Depth(9)
    }
}

/// Options for the `bench` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BenchOptions {
    pub mode: BenchMode,
    /// Duration of the static evaluation throughput phase.
    pub eval_duration: Duration,
    pub run_eval: bool,
    pub run_search: bool,
}

impl Default for BenchOptions {
    fn default() -> Self {
        Self {
            mode: BenchMode::default(),
            eval_duration: Duration::from_millis(2000),
            run_eval: true,
            run_search: true,
        }
    }
}

impl BenchOptions {
    /// Fixed-depth benchmark.
    pub fn depth(depth: u32) -> Self {
        Self {
            mode: BenchMode::Depth(depth),
            ..Default::default()
        }
    }

    /// Fixed-time benchmark.
    pub fn move_time(time: Duration) -> Self {
        Self {
            mode: BenchMode::MoveTime(time),
            ..Default::default()
        }
    }

    /// Set the evaluation phase duration.
    pub fn eval_duration(mut self, duration: Duration) -> Self {
        self.eval_duration = duration;
        self
    }

    /// Skip the evaluation phase.
    pub fn no_eval(mut self) -> Self {
        self.run_eval = false;
        self
    }

    /// Skip the search phase.
    pub fn no_search(mut self) -> Self {
        self.run_search = false;
        self
    }
}

/// Constants used to derive per-operation timeouts.
///
/// The defaults are heuristics; tune them for engines that are much slower
/// or faster than usual.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeoutPolicy {
    /// Added to a time-bounded search before giving up on `bestmove`.
    pub search_margin: Duration,
    /// Budget for a search bounded only by depth.
    pub depth_search_timeout: Duration,
    /// Budget for the search phase of a depth-mode benchmark.
    pub bench_depth_ceiling: Duration,
    /// Number of positions searched by a time-mode benchmark.
    pub bench_time_multiplier: u32,
    /// Scale applied to the computed benchmark workload.
    pub bench_safety_factor: f64,
    /// Lower bound for any benchmark timeout.
    pub bench_min_timeout: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            search_margin: Duration::from_secs(2),
            depth_search_timeout: Duration::from_secs(60),
            bench_depth_ceiling: Duration::from_secs(120),
            bench_time_multiplier: 3,
            bench_safety_factor: 1.5,
            bench_min_timeout: Duration::from_secs(15),
        }
    }
}

impl TimeoutPolicy {
    /// Timeout for a search with the given limits. Saturates at
    /// [`Duration::MAX`].
    pub fn search_timeout(&self, options: &SearchOptions) -> Duration {
        if let Some(move_time) = options.move_time {
            return move_time.saturating_add(self.search_margin);
        }
        if let Some(clock) = options.clock {
            return clock.budget().saturating_add(self.search_margin);
        }
        self.depth_search_timeout
    }

    /// Timeout for a benchmark with the given options. Saturates at
    /// [`Duration::MAX`].
    pub fn bench_timeout(&self, options: &BenchOptions) -> Duration {
        let eval = if options.run_eval {
            options.eval_duration
        } else {
            Duration::ZERO
        };
        let search = if !options.run_search {
            Duration::ZERO
        } else {
            match options.mode {
                BenchMode::Depth(_) => self.bench_depth_ceiling,
                BenchMode::MoveTime(time) => time.saturating_mul(self.bench_time_multiplier),
            }
        };

        let workload = eval.saturating_add(search);
        Duration::try_from_secs_f64(workload.as_secs_f64() * self.bench_safety_factor)
            .unwrap_or(Duration::MAX)
            .max(self.bench_min_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_display() {
        assert_eq!(Position::StartPos.to_string(), "startpos");
        assert_eq!(
            Position::fen("8/8/8/8/8/8/8/K6k w - - 0 1").to_string(),
            "fen 8/8/8/8/8/8/8/K6k w - - 0 1"
        );
    }

    #[test]
    fn position_from_str() {
        assert_eq!(Position::from("startpos"), Position::StartPos);
        assert_eq!(Position::from(""), Position::StartPos);
        assert_eq!(
            Position::from("8/8/8/8/8/8/8/K6k w - - 0 1"),
            Position::Fen("8/8/8/8/8/8/8/K6k w - - 0 1".into())
        );
    }

    #[test]
    fn clock_budget_uses_larger_side() {
        let clock = Clock {
            white: Duration::from_secs(30),
            black: Duration::from_secs(45),
            white_increment: Duration::from_secs(2),
            black_increment: Duration::from_secs(1),
            moves_to_go: None,
        };
        assert_eq!(clock.budget(), Duration::from_secs(47));
    }

    #[test]
    fn search_timeout_move_time() {
        let policy = TimeoutPolicy::default();
        let options = SearchOptions::move_time(Duration::from_millis(100));
        assert_eq!(policy.search_timeout(&options), Duration::from_millis(2100));
    }

    #[test]
    fn search_timeout_move_time_overrides_clock() {
        let policy = TimeoutPolicy::default();
        let mut options = SearchOptions::clock(Clock::symmetric(
            Duration::from_secs(60),
            Duration::ZERO,
        ));
        options.move_time = Some(Duration::from_millis(500));
        assert_eq!(policy.search_timeout(&options), Duration::from_millis(2500));
    }

    #[test]
    fn search_timeout_clock() {
        let policy = TimeoutPolicy::default();
        let options = SearchOptions::clock(Clock::symmetric(
            Duration::from_secs(10),
            Duration::from_secs(1),
        ));
        assert_eq!(policy.search_timeout(&options), Duration::from_secs(13));
    }

    #[test]
    fn search_timeout_depth_only() {
        let policy = TimeoutPolicy::default();
        assert_eq!(
            policy.search_timeout(&SearchOptions::depth(10)),
            policy.depth_search_timeout
        );
    }

    #[test]
    fn bench_timeout_depth_mode() {
        let policy = TimeoutPolicy::default();
        // (2s eval + 120s ceiling) * 1.5
        assert_eq!(
            policy.bench_timeout(&BenchOptions::depth(9)),
            Duration::from_secs(183)
        );
    }

    #[test]
    fn bench_timeout_time_mode() {
        let policy = TimeoutPolicy::default();
        let options =
            BenchOptions::move_time(Duration::from_secs(10)).eval_duration(Duration::from_secs(4));
        // (4s + 10s * 3) * 1.5
        assert_eq!(policy.bench_timeout(&options), Duration::from_secs(51));
    }

    #[test]
    fn bench_timeout_is_floored() {
        let policy = TimeoutPolicy::default();
        let options = BenchOptions::move_time(Duration::from_millis(100)).no_eval();
        assert_eq!(policy.bench_timeout(&options), policy.bench_min_timeout);
    }

    #[test]
    fn bench_timeout_skips_disabled_phases() {
        let policy = TimeoutPolicy {
            bench_min_timeout: Duration::ZERO,
            ..Default::default()
        };
        let options = BenchOptions::depth(5)
            .eval_duration(Duration::from_secs(10))
            .no_search();
        assert_eq!(policy.bench_timeout(&options), Duration::from_secs(15));
    }

    #[test]
    fn huge_limits_saturate() {
        let policy = TimeoutPolicy::default();
        let search = SearchOptions::move_time(Duration::MAX);
        assert_eq!(policy.search_timeout(&search), Duration::MAX);

        let clock = SearchOptions::clock(Clock::symmetric(Duration::MAX, Duration::MAX));
        assert_eq!(policy.search_timeout(&clock), Duration::MAX);

        let bench = BenchOptions::move_time(Duration::MAX).eval_duration(Duration::MAX);
        assert_eq!(policy.bench_timeout(&bench), Duration::MAX);
    }

    #[test]
    fn bench_options_defaults() {
        let options = BenchOptions::default();
        assert_eq!(options.mode, BenchMode::Depth(9));
        assert_eq!(options.eval_duration, Duration::from_millis(2000));
        assert!(options.run_eval);
        assert!(options.run_search);
    }

    #[test]
    fn search_options_serde_roundtrip() {
        let options = SearchOptions::depth(12);
        let json = serde_json::to_string(&options).unwrap();
        let parsed: SearchOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(options, parsed);
    }

    #[test]
    fn types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Position>();
        assert_send_sync::<SearchOptions>();
        assert_send_sync::<BenchOptions>();
        assert_send_sync::<TimeoutPolicy>();
    }
}
