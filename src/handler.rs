//! Interpreting engine output for a single request.
//!
//! Every queued request carries a [`ResponseHandler`]. While the request is
//! at the head of the queue each engine line is shown to the handler twice:
//! first through [`on_line`](ResponseHandler::on_line) so it can accumulate
//! state, then through [`is_complete`](ResponseHandler::is_complete). The
//! first line that completes the request is passed to
//! [`complete`](ResponseHandler::complete) and the request leaves the queue.
//!
//! The built-in handlers cover every operation on [`UciEngine`](crate::UciEngine).
//! Custom handlers can be run with [`UciEngine::execute`](crate::UciEngine::execute).

use std::time::Duration;

use crate::observer::SearchObserver;
use crate::protocol::{
    has_marker, BenchmarkReport, BestMove, Command, MoveApplied, SearchInfo, BENCH_COMPLETE,
    BEST_MOVE, INFO_STRING, MOVE_MADE, PRINTBOARD_DONE,
};
use crate::{Error, Result};

/// How the supervisor should clean up after a request timed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interrupt {
    /// Written to the engine once every request ahead of the timed-out one
    /// has been answered, i.e. when the engine is working on it.
    ///
    /// Without a command the engine is left to finish, and its late output
    /// is swallowed for up to the request's own timeout.
    pub command: Option<Command>,
    /// The late completion line that must be swallowed instead of being
    /// routed to the next request.
    pub drain_marker: &'static str,
}

/// Operation-specific logic for recognizing and collecting a response.
pub trait ResponseHandler: Send + 'static {
    /// The value produced when the request completes.
    type Output: Send + 'static;

    /// Observe a line routed to this request. Called before
    /// [`is_complete`](Self::is_complete) for the same line.
    fn on_line(&mut self, line: &str) {
        let _ = line;
    }

    /// Whether `line` completes the request.
    fn is_complete(&self, line: &str) -> bool;

    /// Produce the result from the completing line.
    fn complete(self, line: String) -> Result<Self::Output>;

    /// Produce the result when no completing line arrived within `after`.
    fn timed_out(self, after: Duration) -> Result<Self::Output>
    where
        Self: Sized,
    {
        Err(Error::Timeout(after))
    }

    /// Cleanup to perform after a timeout, if any.
    fn interrupt(&self) -> Option<Interrupt> {
        None
    }
}

// -----------------------------------------------------------------------------
// Generic line matching
// -----------------------------------------------------------------------------

/// Completes on the first line accepted by a predicate and returns it.
pub struct LineMatch<F> {
    predicate: F,
}

impl<F> LineMatch<F>
where
    F: Fn(&str) -> bool + Send + 'static,
{
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl LineMatch<fn(&str) -> bool> {
    /// Complete on `readyok`.
    pub fn ready() -> Self {
        fn is_ready(line: &str) -> bool {
            has_marker(line, crate::protocol::READY_OK)
        }
        Self {
            predicate: is_ready,
        }
    }
}

impl<F> ResponseHandler for LineMatch<F>
where
    F: Fn(&str) -> bool + Send + 'static,
{
    type Output = String;

    fn is_complete(&self, line: &str) -> bool {
        (self.predicate)(line)
    }

    fn complete(self, line: String) -> Result<String> {
        Ok(line)
    }
}

// -----------------------------------------------------------------------------
// Search
// -----------------------------------------------------------------------------

/// Collects `info` lines until `bestmove`.
///
/// On timeout the first move of the most recent principal variation is
/// returned, or the null move if none was seen.
pub struct SearchHandler {
    last_pv_move: Option<String>,
    observer: Option<Box<dyn SearchObserver>>,
}

impl SearchHandler {
    pub fn new() -> Self {
        Self {
            last_pv_move: None,
            observer: None,
        }
    }

    /// Forward progress to `observer`.
    pub fn with_observer(observer: impl SearchObserver) -> Self {
        Self {
            last_pv_move: None,
            observer: Some(Box::new(observer)),
        }
    }
}

impl Default for SearchHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseHandler for SearchHandler {
    type Output = BestMove;

    fn on_line(&mut self, line: &str) {
        let Some(info) = SearchInfo::parse(line) else {
            if let Some(observer) = self.observer.as_mut() {
                observer.on_line(line);
            }
            return;
        };
        if let Some(mv) = info.best_move() {
            self.last_pv_move = Some(mv.to_string());
        }
        if let Some(observer) = self.observer.as_mut() {
            observer.on_line(line);
            observer.on_info(&info);
        }
    }

    fn is_complete(&self, line: &str) -> bool {
        has_marker(line, BEST_MOVE)
    }

    fn complete(self, line: String) -> Result<BestMove> {
        Ok(BestMove::parse(&line).unwrap_or_else(|| BestMove::fallback(self.last_pv_move)))
    }

    fn timed_out(self, after: Duration) -> Result<BestMove> {
        tracing::warn!(
            ?after,
            fallback = ?self.last_pv_move,
            "search timed out, using last principal variation"
        );
        Ok(BestMove::fallback(self.last_pv_move))
    }

    fn interrupt(&self) -> Option<Interrupt> {
        Some(Interrupt {
            command: Some(Command::Stop),
            drain_marker: BEST_MOVE,
        })
    }
}

// -----------------------------------------------------------------------------
// Benchmark
// -----------------------------------------------------------------------------

/// Accumulates benchmark metrics until the completion banner.
///
/// A timeout is not an error: whatever was parsed so far is returned with
/// [`is_partial`](BenchmarkReport::is_partial) set.
#[derive(Debug, Default)]
pub struct BenchHandler {
    report: BenchmarkReport,
}

impl BenchHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResponseHandler for BenchHandler {
    type Output = BenchmarkReport;

    fn on_line(&mut self, line: &str) {
        self.report.absorb(line);
    }

    fn is_complete(&self, line: &str) -> bool {
        line.starts_with(BENCH_COMPLETE)
    }

    fn complete(self, _line: String) -> Result<BenchmarkReport> {
        Ok(self.report)
    }

    fn timed_out(mut self, after: Duration) -> Result<BenchmarkReport> {
        tracing::warn!(
            ?after,
            lines = self.report.raw_lines.len(),
            "benchmark timed out, returning partial report"
        );
        self.report.is_partial = true;
        Ok(self.report)
    }

    fn interrupt(&self) -> Option<Interrupt> {
        Some(Interrupt {
            command: None,
            drain_marker: BENCH_COMPLETE,
        })
    }
}

// -----------------------------------------------------------------------------
// Board commands
// -----------------------------------------------------------------------------

/// Collects the board dump printed by `printboard`.
#[derive(Debug, Default)]
pub struct BoardHandler {
    lines: Vec<String>,
}

impl BoardHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_rejection(line: &str, verb: &str) -> bool {
    has_marker(line, INFO_STRING) && line[INFO_STRING.len()..].contains(verb)
}

fn rejection(line: &str) -> Error {
    Error::EngineRejected {
        message: line
            .strip_prefix(INFO_STRING)
            .unwrap_or(line)
            .trim()
            .to_string(),
    }
}

impl ResponseHandler for BoardHandler {
    type Output = Vec<String>;

    fn on_line(&mut self, line: &str) {
        if !has_marker(line, PRINTBOARD_DONE) && !has_marker(line, INFO_STRING) {
            self.lines.push(line.to_string());
        }
    }

    fn is_complete(&self, line: &str) -> bool {
        has_marker(line, PRINTBOARD_DONE) || is_rejection(line, "printboard")
    }

    fn complete(self, line: String) -> Result<Vec<String>> {
        if has_marker(&line, PRINTBOARD_DONE) {
            Ok(self.lines)
        } else {
            Err(rejection(&line))
        }
    }
}

/// Waits for `move_made` after a `makemove` command.
#[derive(Debug, Default)]
pub struct MakeMoveHandler;

impl ResponseHandler for MakeMoveHandler {
    type Output = MoveApplied;

    fn is_complete(&self, line: &str) -> bool {
        has_marker(line, MOVE_MADE) || is_rejection(line, "makemove")
    }

    fn complete(self, line: String) -> Result<MoveApplied> {
        MoveApplied::parse(&line).ok_or_else(|| rejection(&line))
    }
}
