//! Search observers.

use crate::protocol::SearchInfo;

/// Observer for search progress.
///
/// An observer receives every `info` line a search produces while the
/// search is at the head of the queue. This is for observation only; it
/// cannot influence the search.
///
/// # Implementation Notes
///
/// - Implementations must be lightweight; they run on the supervisor task
///   and delay every other request while they execute.
/// - Methods have default empty implementations for selective observation.
/// - A panic inside an observer is caught and logged; the search continues.
///
/// Closures taking `&SearchInfo` are observers too.
///
/// # Example
///
/// ```ignore
/// use libuci::{SearchInfo, SearchObserver};
///
/// struct DepthTracker {
///     deepest: u32,
/// }
///
/// impl SearchObserver for DepthTracker {
///     fn on_info(&mut self, info: &SearchInfo) {
///         self.deepest = self.deepest.max(info.depth.unwrap_or(0));
///     }
/// }
/// ```
pub trait SearchObserver: Send + 'static {
    /// Called for every parsed `info` line (not `info string`).
    fn on_info(&mut self, info: &SearchInfo) {
        let _ = info;
    }

    /// Called for every raw line routed to the search, before parsing.
    fn on_line(&mut self, line: &str) {
        let _ = line;
    }
}

impl<F> SearchObserver for F
where
    F: FnMut(&SearchInfo) + Send + 'static,
{
    fn on_info(&mut self, info: &SearchInfo) {
        self(info)
    }
}

/// Observer that logs search progress using tracing.
///
/// # Example
///
/// ```ignore
/// use libuci::{LoggingObserver, SearchOptions};
///
/// let best = engine
///     .search_with(SearchOptions::depth(12), LoggingObserver::new())
///     .await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct LoggingObserver {
    level: LogLevel,
}

/// Log level for LoggingObserver.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogLevel {
    /// Log at trace level.
    Trace,
    /// Log at debug level (default).
    #[default]
    Debug,
    /// Log at info level.
    Info,
}

impl LoggingObserver {
    /// Create a new logging observer with debug level.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a logging observer with a specific level.
    pub fn with_level(level: LogLevel) -> Self {
        Self { level }
    }
}

impl SearchObserver for LoggingObserver {
    fn on_info(&mut self, info: &SearchInfo) {
        let pv = info.pv.join(" ");
        match self.level {
            LogLevel::Trace => {
                tracing::trace!(depth = ?info.depth, score = ?info.score, nodes = ?info.nodes, pv = %pv, "search info");
            }
            LogLevel::Debug => {
                tracing::debug!(depth = ?info.depth, score = ?info.score, nodes = ?info.nodes, pv = %pv, "search info");
            }
            LogLevel::Info => {
                tracing::info!(depth = ?info.depth, score = ?info.score, nodes = ?info.nodes, pv = %pv, "search info");
            }
        }
    }
}
