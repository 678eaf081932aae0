//! High-level engine handle.
//!
//! This module provides [`UciEngine`], the main entry point for driving a
//! supervised UCI engine.
//!
//! # Example
//!
//! ```ignore
//! use libuci::{Position, Result, SearchOptions, UciEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let engine = UciEngine::builder()
//!         .engine_path("./engines/myengine/build/myengine")
//!         .build()?;
//!
//!     engine.start().await?;
//!     engine.new_game().await?;
//!     engine.set_position(Position::StartPos, ["e2e4", "e7e5"]).await?;
//!     let best = engine.search(SearchOptions::depth(10)).await?;
//!     println!("bestmove {}", best.mv);
//!
//!     engine.stop().await
//! }
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};

use crate::config::{
    BenchOptions, EngineConfig, EngineConfigBuilder, Position, SearchOptions, TimeoutPolicy,
};
use crate::handler::{
    BenchHandler, BoardHandler, LineMatch, MakeMoveHandler, ResponseHandler, SearchHandler,
};
use crate::observer::SearchObserver;
use crate::process::{CommandLauncher, EngineLauncher};
use crate::protocol::{BenchmarkReport, BestMove, Command, MoveApplied};
use crate::stream::SearchStream;
use crate::supervisor::{self, EngineStatus, FatalError, Pending, Request, SupervisorState};
use crate::{Error, Result};

/// A handle to a supervised engine process.
///
/// `UciEngine` owns nothing but channels to a background supervisor task.
/// The supervisor starts the engine lazily, serializes every command onto
/// its stdin, matches responses to requests in order and restarts the
/// engine after a crash.
///
/// # Thread Safety
///
/// `UciEngine` is `Send + Sync` and cheap to clone. All clones drive the
/// same engine; their requests are queued in the order they arrive. The
/// engine is shut down when the last clone is dropped.
///
/// # Runtime
///
/// Constructors spawn the supervisor task and must be called from within a
/// Tokio runtime.
#[derive(Debug, Clone)]
pub struct UciEngine {
    requests: mpsc::Sender<Request>,
    status: watch::Receiver<EngineStatus>,
    fatal: Arc<Mutex<Option<mpsc::UnboundedReceiver<FatalError>>>>,
    config: Arc<EngineConfig>,
}

impl UciEngine {
    /// Create an engine with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the default configuration is invalid.
    pub fn new() -> Result<Self> {
        let config = EngineConfig::builder().build()?;
        Ok(Self::with_config(config))
    }

    /// Create an engine that spawns the configured binary.
    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_launcher(config, CommandLauncher)
    }

    /// Create an engine whose processes come from `launcher`.
    pub fn with_launcher(config: EngineConfig, launcher: impl EngineLauncher) -> Self {
        Self::spawn(config, Box::new(launcher))
    }

    fn spawn(config: EngineConfig, launcher: Box<dyn EngineLauncher>) -> Self {
        let handle = supervisor::spawn(config.clone(), launcher);
        Self {
            requests: handle.requests,
            status: handle.status,
            fatal: Arc::new(Mutex::new(Some(handle.fatal))),
            config: Arc::new(config),
        }
    }

    /// Create a builder for configuring a new engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Get the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Start the engine and wait for the handshake to finish.
    ///
    /// Returns immediately if the engine is already ready. Calling `start`
    /// after automatic restarts were exhausted resets the restart counter
    /// and tries again.
    ///
    /// # Errors
    ///
    /// - [`Error::EngineNotFound`] or [`Error::Spawn`] if the process could not be created
    /// - [`Error::EngineCrashed`] if the engine died or timed out during the handshake
    pub async fn start(&self) -> Result<()> {
        self.request(|reply| Request::Start { reply }).await
    }

    /// Ask the engine to quit, kill it after the grace period, and fail
    /// every pending request with [`Error::Stopped`].
    ///
    /// The next request starts the engine again.
    pub async fn stop(&self) -> Result<()> {
        self.request(|reply| Request::Stop { reply }).await
    }

    /// Fail every pending request with [`Error::Cancelled`] and replace the
    /// engine process. Returns the number of requests that were cancelled.
    ///
    /// This is the way out of a search or benchmark that will not finish.
    /// The restart counter is not affected.
    pub async fn cancel(&self) -> Result<usize> {
        self.request(|reply| Request::Cancel { reply }).await
    }

    /// Current lifecycle snapshot.
    pub fn status(&self) -> EngineStatus {
        *self.status.borrow()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SupervisorState {
        self.status.borrow().state
    }

    /// Subscribe to lifecycle changes.
    pub fn watch_status(&self) -> watch::Receiver<EngineStatus> {
        self.status.clone()
    }

    /// Take the receiver for the event emitted when automatic restarts are
    /// exhausted. Only the first call across all clones gets it.
    pub fn take_fatal_events(&self) -> Option<mpsc::UnboundedReceiver<FatalError>> {
        match self.fatal.lock() {
            Ok(mut fatal) => fatal.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    // -------------------------------------------------------------------------
    // Game commands
    // -------------------------------------------------------------------------

    /// Reset the engine for a new game and wait until it is ready.
    pub async fn new_game(&self) -> Result<()> {
        self.execute(
            vec![Command::NewGame, Command::IsReady],
            LineMatch::ready(),
            self.config.command_timeout(),
        )
        .await
        .map(|_| ())
    }

    /// Set the position to search from.
    ///
    /// The engine does not answer `position`, so this returns as soon as
    /// the command has been written.
    pub async fn set_position(
        &self,
        base: impl Into<Position>,
        moves: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<()> {
        let command = Command::Position {
            base: base.into(),
            moves: moves.into_iter().map(Into::into).collect(),
        };
        self.request(|reply| Request::Write { command, reply }).await
    }

    /// Search the current position.
    ///
    /// The timeout is derived from `options` by the configured
    /// [`TimeoutPolicy`]. A search that times out is not an error: the
    /// engine is told to stop and the first move of the last principal
    /// variation is returned with [`BestMove::timed_out`] set (the null
    /// move if there was none).
    pub async fn search(&self, options: SearchOptions) -> Result<BestMove> {
        let timeout = self.timeouts().search_timeout(&options);
        self.execute(vec![Command::Go(options)], SearchHandler::new(), timeout)
            .await
    }

    /// Search the current position, reporting progress to `observer`.
    ///
    /// A panicking observer is logged and otherwise ignored.
    pub async fn search_with(
        &self,
        options: SearchOptions,
        observer: impl SearchObserver,
    ) -> Result<BestMove> {
        let timeout = self.timeouts().search_timeout(&options);
        self.execute(
            vec![Command::Go(options)],
            SearchHandler::with_observer(observer),
            timeout,
        )
        .await
    }

    /// Search the current position and stream progress as it arrives.
    pub async fn search_stream(&self, options: SearchOptions) -> Result<SearchStream> {
        let timeout = self.timeouts().search_timeout(&options);
        let (handler, parts) = SearchStream::channel();
        let result = self
            .submit(vec![Command::Go(options)], handler, timeout)
            .await?;
        Ok(parts.attach(result))
    }

    /// Set a position and search it as a single request.
    pub async fn best_move(
        &self,
        base: impl Into<Position>,
        moves: impl IntoIterator<Item = impl Into<String>>,
        options: SearchOptions,
    ) -> Result<BestMove> {
        let timeout = self.timeouts().search_timeout(&options);
        let position = Command::Position {
            base: base.into(),
            moves: moves.into_iter().map(Into::into).collect(),
        };
        self.execute(
            vec![position, Command::Go(options)],
            SearchHandler::new(),
            timeout,
        )
        .await
    }

    /// Run the engine benchmark.
    ///
    /// If the benchmark does not finish in time the metrics parsed so far
    /// are returned with [`BenchmarkReport::is_partial`] set.
    pub async fn benchmark(&self, options: BenchOptions) -> Result<BenchmarkReport> {
        let timeout = self.timeouts().bench_timeout(&options);
        self.execute(vec![Command::Bench(options)], BenchHandler::new(), timeout)
            .await
    }

    /// Print the board for `fen`, or for the current position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineRejected`] if the engine cannot parse the FEN.
    pub async fn print_board(&self, fen: Option<&str>) -> Result<Vec<String>> {
        let command = Command::PrintBoard {
            fen: fen.map(str::to_string),
        };
        self.execute(vec![command], BoardHandler::new(), self.config.command_timeout())
            .await
    }

    /// Apply `mv` to `fen` and return the resulting position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineRejected`] for an invalid FEN or an illegal move.
    pub async fn make_move(&self, fen: &str, mv: &str) -> Result<MoveApplied> {
        let command = Command::MakeMove {
            fen: fen.to_string(),
            mv: mv.to_string(),
        };
        self.execute(vec![command], MakeMoveHandler, self.config.command_timeout())
            .await
    }

    // -------------------------------------------------------------------------
    // Raw access
    // -------------------------------------------------------------------------

    /// Send a raw line and wait for the first response line accepted by
    /// `is_complete`.
    ///
    /// `timeout` defaults to the configured command timeout.
    pub async fn send_command<F>(
        &self,
        line: impl Into<String>,
        is_complete: F,
        timeout: Option<Duration>,
    ) -> Result<String>
    where
        F: Fn(&str) -> bool + Send + 'static,
    {
        let timeout = timeout.unwrap_or(self.config.command_timeout());
        self.execute(
            vec![Command::Raw(line.into())],
            LineMatch::new(is_complete),
            timeout,
        )
        .await
    }

    /// Write `commands` in order and interpret the response with `handler`.
    pub async fn execute<H: ResponseHandler>(
        &self,
        commands: Vec<Command>,
        handler: H,
        timeout: Duration,
    ) -> Result<H::Output> {
        let result = self.submit(commands, handler, timeout).await?;
        result.await.map_err(|_| Error::SupervisorGone)?
    }

    async fn submit<H: ResponseHandler>(
        &self,
        commands: Vec<Command>,
        handler: H,
        timeout: Duration,
    ) -> Result<oneshot::Receiver<Result<H::Output>>> {
        let (reply, result) = oneshot::channel();
        let label = commands
            .last()
            .map(|command| command.verb().to_string())
            .unwrap_or_default();
        let request = Request::Submit {
            commands,
            label,
            timeout,
            responder: Box::new(Pending::new(handler, reply, timeout)),
        };
        self.requests
            .send(request)
            .await
            .map_err(|_| Error::SupervisorGone)?;
        Ok(result)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> Request,
    ) -> Result<T> {
        let (reply, result) = oneshot::channel();
        self.requests
            .send(make(reply))
            .await
            .map_err(|_| Error::SupervisorGone)?;
        result.await.map_err(|_| Error::SupervisorGone)?
    }

    fn timeouts(&self) -> &TimeoutPolicy {
        self.config.timeouts()
    }
}

/// Builder for creating a [`UciEngine`] with custom configuration.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
///
/// let engine = UciEngine::builder()
///     .engine_path("/usr/local/bin/stockfish")
///     .max_restarts(5)
///     .restart_backoff(Duration::from_millis(250))
///     .build()?;
/// ```
pub struct EngineBuilder {
    inner: EngineConfigBuilder,
    launcher: Option<Box<dyn EngineLauncher>>,
}

impl EngineBuilder {
    /// Create a new engine builder with default settings.
    pub fn new() -> Self {
        Self {
            inner: EngineConfigBuilder::default(),
            launcher: None,
        }
    }

    /// Build the engine and spawn its supervisor.
    ///
    /// The engine process itself is not started until [`UciEngine::start`]
    /// is called or the first request arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> Result<UciEngine> {
        let config = self.inner.build()?;
        Ok(match self.launcher {
            Some(launcher) => UciEngine::spawn(config, launcher),
            None => UciEngine::with_config(config),
        })
    }

    /// Use `launcher` instead of spawning the configured binary.
    pub fn launcher(mut self, launcher: impl EngineLauncher) -> Self {
        self.launcher = Some(Box::new(launcher));
        self
    }

    // -------------------------------------------------------------------------
    // Process options (delegated to EngineConfigBuilder)
    // -------------------------------------------------------------------------

    /// Path to the engine binary.
    pub fn engine_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.inner = self.inner.engine_path(path);
        self
    }

    /// Read the engine path from `UCI_ENGINE_PATH`.
    pub fn engine_path_from_env(mut self) -> Self {
        self.inner = self.inner.engine_path_from_env();
        self
    }

    /// Add a command-line argument for the engine.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.inner = self.inner.arg(arg);
        self
    }

    /// Add command-line arguments for the engine.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.inner = self.inner.args(args);
        self
    }

    /// Working directory for the engine process.
    pub fn working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.inner = self.inner.working_directory(path);
        self
    }

    /// Set an environment variable for the engine process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner = self.inner.env(key, value);
        self
    }

    /// Whether the engine inherits this process's environment.
    pub fn inherit_env(mut self, inherit: bool) -> Self {
        self.inner = self.inner.inherit_env(inherit);
        self
    }

    // -------------------------------------------------------------------------
    // Timing (delegated to EngineConfigBuilder)
    // -------------------------------------------------------------------------

    /// Budget for each handshake step.
    pub fn handshake_timeout(mut self, duration: Duration) -> Self {
        self.inner = self.inner.handshake_timeout(duration);
        self
    }

    /// Budget for commands without a derived timeout.
    pub fn command_timeout(mut self, duration: Duration) -> Self {
        self.inner = self.inner.command_timeout(duration);
        self
    }

    /// How long the engine gets to exit after `quit`.
    pub fn quit_grace(mut self, duration: Duration) -> Self {
        self.inner = self.inner.quit_grace(duration);
        self
    }

    /// How long to wait for a late `bestmove` after a search timed out.
    pub fn stop_drain_timeout(mut self, duration: Duration) -> Self {
        self.inner = self.inner.stop_drain_timeout(duration);
        self
    }

    /// Heuristics for search and benchmark timeouts.
    pub fn timeouts(mut self, timeouts: TimeoutPolicy) -> Self {
        self.inner = self.inner.timeouts(timeouts);
        self
    }

    // -------------------------------------------------------------------------
    // Restart policy (delegated to EngineConfigBuilder)
    // -------------------------------------------------------------------------

    /// Consecutive automatic restarts before giving up.
    pub fn max_restarts(mut self, max: u32) -> Self {
        self.inner = self.inner.max_restarts(max);
        self
    }

    /// Delay before each automatic restart.
    pub fn restart_backoff(mut self, duration: Duration) -> Self {
        self.inner = self.inner.restart_backoff(duration);
        self
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::EngineProcess;

    fn failing_launcher(_: &EngineConfig) -> Result<EngineProcess> {
        Err(Error::EngineNotFound {
            searched: "test-engine".into(),
        })
    }

    #[test]
    fn engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<UciEngine>();
    }

    #[test]
    fn builder_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<EngineBuilder>();
    }

    #[test]
    fn engine_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<UciEngine>();
    }

    #[tokio::test]
    async fn builder_chains_options() {
        let engine = UciEngine::builder()
            .engine_path("/opt/engines/myengine")
            .arg("--threads=1")
            .max_restarts(5)
            .restart_backoff(Duration::from_millis(10))
            .command_timeout(Duration::from_secs(3))
            .build()
            .unwrap();

        assert_eq!(engine.config().engine_command(), "/opt/engines/myengine");
        assert_eq!(engine.config().args(), ["--threads=1"]);
        assert_eq!(engine.config().max_restarts(), 5);
        assert_eq!(engine.config().command_timeout(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn builder_rejects_invalid_config() {
        let result = UciEngine::builder()
            .handshake_timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn starts_stopped() {
        let engine = UciEngine::builder()
            .launcher(failing_launcher)
            .build()
            .unwrap();
        let status = engine.status();
        assert_eq!(status.state, SupervisorState::Stopped);
        assert_eq!(status.restart_count, 0);
        assert!(!status.gave_up);
    }

    #[tokio::test]
    async fn fatal_events_taken_once() {
        let engine = UciEngine::builder()
            .launcher(failing_launcher)
            .build()
            .unwrap();
        let clone = engine.clone();
        assert!(clone.take_fatal_events().is_some());
        assert!(engine.take_fatal_events().is_none());
    }

    #[tokio::test]
    async fn spawn_failure_is_returned_to_caller() {
        let engine = UciEngine::builder()
            .launcher(failing_launcher)
            .build()
            .unwrap();

        let err = engine.start().await.unwrap_err();
        assert!(matches!(err, Error::EngineNotFound { .. }));
        assert_eq!(engine.state(), SupervisorState::Stopped);

        // lazy starts fail the same way and do not schedule restarts
        let err = engine.search(SearchOptions::depth(1)).await.unwrap_err();
        assert!(matches!(err, Error::EngineNotFound { .. }));
        assert_eq!(engine.status().restart_count, 0);
    }
}
