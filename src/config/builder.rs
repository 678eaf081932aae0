//! Engine configuration and builder.
//!
//! This module provides the builder pattern for configuring the engine supervisor.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use libuci::config::EngineConfig;
//!
//! let config = EngineConfig::builder()
//!     .engine_path("/usr/local/bin/stockfish")
//!     .max_restarts(5)
//!     .restart_backoff(Duration::from_millis(250))
//!     .build()?;
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use super::options::TimeoutPolicy;
use crate::{Error, Result};

/// Environment variable consulted by [`EngineConfigBuilder::engine_path_from_env`].
pub const ENV_ENGINE_PATH: &str = "UCI_ENGINE_PATH";

/// Engine command used when no path is configured.
pub const DEFAULT_ENGINE_COMMAND: &str = "stockfish";

/// Configuration for the engine supervisor.
///
/// Use [`EngineConfig::builder()`] to create a new configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    // Process options
    pub(crate) engine_path: Option<PathBuf>,
    pub(crate) args: Vec<String>,
    pub(crate) working_directory: Option<PathBuf>,
    pub(crate) env_vars: HashMap<String, String>,
    pub(crate) inherit_env: bool,

    // Protocol timing
    pub(crate) handshake_timeout: Duration,
    pub(crate) command_timeout: Duration,
    pub(crate) quit_grace: Duration,
    pub(crate) stop_drain_timeout: Duration,

    // Restart policy
    pub(crate) max_restarts: u32,
    pub(crate) restart_backoff: Duration,

    pub(crate) timeouts: TimeoutPolicy,
}

impl EngineConfig {
    /// Create a new builder for EngineConfig.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Get the engine command, or default to `stockfish`.
    pub fn engine_command(&self) -> &str {
        self.engine_path
            .as_ref()
            .and_then(|p| p.to_str())
            .unwrap_or(DEFAULT_ENGINE_COMMAND)
    }

    /// Extra arguments passed to the engine binary.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Get the working directory if set.
    pub fn working_directory(&self) -> Option<&PathBuf> {
        self.working_directory.as_ref()
    }

    /// Environment variables added to the engine process.
    pub fn env_vars(&self) -> &HashMap<String, String> {
        &self.env_vars
    }

    /// Whether the engine inherits the parent environment.
    pub fn inherit_env(&self) -> bool {
        self.inherit_env
    }

    /// Budget for each step of the `uci` / `isready` handshake.
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Budget for short request/response commands.
    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// How long `stop()` waits for the engine to exit after `quit`.
    pub fn quit_grace(&self) -> Duration {
        self.quit_grace
    }

    /// How long a late `bestmove` is swallowed after a search timed out.
    pub fn stop_drain_timeout(&self) -> Duration {
        self.stop_drain_timeout
    }

    /// Maximum consecutive automatic restarts.
    pub fn max_restarts(&self) -> u32 {
        self.max_restarts
    }

    /// Delay before each automatic restart.
    pub fn restart_backoff(&self) -> Duration {
        self.restart_backoff
    }

    /// Constants used to derive search and benchmark timeouts.
    pub fn timeouts(&self) -> &TimeoutPolicy {
        &self.timeouts
    }
}

/// Builder for [`EngineConfig`].
///
/// This builder validates the configuration when [`build()`](EngineConfigBuilder::build)
/// is called. The engine binary itself is located lazily at spawn time.
#[derive(Debug, Clone)]
pub struct EngineConfigBuilder {
    engine_path: Option<PathBuf>,
    engine_path_from_env: bool,
    args: Vec<String>,
    working_directory: Option<PathBuf>,
    env_vars: HashMap<String, String>,
    inherit_env: bool,

    handshake_timeout: Duration,
    command_timeout: Duration,
    quit_grace: Duration,
    stop_drain_timeout: Duration,

    max_restarts: u32,
    restart_backoff: Duration,

    timeouts: TimeoutPolicy,
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self {
            engine_path: None,
            engine_path_from_env: false,
            args: Vec::new(),
            working_directory: None,
            env_vars: HashMap::new(),
            inherit_env: true,
            handshake_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(10),
            quit_grace: Duration::from_millis(500),
            stop_drain_timeout: Duration::from_secs(2),
            max_restarts: 3,
            restart_backoff: Duration::from_secs(1),
            timeouts: TimeoutPolicy::default(),
        }
    }
}

impl EngineConfigBuilder {
    // -------------------------------------------------------------------------
    // Process options
    // -------------------------------------------------------------------------

    /// Path to the engine binary (default: search PATH for `stockfish`).
    pub fn engine_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.engine_path = Some(path.into());
        self.engine_path_from_env = false;
        self
    }

    /// Read the engine path from the `UCI_ENGINE_PATH` env var at build time.
    pub fn engine_path_from_env(mut self) -> Self {
        self.engine_path_from_env = true;
        self
    }

    /// Append an argument passed to the engine binary.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Replace the arguments passed to the engine binary.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Working directory for the engine process.
    pub fn working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(path.into());
        self
    }

    /// Add/override environment variable for subprocess.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    /// Don't inherit parent environment (default: inherit).
    pub fn inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = inherit;
        self
    }

    // -------------------------------------------------------------------------
    // Protocol timing
    // -------------------------------------------------------------------------

    /// Budget for each handshake step.
    pub fn handshake_timeout(mut self, duration: Duration) -> Self {
        self.handshake_timeout = duration;
        self
    }

    /// Budget for short request/response commands.
    pub fn command_timeout(mut self, duration: Duration) -> Self {
        self.command_timeout = duration;
        self
    }

    /// Grace period between `quit` and a forced kill.
    pub fn quit_grace(mut self, duration: Duration) -> Self {
        self.quit_grace = duration;
        self
    }

    /// How long to wait for a late `bestmove` after a timed-out search.
    pub fn stop_drain_timeout(mut self, duration: Duration) -> Self {
        self.stop_drain_timeout = duration;
        self
    }

    /// Replace the timeout heuristics for search and benchmark.
    pub fn timeouts(mut self, timeouts: TimeoutPolicy) -> Self {
        self.timeouts = timeouts;
        self
    }

    // -------------------------------------------------------------------------
    // Restart policy
    // -------------------------------------------------------------------------

    /// Maximum consecutive automatic restarts before giving up.
    pub fn max_restarts(mut self, max: u32) -> Self {
        self.max_restarts = max;
        self
    }

    /// Delay before each automatic restart.
    pub fn restart_backoff(mut self, duration: Duration) -> Self {
        self.restart_backoff = duration;
        self
    }

    // -------------------------------------------------------------------------
    // Build
    // -------------------------------------------------------------------------

    /// Build the configuration.
    ///
    /// This validates:
    /// - `UCI_ENGINE_PATH` is set if requested
    /// - Timeouts are non-zero
    /// - Timeout heuristics never shrink the computed workload
    /// - The working directory exists if specified
    pub fn build(self) -> Result<EngineConfig> {
        let engine_path = if self.engine_path_from_env {
            match std::env::var(ENV_ENGINE_PATH) {
                Ok(path) if !path.trim().is_empty() => Some(PathBuf::from(path)),
                _ => {
                    return Err(Error::InvalidConfig(format!(
                        "environment variable {ENV_ENGINE_PATH} not set"
                    )))
                }
            }
        } else {
            self.engine_path
        };

        if self.handshake_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "handshake_timeout must be positive".into(),
            ));
        }
        if self.command_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "command_timeout must be positive".into(),
            ));
        }
        if self.timeouts.bench_safety_factor.is_nan() || self.timeouts.bench_safety_factor < 1.0 {
            return Err(Error::InvalidConfig(
                "bench_safety_factor must be at least 1.0".into(),
            ));
        }
        if self.timeouts.bench_time_multiplier == 0 {
            return Err(Error::InvalidConfig(
                "bench_time_multiplier must be at least 1".into(),
            ));
        }

        if let Some(ref dir) = self.working_directory {
            if !dir.exists() {
                return Err(Error::InvalidConfig(format!(
                    "working directory does not exist: {}",
                    dir.display()
                )));
            }
        }

        Ok(EngineConfig {
            engine_path,
            args: self.args,
            working_directory: self.working_directory,
            env_vars: self.env_vars,
            inherit_env: self.inherit_env,
            handshake_timeout: self.handshake_timeout,
            command_timeout: self.command_timeout,
            quit_grace: self.quit_grace,
            stop_drain_timeout: self.stop_drain_timeout,
            max_restarts: self.max_restarts,
            restart_backoff: self.restart_backoff,
            timeouts: self.timeouts,
        })
    }
}
