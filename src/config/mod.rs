//! Configuration for the engine supervisor.
//!
//! This module provides:
//!
//! - [`EngineConfig`] and [`EngineConfigBuilder`] for configuring the supervisor
//! - Type-safe operation options like [`SearchOptions`], [`BenchOptions`] and [`Position`]
//! - [`TimeoutPolicy`] holding the heuristics used to derive operation timeouts
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use libuci::config::{EngineConfig, TimeoutPolicy};
//!
//! let config = EngineConfig::builder()
//!     .engine_path("./engines/myengine/build/myengine")
//!     .handshake_timeout(Duration::from_secs(5))
//!     .timeouts(TimeoutPolicy {
//!         search_margin: Duration::from_secs(1),
//!         ..Default::default()
//!     })
//!     .build()?;
//! ```

pub mod builder;
pub mod options;

pub use builder::{EngineConfig, EngineConfigBuilder, DEFAULT_ENGINE_COMMAND, ENV_ENGINE_PATH};
pub use options::{BenchMode, BenchOptions, Clock, Position, SearchOptions, TimeoutPolicy};
