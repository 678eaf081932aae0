//! # libuci
//!
//! Async supervisor for UCI chess engines.
//!
//! This library keeps a single engine process alive behind a typed,
//! cloneable handle, supporting:
//! - Lazy startup with the `uci` / `isready` handshake
//! - Ordered request/response matching over the line protocol
//! - Per-request timeouts with best-effort search fallbacks
//! - Automatic, bounded restarts after crashes
//! - Streaming search progress with async iterators
//!
//! ## Quick Start
//!
//! ```ignore
//! use libuci::{Position, Result, SearchOptions, UciEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let engine = UciEngine::builder().engine_path("stockfish").build()?;
//!     engine.set_position(Position::StartPos, ["e2e4"]).await?;
//!     let best = engine.search(SearchOptions::depth(12)).await?;
//!     println!("{}", best.mv);
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming
//!
//! ```ignore
//! use futures::StreamExt;
//! use libuci::{SearchEvent, SearchOptions};
//!
//! let mut stream = engine.search_stream(SearchOptions::move_time(Duration::from_secs(1))).await?;
//! while let Some(event) = stream.next().await {
//!     if let SearchEvent::Info(info) = event? {
//!         println!("depth {:?} score {:?}", info.depth, info.score);
//!     }
//! }
//! ```
//!
//! ## Crash Handling
//!
//! ```ignore
//! let mut fatal = engine.take_fatal_events().expect("first caller");
//! tokio::spawn(async move {
//!     if let Some(event) = fatal.recv().await {
//!         tracing::error!(%event, "engine is down for good");
//!     }
//! });
//! ```
//!
//! ## Configuration
//!
//! ```ignore
//! use libuci::{TimeoutPolicy, UciEngine};
//!
//! let engine = UciEngine::builder()
//!     .engine_path_from_env()
//!     .max_restarts(5)
//!     .timeouts(TimeoutPolicy {
//!         search_margin: Duration::from_secs(1),
//!         ..Default::default()
//!     })
//!     .build()?;
//! ```

pub mod config;
mod engine;
mod error;
pub mod handler;
mod observer;
pub mod process;
pub mod protocol;
pub mod stream;
mod supervisor;

pub use error::{Error, Result};

// Re-export the main engine types at crate root
pub use engine::{EngineBuilder, UciEngine};
pub use observer::{LogLevel, LoggingObserver, SearchObserver};
pub use supervisor::{
    EngineStatus, FatalError, RestartDecision, RestartPolicy, SupervisorState,
};

// Re-export commonly used config types at crate root
pub use config::{
    BenchMode, BenchOptions, Clock, EngineConfig, EngineConfigBuilder, Position, SearchOptions,
    TimeoutPolicy,
};

// Re-export commonly used protocol types at crate root
pub use protocol::{BenchmarkReport, BestMove, Command, MoveApplied, Score, SearchInfo};

// Re-export commonly used handler types at crate root
pub use handler::{Interrupt, ResponseHandler};

// Re-export commonly used process types at crate root
pub use process::{CommandLauncher, EngineLauncher, EngineProcess};

// Re-export commonly used stream types at crate root
pub use stream::{CollectedSearch, SearchEvent, SearchStream};
