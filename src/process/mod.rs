//! Process management for the engine subprocess.
//!
//! This module handles spawning the engine and moving protocol lines in and
//! out of it. A single engine process is kept alive for many commands; the
//! supervisor decides when it is started, stopped or replaced.
//!
//! # Architecture
//!
//! ```text
//! libuci                             engine
//! ┌─────────────┐                   ┌─────────────┐
//! │ LineWriter  │───stdin (cmds)───▶│             │
//! │ LineReader  │◀──stdout (lines)──│             │
//! │ (tracing)   │◀──stderr (logs)───│             │
//! └─────────────┘                   └─────────────┘
//! ```
//!
//! # Launchers
//!
//! Processes are created through the [`EngineLauncher`] trait so the
//! supervisor can be driven by something other than a real binary.
//! [`CommandLauncher`] is the default.

mod io;
mod spawn;

pub(crate) use io::forward_stderr;
pub use io::{LineReader, LineWriter};
pub use spawn::{CommandLauncher, EngineLauncher, EngineProcess, EngineStdin, EngineStdout};
