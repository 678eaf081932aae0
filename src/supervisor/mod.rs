//! The engine supervisor.
//!
//! One background task owns the engine process, the request queue and the
//! lifecycle state. Every [`UciEngine`](crate::UciEngine) handle talks to
//! that task through a channel, so requests are handled one at a time and
//! no state is shared behind locks.
//!
//! # Lifecycle
//!
//! ```text
//!            start / first request
//!  Stopped ─────────────────────────▶ Starting ──readyok──▶ Ready
//!     ▲                                 │  ▲                  │
//!     │ stop                    crash / │  │ backoff          │ stream closed,
//!     │                        timeout  ▼  │ elapsed          │ write failed
//!     └────────────────────────────── Crashed ◀───────────────┘
//! ```
//!
//! A crash fails every queued request and schedules a restart after the
//! configured backoff. After `max_restarts` consecutive failed attempts the
//! supervisor gives up, emits a [`FatalError`] and stays in `Crashed` until
//! [`start`](crate::UciEngine::start) is called again.

mod actor;
mod pending;
mod queue;
mod restart;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::EngineConfig;
use crate::process::EngineLauncher;
use crate::protocol::Command;
use crate::Result;

pub(crate) use pending::{Pending, Responder};
pub use restart::{RestartDecision, RestartPolicy};

/// Requests buffered between handles and the supervisor task.
const REQUEST_BUFFER: usize = 64;

/// Lifecycle state of the engine process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorState {
    /// No process; the next request starts one.
    Stopped,
    /// Process spawned, handshake in progress.
    Starting,
    /// Handshake complete; commands are being served.
    Ready,
    /// The process died. A restart may be pending.
    Crashed,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SupervisorState::Stopped => "stopped",
            SupervisorState::Starting => "starting",
            SupervisorState::Ready => "ready",
            SupervisorState::Crashed => "crashed",
        };
        f.write_str(name)
    }
}

/// Snapshot published on every state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub state: SupervisorState,
    /// Restart attempts since the engine was last ready.
    pub restart_count: u32,
    /// Automatic restarts are exhausted.
    pub gave_up: bool,
    /// OS process id, when the engine is a real subprocess.
    pub pid: Option<u32>,
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self {
            state: SupervisorState::Stopped,
            restart_count: 0,
            gave_up: false,
            pid: None,
        }
    }
}

/// Emitted once when the supervisor stops restarting a crashing engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("engine gave up after {attempts} restart attempts: {reason}")]
pub struct FatalError {
    /// Restart attempts made before giving up.
    pub attempts: u32,
    /// Why the last attempt failed.
    pub reason: String,
}

pub(crate) enum Request {
    Start {
        reply: oneshot::Sender<Result<()>>,
    },
    Stop {
        reply: oneshot::Sender<Result<()>>,
    },
    /// Write `commands` in order, then wait for the responder to complete.
    Submit {
        commands: Vec<Command>,
        label: String,
        timeout: Duration,
        responder: Box<dyn Responder>,
    },
    /// Write a command that produces no answer.
    Write {
        command: Command,
        reply: oneshot::Sender<Result<()>>,
    },
    Cancel {
        reply: oneshot::Sender<Result<usize>>,
    },
}

/// Channels connecting handles to a running supervisor.
pub(crate) struct SupervisorHandle {
    pub(crate) requests: mpsc::Sender<Request>,
    pub(crate) status: watch::Receiver<EngineStatus>,
    pub(crate) fatal: mpsc::UnboundedReceiver<FatalError>,
}

/// Spawn the supervisor task on the current runtime.
///
/// The task runs until every request sender is dropped, then stops the
/// engine and exits.
pub(crate) fn spawn(config: EngineConfig, launcher: Box<dyn EngineLauncher>) -> SupervisorHandle {
    let (requests_tx, requests_rx) = mpsc::channel(REQUEST_BUFFER);
    let (status_tx, status_rx) = watch::channel(EngineStatus::default());
    let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();

    let supervisor = actor::Supervisor::new(config, launcher, requests_rx, status_tx, fatal_tx);
    tokio::spawn(supervisor.run());

    SupervisorHandle {
        requests: requests_tx,
        status: status_rx,
        fatal: fatal_rx,
    }
}
