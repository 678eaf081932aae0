//! Process spawning and lifecycle management.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};

use crate::config::EngineConfig;
use crate::{Error, Result};

/// Boxed engine input stream.
pub type EngineStdin = Box<dyn AsyncWrite + Send + Unpin>;

/// Boxed engine output stream.
pub type EngineStdout = Box<dyn AsyncRead + Send + Unpin>;

/// Creates engine processes for the supervisor.
///
/// The supervisor calls [`launch`](Self::launch) on every start and restart.
/// [`CommandLauncher`] spawns a real subprocess; tests and embedders can
/// supply their own implementation (or a closure) that wires up in-memory
/// pipes instead.
pub trait EngineLauncher: Send + 'static {
    /// Start a new engine process with stdin and stdout attached.
    fn launch(&mut self, config: &EngineConfig) -> Result<EngineProcess>;
}

impl<F> EngineLauncher for F
where
    F: FnMut(&EngineConfig) -> Result<EngineProcess> + Send + 'static,
{
    fn launch(&mut self, config: &EngineConfig) -> Result<EngineProcess> {
        self(config)
    }
}

/// Launches the configured engine binary as a child process.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandLauncher;

impl EngineLauncher for CommandLauncher {
    fn launch(&mut self, config: &EngineConfig) -> Result<EngineProcess> {
        let mut cmd = build_command(config);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::EngineNotFound {
                    searched: config.engine_command().to_string(),
                }
            } else {
                Error::Spawn(e)
            }
        })?;

        EngineProcess::from_child(child)
    }
}

/// A running engine: its pipes and, for real subprocesses, the child handle.
///
/// # Cancellation
///
/// Dropping an `EngineProcess` kills the subprocess if it's still running.
pub struct EngineProcess {
    stdin: Option<EngineStdin>,
    stdout: Option<EngineStdout>,
    stderr: Option<EngineStdout>,
    child: Option<Child>,
}

impl EngineProcess {
    /// Wrap a child spawned with piped stdin and stdout (stderr optional).
    pub fn from_child(mut child: Child) -> Result<Self> {
        let stdin = child.stdin.take().ok_or_else(|| {
            Error::Spawn(std::io::Error::other("engine stdin was not piped"))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            Error::Spawn(std::io::Error::other("engine stdout was not piped"))
        })?;
        let stderr = child
            .stderr
            .take()
            .map(|stderr| Box::new(stderr) as EngineStdout);

        Ok(Self {
            stdin: Some(Box::new(stdin)),
            stdout: Some(Box::new(stdout)),
            stderr,
            child: Some(child),
        })
    }

    /// Wrap a pair of pipes that are not backed by a child process.
    pub fn from_pipes<W, R>(stdin: W, stdout: R) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            stdin: Some(Box::new(stdin)),
            stdout: Some(Box::new(stdout)),
            stderr: None,
            child: None,
        }
    }

    /// Take the engine input stream. It can only be taken once.
    pub fn take_stdin(&mut self) -> Option<EngineStdin> {
        self.stdin.take()
    }

    /// Take the engine output stream. It can only be taken once.
    pub fn take_stdout(&mut self) -> Option<EngineStdout> {
        self.stdout.take()
    }

    /// Take the engine error stream, if it was piped.
    pub fn take_stderr(&mut self) -> Option<EngineStdout> {
        self.stderr.take()
    }

    /// Get the process ID of the running engine.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Wait up to `grace` for the process to exit on its own.
    ///
    /// Returns true if it exited. Processes without a child handle are
    /// treated as already gone.
    pub async fn wait_with_grace(&mut self, grace: Duration) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(tokio::time::timeout(grace, child.wait()).await, Ok(Ok(_))),
            None => true,
        }
    }

    /// Kill the process and reap it.
    pub async fn kill(&mut self) -> Result<()> {
        match self.child.as_mut() {
            Some(child) => child.kill().await.map_err(Error::io),
            None => Ok(()),
        }
    }

    /// Try to kill the process without waiting.
    pub fn start_kill(&mut self) -> Result<()> {
        match self.child.as_mut() {
            Some(child) => child.start_kill().map_err(Error::io),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for EngineProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineProcess")
            .field("pid", &self.pid())
            .field("stdin", &self.stdin.is_some())
            .field("stdout", &self.stdout.is_some())
            .finish()
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        let _ = self.start_kill();
    }
}

/// Build a tokio Command from the config.
fn build_command(config: &EngineConfig) -> Command {
    let mut cmd = Command::new(config.engine_command());
    cmd.args(config.args());

    if let Some(dir) = config.working_directory() {
        cmd.current_dir(dir);
    }

    if !config.inherit_env() {
        cmd.env_clear();
    }
    cmd.envs(config.env_vars());

    cmd.kill_on_drop(true);
    cmd
}
