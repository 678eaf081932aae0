//! The supervisor task.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use super::queue::{deadline_after, CommandQueue, Entry, Expired, HandshakeStep, Settled};
use super::restart::{RestartDecision, RestartPolicy};
use super::{EngineStatus, FatalError, Request, Responder, SupervisorState};
use crate::config::EngineConfig;
use crate::process::{
    forward_stderr, EngineLauncher, EngineProcess, EngineStdin, EngineStdout, LineReader,
    LineWriter,
};
use crate::protocol::Command;
use crate::{Error, Result};

/// Output from a reader task, tagged with the process it came from.
#[derive(Debug)]
enum ReaderEvent {
    Line { generation: u64, line: String },
    Closed { generation: u64, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartCause {
    /// A caller asked for the engine, explicitly or by sending a request.
    Requested,
    /// The restart backoff elapsed.
    Restart,
}

struct RunningEngine {
    process: EngineProcess,
    writer: LineWriter<EngineStdin>,
    reader: JoinHandle<()>,
}

impl RunningEngine {
    async fn kill(mut self) {
        self.reader.abort();
        if let Err(e) = self.process.kill().await {
            debug!(error = %e, "failed to kill engine process");
        }
    }

    /// Ask the engine to exit, then kill it if it is still around after `grace`.
    async fn quit(mut self, grace: Duration) {
        if let Err(e) = self.writer.write_line(&Command::Quit.to_string()).await {
            debug!(error = %e, "could not send quit");
        }
        if let Err(e) = self.writer.shutdown().await {
            trace!(error = %e, "could not close engine stdin");
        }
        if !self.process.wait_with_grace(grace).await {
            debug!(?grace, "engine ignored quit, killing it");
        }
        self.kill().await;
    }
}

pub(crate) struct Supervisor {
    config: EngineConfig,
    launcher: Box<dyn EngineLauncher>,
    requests: mpsc::Receiver<Request>,
    // unbounded: the supervisor can be blocked writing to the engine while
    // the engine is blocked writing to its reader
    events_tx: mpsc::UnboundedSender<ReaderEvent>,
    events: mpsc::UnboundedReceiver<ReaderEvent>,
    status: watch::Sender<EngineStatus>,
    fatal: mpsc::UnboundedSender<FatalError>,

    state: SupervisorState,
    engine: Option<RunningEngine>,
    generation: u64,
    queue: CommandQueue,
    restarts: RestartPolicy,
    restart_at: Option<Instant>,
    shutdown_requested: bool,
    start_waiters: Vec<oneshot::Sender<Result<()>>>,
}

impl Supervisor {
    pub(crate) fn new(
        config: EngineConfig,
        launcher: Box<dyn EngineLauncher>,
        requests: mpsc::Receiver<Request>,
        status: watch::Sender<EngineStatus>,
        fatal: mpsc::UnboundedSender<FatalError>,
    ) -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        let restarts = RestartPolicy::new(config.max_restarts(), config.restart_backoff());
        Self {
            config,
            launcher,
            requests,
            events_tx,
            events,
            status,
            fatal,
            state: SupervisorState::Stopped,
            engine: None,
            generation: 0,
            queue: CommandQueue::new(),
            restarts,
            restart_at: None,
            shutdown_requested: false,
            start_waiters: Vec::new(),
        }
    }

    pub(crate) async fn run(mut self) {
        debug!(engine = self.config.engine_command(), "supervisor started");
        loop {
            let wake_at = self.next_wakeup();
            tokio::select! {
                Some(event) = self.events.recv() => self.on_reader_event(event).await,
                request = self.requests.recv() => match request {
                    Some(request) => self.on_request(request).await,
                    None => break,
                },
                () = sleep_until_or_forever(wake_at) => self.on_timer().await,
            }
        }
        debug!("all engine handles dropped, shutting down");
        self.stop().await;
    }

    // -------------------------------------------------------------------------
    // Event dispatch
    // -------------------------------------------------------------------------

    async fn on_request(&mut self, request: Request) {
        match request {
            Request::Start { reply } => self.handle_start(reply).await,
            Request::Stop { reply } => {
                self.stop().await;
                let _ = reply.send(Ok(()));
            }
            Request::Submit {
                commands,
                label,
                timeout,
                responder,
            } => self.submit(commands, label, timeout, responder).await,
            Request::Write { command, reply } => {
                let result = self.write_now(command).await;
                let _ = reply.send(result);
            }
            Request::Cancel { reply } => {
                let cancelled = self.cancel().await;
                let _ = reply.send(Ok(cancelled));
            }
        }
    }

    async fn on_reader_event(&mut self, event: ReaderEvent) {
        match event {
            ReaderEvent::Line { generation, line } if generation == self.generation => {
                self.on_line(line).await
            }
            ReaderEvent::Closed { generation, reason } if generation == self.generation => {
                self.on_crash(reason).await
            }
            _ => trace!("discarding output from a retired engine"),
        }
    }

    async fn on_line(&mut self, line: String) {
        debug!(%line, "engine ->");
        match self.queue.route(&line) {
            Some(Settled::Handshake(HandshakeStep::Uci)) => debug!("engine acknowledged uci"),
            Some(Settled::Handshake(HandshakeStep::IsReady)) => self.on_ready(),
            Some(Settled::Caller(label)) => debug!(%label, "request completed"),
            Some(Settled::Drained(label)) => debug!(%label, "discarded late response"),
            None => return,
        }
        self.activate_head().await;
    }

    async fn on_timer(&mut self) {
        let now = Instant::now();

        if self.restart_at.is_some_and(|at| at <= now) {
            self.restart_at = None;
            info!(attempt = self.restarts.attempts(), "restarting engine");
            if let Err(e) = self.start_engine(StartCause::Restart).await {
                debug!(error = %e, "restart attempt failed");
            }
        }

        for expired in self.queue.expire(now, self.config.stop_drain_timeout()) {
            match expired {
                Expired::Handshake(step) => {
                    if self.engine.is_some() {
                        let reason = format!(
                            "no {} within {:?}",
                            step.marker(),
                            self.config.handshake_timeout()
                        );
                        self.on_crash(reason).await;
                    }
                }
                Expired::Caller(label) => warn!(%label, "request timed out"),
                Expired::Drain(label) => debug!(%label, "late response never arrived"),
            }
        }
        self.activate_head().await;
    }

    /// Arm a drain entry that reached the head and tell the engine to
    /// abandon the work it stands for.
    async fn activate_head(&mut self) {
        let Some(command) = self.queue.activate_head(Instant::now()) else {
            return;
        };
        if self.engine.is_some() {
            debug!(%command, "interrupting abandoned request");
            let _ = self.write_or_crash(&command).await;
        }
    }

    fn next_wakeup(&self) -> Option<Instant> {
        match (self.queue.next_deadline(), self.restart_at) {
            (Some(deadline), Some(restart)) => Some(deadline.min(restart)),
            (deadline, restart) => deadline.or(restart),
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    async fn handle_start(&mut self, reply: oneshot::Sender<Result<()>>) {
        match self.state {
            SupervisorState::Ready => {
                let _ = reply.send(Ok(()));
            }
            SupervisorState::Starting => self.start_waiters.push(reply),
            SupervisorState::Crashed if self.restart_at.is_some() => self.start_waiters.push(reply),
            SupervisorState::Stopped | SupervisorState::Crashed => {
                self.restarts.reset();
                match self.start_engine(StartCause::Requested).await {
                    Ok(()) => self.start_waiters.push(reply),
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
        }
    }

    /// Make sure a process exists before queueing a request.
    async fn ensure_started(&mut self) -> Result<()> {
        match self.state {
            SupervisorState::Ready | SupervisorState::Starting => Ok(()),
            SupervisorState::Crashed if self.restarts.gave_up() => Err(Error::MaxRestartsExceeded {
                attempts: self.restarts.attempts(),
            }),
            SupervisorState::Crashed => Err(Error::crashed("engine is restarting")),
            SupervisorState::Stopped => self.start_engine(StartCause::Requested).await,
        }
    }

    async fn start_engine(&mut self, cause: StartCause) -> Result<()> {
        let result = self.launch().await;
        if let Err(e) = &result {
            if self.engine.is_none() && cause == StartCause::Requested {
                warn!(error = %e, "engine failed to start");
                self.set_state(SupervisorState::Stopped);
            } else {
                self.on_crash(format!("engine failed to start: {e}")).await;
            }
        }
        result
    }

    /// Spawn a process, attach its pipes and send the handshake.
    ///
    /// `uci` and `isready` are written back to back rather than waiting for
    /// `uciok` first: requests queued during startup are written as they
    /// arrive, so `isready` has to be on the wire ahead of them. The engine
    /// answers in order, and the `isready` deadline covers both steps.
    async fn launch(&mut self) -> Result<()> {
        self.shutdown_requested = false;

        let mut process = self.launcher.launch(&self.config)?;
        let (Some(stdin), Some(stdout)) = (process.take_stdin(), process.take_stdout()) else {
            return Err(Error::Spawn(std::io::Error::other(
                "engine process has no stdin or stdout",
            )));
        };

        self.generation += 1;
        let generation = self.generation;
        let pid = process.pid();
        if let Some(stderr) = process.take_stderr() {
            tokio::spawn(forward_stderr(stderr, pid));
        }
        let reader = tokio::spawn(read_lines(stdout, generation, self.events_tx.clone()));
        info!(?pid, generation, engine = self.config.engine_command(), "engine process spawned");

        self.engine = Some(RunningEngine {
            process,
            writer: LineWriter::new(stdin),
            reader,
        });
        self.set_state(SupervisorState::Starting);

        let timeout = self.config.handshake_timeout();
        let now = Instant::now();
        for (step, deadline) in [
            (HandshakeStep::Uci, deadline_after(now, timeout)),
            (HandshakeStep::IsReady, deadline_after(now, timeout.saturating_mul(2))),
        ] {
            self.queue.push_back(Entry::handshake(step, deadline));
            self.write(&step.command()).await?;
        }
        Ok(())
    }

    fn on_ready(&mut self) {
        self.restarts.on_ready();
        self.set_state(SupervisorState::Ready);
        info!(generation = self.generation, "engine ready");
        for waiter in self.start_waiters.drain(..) {
            let _ = waiter.send(Ok(()));
        }
    }

    async fn on_crash(&mut self, reason: String) {
        if self.shutdown_requested {
            debug!(%reason, "engine exited during shutdown");
            return;
        }
        warn!(%reason, "engine crashed");

        if let Some(engine) = self.engine.take() {
            engine.kill().await;
        }
        self.generation += 1;

        let failed = self.queue.reject_all(|| Error::crashed(reason.clone()));
        for waiter in self.start_waiters.drain(..) {
            let _ = waiter.send(Err(Error::crashed(reason.clone())));
        }
        if failed > 0 {
            debug!(failed, "failed queued requests");
        }

        let already_gave_up = self.restarts.gave_up();
        match self.restarts.on_crash() {
            RestartDecision::Retry { attempt, after } => {
                info!(
                    attempt,
                    max = self.restarts.max_restarts(),
                    ?after,
                    "scheduling engine restart"
                );
                self.restart_at = Some(deadline_after(Instant::now(), after));
            }
            RestartDecision::GiveUp { attempts } => {
                self.restart_at = None;
                if !already_gave_up {
                    error!(attempts, %reason, "engine keeps crashing, giving up");
                    let _ = self.fatal.send(FatalError { attempts, reason });
                }
            }
        }
        self.set_state(SupervisorState::Crashed);
    }

    async fn stop(&mut self) {
        self.shutdown_requested = true;
        self.restart_at = None;
        if let Some(engine) = self.engine.take() {
            info!("stopping engine");
            engine.quit(self.config.quit_grace()).await;
        }
        self.generation += 1;

        let stopped = self.queue.reject_all(|| Error::Stopped);
        for waiter in self.start_waiters.drain(..) {
            let _ = waiter.send(Err(Error::Stopped));
        }
        if stopped > 0 {
            debug!(stopped, "failed queued requests");
        }
        self.restarts.reset();
        self.set_state(SupervisorState::Stopped);
    }

    /// Fail everything in flight and replace the process.
    async fn cancel(&mut self) -> usize {
        let cancelled = self.queue.reject_all(|| Error::Cancelled);
        for waiter in self.start_waiters.drain(..) {
            let _ = waiter.send(Err(Error::Cancelled));
        }
        info!(cancelled, "cancelled pending requests");

        let Some(engine) = self.engine.take() else {
            return cancelled;
        };
        self.shutdown_requested = true;
        engine.kill().await;
        self.generation += 1;
        self.set_state(SupervisorState::Stopped);

        if let Err(e) = self.start_engine(StartCause::Requested).await {
            warn!(error = %e, "engine did not come back after cancel");
        }
        cancelled
    }

    // -------------------------------------------------------------------------
    // Requests
    // -------------------------------------------------------------------------

    async fn submit(
        &mut self,
        commands: Vec<Command>,
        label: String,
        timeout: Duration,
        responder: Box<dyn Responder>,
    ) {
        if let Err(e) = self.ensure_started().await {
            debug!(%label, error = %e, "rejecting request");
            responder.reject(e);
            return;
        }
        debug!(%label, ?timeout, ahead = self.queue.len(), "queueing request");
        self.queue
            .push_back(Entry::caller(label, deadline_after(Instant::now(), timeout), responder));
        for command in &commands {
            // a failed write crashes the engine, which fails the entry above
            if self.write_or_crash(command).await.is_err() {
                break;
            }
        }
    }

    async fn write_now(&mut self, command: Command) -> Result<()> {
        self.ensure_started().await?;
        self.write_or_crash(&command).await
    }

    async fn write(&mut self, command: &Command) -> Result<()> {
        let engine = self.engine.as_mut().ok_or(Error::NotRunning)?;
        let line = command.to_string();
        debug!(command = %line, "-> engine");
        engine.writer.write_line(&line).await
    }

    async fn write_or_crash(&mut self, command: &Command) -> Result<()> {
        let result = self.write(command).await;
        if let Err(Error::Write(e)) = &result {
            self.on_crash(format!("write to engine failed: {e}")).await;
        }
        result
    }

    // -------------------------------------------------------------------------
    // Status
    // -------------------------------------------------------------------------

    fn set_state(&mut self, state: SupervisorState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "engine state changed");
        }
        self.state = state;
        self.status.send_replace(EngineStatus {
            state,
            restart_count: self.restarts.attempts(),
            gave_up: self.restarts.gave_up(),
            pid: self.engine.as_ref().and_then(|engine| engine.process.pid()),
        });
    }
}

async fn read_lines(
    stdout: EngineStdout,
    generation: u64,
    events: mpsc::UnboundedSender<ReaderEvent>,
) {
    let mut reader = LineReader::new(stdout);
    let reason = loop {
        match reader.read_line().await {
            Ok(Some(line)) => {
                if events.send(ReaderEvent::Line { generation, line }).is_err() {
                    return;
                }
            }
            Ok(None) => break "engine closed its output".to_string(),
            Err(e) => break format!("failed to read engine output: {e}"),
        }
    };
    let _ = events.send(ReaderEvent::Closed { generation, reason });
}

async fn sleep_until_or_forever(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reader_tags_lines_and_reports_close() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stdout: EngineStdout = Box::new(&b"uciok\nreadyok\n"[..]);
        read_lines(stdout, 7, tx).await;

        assert!(matches!(
            rx.recv().await,
            Some(ReaderEvent::Line { generation: 7, ref line }) if line == "uciok"
        ));
        assert!(matches!(
            rx.recv().await,
            Some(ReaderEvent::Line { generation: 7, ref line }) if line == "readyok"
        ));
        assert!(matches!(
            rx.recv().await,
            Some(ReaderEvent::Closed { generation: 7, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_without_deadline_never_fires() {
        let sleep = sleep_until_or_forever(None);
        let result = tokio::time::timeout(Duration::from_secs(3600), sleep).await;
        assert!(result.is_err());

        let deadline = Instant::now() + Duration::from_secs(1);
        tokio::time::timeout(Duration::from_secs(2), sleep_until_or_forever(Some(deadline)))
            .await
            .unwrap();
    }
}
