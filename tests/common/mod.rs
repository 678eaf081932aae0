//! Test utilities for libuci integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::Notify;

use libuci::{EngineConfig, EngineLauncher, EngineProcess, Error, Result};

/// How the stub answers one command.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Print these lines.
    Lines(Vec<String>),
    /// Work for a while, then print these lines. Later commands wait.
    After(Duration, Vec<String>),
    /// Stop reading input while keeping output open.
    CloseInput,
    /// Close stdout, as if the engine died.
    Crash,
    /// Exit cleanly.
    Exit,
}

impl Reply {
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Reply::Lines(lines.into_iter().map(Into::into).collect())
    }

    pub fn after<I, S>(delay: Duration, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Reply::After(delay, lines.into_iter().map(Into::into).collect())
    }

    pub fn silent() -> Self {
        Reply::Lines(Vec::new())
    }
}

#[derive(Default)]
struct State {
    /// Replies by verb. The last reply for a verb repeats.
    script: HashMap<String, VecDeque<Reply>>,
    received: Vec<String>,
    launches: usize,
    fail_spawns: bool,
    die_on_start: bool,
    current: Option<Arc<Notify>>,
}

impl State {
    fn reply_for(&mut self, line: &str) -> Reply {
        let verb = line.split_whitespace().next().unwrap_or("");
        if let Some(replies) = self.script.get_mut(verb) {
            let reply = if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().cloned()
            };
            if let Some(reply) = reply {
                return reply;
            }
        }
        match verb {
            "uci" => Reply::lines(["id name StubEngine", "id author libuci", "uciok"]),
            "isready" => Reply::lines(["readyok"]),
            "ucinewgame" => Reply::lines(["newgame"]),
            "quit" => Reply::Exit,
            _ => Reply::silent(),
        }
    }
}

/// A scripted in-memory engine.
///
/// Every launch wires a new stub task to the supervisor through duplex
/// pipes. The stub answers `uci`, `isready` and `ucinewgame` like a real
/// engine unless told otherwise, and stays silent for anything unscripted.
#[derive(Clone, Default)]
pub struct StubLauncher {
    state: Arc<Mutex<State>>,
}

impl StubLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `reply` for commands starting with `verb`.
    pub fn on(self, verb: &str, reply: Reply) -> Self {
        self.state
            .lock()
            .unwrap()
            .script
            .entry(verb.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Queue printed lines for commands starting with `verb`.
    pub fn on_lines<I, S>(self, verb: &str, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on(verb, Reply::lines(lines))
    }

    /// Make every launch fail before a process exists.
    pub fn fail_spawns(&self, fail: bool) {
        self.state.lock().unwrap().fail_spawns = fail;
    }

    /// Make every launched engine close its output immediately.
    pub fn die_on_start(&self, die: bool) {
        self.state.lock().unwrap().die_on_start = die;
    }

    /// Close the output of the most recently launched engine.
    pub fn kill_current(&self) {
        if let Some(kill) = self.state.lock().unwrap().current.as_ref() {
            kill.notify_one();
        }
    }

    pub fn launches(&self) -> usize {
        self.state.lock().unwrap().launches
    }

    /// Every line any stub has received, in order.
    pub fn received(&self) -> Vec<String> {
        self.state.lock().unwrap().received.clone()
    }

    pub fn received_count(&self, verb: &str) -> usize {
        self.received()
            .iter()
            .filter(|line| line.split_whitespace().next() == Some(verb))
            .count()
    }

    /// Wait until the stubs have received `count` commands starting with `verb`.
    pub async fn wait_for_received(&self, verb: &str, count: usize) {
        wait_until(|| self.received_count(verb) >= count).await;
    }
}

impl EngineLauncher for StubLauncher {
    fn launch(&mut self, _config: &EngineConfig) -> Result<EngineProcess> {
        let mut state = self.state.lock().unwrap();
        state.launches += 1;
        if state.fail_spawns {
            return Err(Error::Spawn(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "stub refused to start",
            )));
        }

        let (supervisor_in, engine_in) = tokio::io::duplex(64 * 1024);
        let (engine_out, supervisor_out) = tokio::io::duplex(64 * 1024);
        let kill = Arc::new(Notify::new());
        state.current = Some(Arc::clone(&kill));

        if !state.die_on_start {
            tokio::spawn(run_stub(engine_in, engine_out, self.clone(), kill));
        }
        // a dying stub drops both of its pipe ends here

        Ok(EngineProcess::from_pipes(supervisor_in, supervisor_out))
    }
}

async fn run_stub(
    stdin: DuplexStream,
    mut stdout: DuplexStream,
    launcher: StubLauncher,
    kill: Arc<Notify>,
) {
    let mut lines = BufReader::new(stdin).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                _ => return,
            },
            _ = kill.notified() => return,
        };

        let reply = {
            let mut state = launcher.state.lock().unwrap();
            state.received.push(line.clone());
            state.reply_for(&line)
        };

        let out = match reply {
            Reply::Lines(out) => out,
            Reply::After(delay, out) => {
                tokio::time::sleep(delay).await;
                out
            }
            Reply::CloseInput => break,
            Reply::Crash | Reply::Exit => return,
        };
        for line in out {
            if stdout.write_all(format!("{line}\n").as_bytes()).await.is_err() {
                return;
            }
        }
        let _ = stdout.flush().await;
    }

    drop(lines);
    kill.notified().await;
}

/// Poll `condition` until it holds. Sleeps are virtual under paused time.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}

/// Output of a depth-limited benchmark run.
pub fn bench_output() -> Vec<&'static str> {
    vec![
        "=== Evaluation Benchmark ===",
        "Total Evals: 1000000",
        "Time: 2.00s",
        "EPS: 500000",
        "=== Search Benchmark ===",
        "Total Nodes: 1500000",
        "Total Time: 2.00s",
        "Global NPS: 750000",
        "Move Ordering: 91.5%",
        "Q-Search Load: 40.2%",
        "TT Hit Rate: 30.1%",
        "--- Benchmark Complete ---",
    ]
}

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
pub const AFTER_E4_FEN: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
