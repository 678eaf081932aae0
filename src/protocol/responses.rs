//! Response markers and parsers for engine output lines.

use serde::{Deserialize, Serialize};

/// Answer to `uci`.
pub const UCI_OK: &str = "uciok";
/// Answer to `isready`.
pub const READY_OK: &str = "readyok";
/// Prefix of the line ending a search.
pub const BEST_MOVE: &str = "bestmove";
/// Prefix of progress lines emitted during a search.
pub const INFO: &str = "info";
/// Prefix of free-form engine diagnostics.
pub const INFO_STRING: &str = "info string";
/// Line ending a `printboard` dump.
pub const PRINTBOARD_DONE: &str = "printboard_done";
/// Prefix of the line answering a successful `makemove`.
pub const MOVE_MADE: &str = "move_made";
/// Line ending a benchmark run.
pub const BENCH_COMPLETE: &str = "--- Benchmark Complete ---";

/// Move reported when no real move is available.
pub const NULL_MOVE: &str = "0000";

/// Check whether `line` starts with the whole word `marker`.
pub fn has_marker(line: &str, marker: &str) -> bool {
    match line.strip_prefix(marker) {
        Some(rest) => rest.is_empty() || rest.starts_with(char::is_whitespace),
        None => false,
    }
}

/// The move chosen by a search.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BestMove {
    /// Move in long algebraic notation, or [`NULL_MOVE`].
    pub mv: String,
    /// Expected reply, if the engine reported one.
    pub ponder: Option<String>,
    /// True when the search never produced `bestmove` and this move is
    /// the best principal variation seen before the timeout.
    pub timed_out: bool,
}

impl BestMove {
    /// Parse a `bestmove <move> [ponder <move>]` line.
    pub fn parse(line: &str) -> Option<Self> {
        if !has_marker(line, BEST_MOVE) {
            return None;
        }
        let mut tokens = line.split_whitespace().skip(1);
        let mv = match tokens.next() {
            Some("(none)") | None => NULL_MOVE.to_string(),
            Some(mv) => mv.to_string(),
        };
        let ponder = match (tokens.next(), tokens.next()) {
            (Some("ponder"), Some(mv)) => Some(mv.to_string()),
            _ => None,
        };
        Some(Self {
            mv,
            ponder,
            timed_out: false,
        })
    }

    /// The fallback used when a search timed out.
    pub fn fallback(mv: Option<String>) -> Self {
        Self {
            mv: mv.unwrap_or_else(|| NULL_MOVE.to_string()),
            ponder: None,
            timed_out: true,
        }
    }

    /// Whether this is the null-move sentinel.
    pub fn is_null(&self) -> bool {
        self.mv == NULL_MOVE
    }

    /// The move as a string slice.
    pub fn as_str(&self) -> &str {
        &self.mv
    }
}

/// Evaluation reported in an `info` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Score {
    /// Centipawns from the side to move.
    Cp(i32),
    /// Mate in N moves (negative when being mated).
    Mate(i32),
}

/// Progress reported by an `info` line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchInfo {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    pub score: Option<Score>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    pub time_ms: Option<u64>,
    /// Principal variation, best move first.
    pub pv: Vec<String>,
}

impl SearchInfo {
    /// Parse an `info` line. `info string` lines are not progress reports.
    pub fn parse(line: &str) -> Option<Self> {
        if !has_marker(line, INFO) || has_marker(line, INFO_STRING) {
            return None;
        }

        let mut info = SearchInfo::default();
        let mut tokens = line.split_whitespace().skip(1);
        while let Some(token) = tokens.next() {
            match token {
                "depth" => info.depth = tokens.next().and_then(|v| v.parse().ok()),
                "seldepth" => info.seldepth = tokens.next().and_then(|v| v.parse().ok()),
                "nodes" => info.nodes = tokens.next().and_then(|v| v.parse().ok()),
                "nps" => info.nps = tokens.next().and_then(|v| v.parse().ok()),
                "time" => info.time_ms = tokens.next().and_then(|v| v.parse().ok()),
                "score" => {
                    info.score = match (tokens.next(), tokens.next().and_then(|v| v.parse().ok())) {
                        (Some("cp"), Some(v)) => Some(Score::Cp(v)),
                        (Some("mate"), Some(v)) => Some(Score::Mate(v)),
                        _ => None,
                    };
                }
                // pv runs to the end of the line
                "pv" => {
                    info.pv = tokens.by_ref().map(str::to_string).collect();
                }
                _ => {}
            }
        }
        Some(info)
    }

    /// First move of the principal variation.
    pub fn best_move(&self) -> Option<&str> {
        self.pv.first().map(String::as_str)
    }
}

/// Result of a successful `makemove`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveApplied {
    /// The move that was applied.
    pub mv: String,
    /// Position after the move.
    pub fen: String,
}

impl MoveApplied {
    /// Parse a `move_made <move> <fen>` line.
    pub fn parse(line: &str) -> Option<Self> {
        if !has_marker(line, MOVE_MADE) {
            return None;
        }
        let rest = line[MOVE_MADE.len()..].trim_start();
        let (mv, fen) = rest.split_once(char::is_whitespace)?;
        Some(Self {
            mv: mv.to_string(),
            fen: fen.trim().to_string(),
        })
    }
}
