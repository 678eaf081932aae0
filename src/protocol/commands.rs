//! Commands written to the engine stdin.

use std::fmt;

use crate::config::{BenchMode, BenchOptions, Position, SearchOptions};

/// A single protocol line sent to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `uci`: switch to UCI mode, answered by `uciok`.
    Uci,
    /// `isready`: synchronisation ping, answered by `readyok`.
    IsReady,
    /// `ucinewgame`: reset engine state for a new game.
    NewGame,
    /// `position startpos|fen <fen> [moves ...]`.
    Position { base: Position, moves: Vec<String> },
    /// `go` with search limits, answered by `bestmove`.
    Go(SearchOptions),
    /// `stop`: end the current search early.
    Stop,
    /// `quit`: exit the engine.
    Quit,
    /// `printboard [fen]`: dump the board, terminated by `printboard_done`.
    PrintBoard { fen: Option<String> },
    /// `makemove <fen> <move>`: apply a move, answered by `move_made`.
    MakeMove { fen: String, mv: String },
    /// `bench ...`: run the benchmark suite.
    Bench(BenchOptions),
    /// Any other line, sent verbatim.
    Raw(String),
}

impl Command {
    /// The verb of this command, for logging.
    pub fn verb(&self) -> &str {
        match self {
            Command::Uci => "uci",
            Command::IsReady => "isready",
            Command::NewGame => "ucinewgame",
            Command::Position { .. } => "position",
            Command::Go(_) => "go",
            Command::Stop => "stop",
            Command::Quit => "quit",
            Command::PrintBoard { .. } => "printboard",
            Command::MakeMove { .. } => "makemove",
            Command::Bench(_) => "bench",
            Command::Raw(text) => text.split_whitespace().next().unwrap_or(""),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Uci => write!(f, "uci"),
            Command::IsReady => write!(f, "isready"),
            Command::NewGame => write!(f, "ucinewgame"),
            Command::Position { base, moves } => {
                write!(f, "position {base}")?;
                if !moves.is_empty() {
                    write!(f, " moves {}", moves.join(" "))?;
                }
                Ok(())
            }
            Command::Go(options) => {
                write!(f, "go")?;
                if let Some(depth) = options.depth {
                    write!(f, " depth {depth}")?;
                }
                if let Some(clock) = options.clock {
                    write!(
                        f,
                        " wtime {} btime {} winc {} binc {}",
                        clock.white.as_millis(),
                        clock.black.as_millis(),
                        clock.white_increment.as_millis(),
                        clock.black_increment.as_millis()
                    )?;
                    if let Some(moves_to_go) = clock.moves_to_go {
                        write!(f, " movestogo {moves_to_go}")?;
                    }
                }
                if let Some(move_time) = options.move_time {
                    write!(f, " movetime {}", move_time.as_millis())?;
                }
                Ok(())
            }
            Command::Stop => write!(f, "stop"),
            Command::Quit => write!(f, "quit"),
            Command::PrintBoard { fen } => match fen {
                Some(fen) => write!(f, "printboard {}", fen.trim()),
                None => write!(f, "printboard"),
            },
            Command::MakeMove { fen, mv } => write!(f, "makemove {} {}", fen.trim(), mv.trim()),
            Command::Bench(options) => {
                write!(f, "bench")?;
                match options.mode {
                    BenchMode::Depth(depth) => write!(f, " depth {depth}")?,
                    BenchMode::MoveTime(time) => write!(f, " movetime {}", time.as_millis())?,
                }
                write!(f, " eval {}", options.eval_duration.as_millis())?;
                if !options.run_eval {
                    write!(f, " noeval")?;
                }
                if !options.run_search {
                    write!(f, " nosearch")?;
                }
                Ok(())
            }
            Command::Raw(text) => write!(f, "{}", text.trim_end()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::Clock;

    #[test]
    fn simple_verbs() {
        assert_eq!(Command::Uci.to_string(), "uci");
        assert_eq!(Command::IsReady.to_string(), "isready");
        assert_eq!(Command::NewGame.to_string(), "ucinewgame");
        assert_eq!(Command::Stop.to_string(), "stop");
        assert_eq!(Command::Quit.to_string(), "quit");
    }

    #[test]
    fn position_startpos_without_moves() {
        let cmd = Command::Position {
            base: Position::StartPos,
            moves: vec![],
        };
        assert_eq!(cmd.to_string(), "position startpos");
    }

    #[test]
    fn position_fen_with_moves() {
        let cmd = Command::Position {
            base: Position::fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"),
            moves: vec!["e2e4".into(), "e7e5".into()],
        };
        assert_eq!(
            cmd.to_string(),
            "position fen rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1 moves e2e4 e7e5"
        );
    }

    #[test]
    fn go_depth() {
        assert_eq!(
            Command::Go(SearchOptions::depth(10)).to_string(),
            "go depth 10"
        );
    }

    #[test]
    fn go_clock() {
        let clock = Clock {
            white: Duration::from_secs(60),
            black: Duration::from_secs(55),
            white_increment: Duration::from_secs(1),
            black_increment: Duration::from_secs(1),
            moves_to_go: Some(20),
        };
        assert_eq!(
            Command::Go(SearchOptions::clock(clock)).to_string(),
            "go wtime 60000 btime 55000 winc 1000 binc 1000 movestogo 20"
        );
    }

    #[test]
    fn go_move_time() {
        assert_eq!(
            Command::Go(SearchOptions::move_time(Duration::from_millis(100))).to_string(),
            "go movetime 100"
        );
    }

    #[test]
    fn go_without_limits() {
        assert_eq!(Command::Go(SearchOptions::default()).to_string(), "go");
    }

    #[test]
    fn bench_variants() {
        assert_eq!(
            Command::Bench(BenchOptions::depth(9)).to_string(),
            "bench depth 9 eval 2000"
        );
        assert_eq!(
            Command::Bench(
                BenchOptions::move_time(Duration::from_millis(1500))
                    .eval_duration(Duration::from_millis(500))
            )
            .to_string(),
            "bench movetime 1500 eval 500"
        );
        assert_eq!(
            Command::Bench(BenchOptions::depth(4).no_eval()).to_string(),
            "bench depth 4 eval 2000 noeval"
        );
    }

    #[test]
    fn diagnostics() {
        assert_eq!(
            Command::PrintBoard { fen: None }.to_string(),
            "printboard"
        );
        assert_eq!(
            Command::MakeMove {
                fen: "8/8/8/8/8/8/8/K6k w - - 0 1".into(),
                mv: "a1a2".into()
            }
            .to_string(),
            "makemove 8/8/8/8/8/8/8/K6k w - - 0 1 a1a2"
        );
    }

    #[test]
    fn verbs() {
        assert_eq!(Command::Go(SearchOptions::default()).verb(), "go");
        assert_eq!(Command::Raw("setoption name Hash value 64".into()).verb(), "setoption");
        assert_eq!(Command::Raw(String::new()).verb(), "");
    }
}
