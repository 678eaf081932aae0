//! Line protocol spoken by UCI engines.
//!
//! Every message is a single UTF-8 line. Commands go to the engine stdin,
//! responses come back on stdout. Most responses are only meaningful
//! relative to the command that caused them, so a response is recognized
//! by its leading marker.
//!
//! | Command        | Completion marker            |
//! |----------------|------------------------------|
//! | `uci`          | `uciok`                      |
//! | `isready`      | `readyok`                    |
//! | `go ...`       | `bestmove <move>`            |
//! | `printboard`   | `printboard_done`            |
//! | `makemove`     | `move_made <move> <fen>`     |
//! | `bench ...`    | `--- Benchmark Complete ---` |
//!
//! `position`, `ucinewgame`, `stop` and `quit` produce no answer.

pub mod bench;
pub mod commands;
pub mod responses;

pub use bench::BenchmarkReport;
pub use commands::Command;
pub use responses::{
    has_marker, BestMove, MoveApplied, Score, SearchInfo, BENCH_COMPLETE, BEST_MOVE, INFO,
    INFO_STRING, MOVE_MADE, NULL_MOVE, PRINTBOARD_DONE, READY_OK, UCI_OK,
};
