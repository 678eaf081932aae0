//! Search stream event types.

use serde::{Deserialize, Serialize};

use crate::protocol::{BestMove, SearchInfo};

/// Events yielded by a [`SearchStream`](super::SearchStream).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchEvent {
    /// Progress report from an `info` line.
    Info(SearchInfo),
    /// The search finished. Always the last event.
    BestMove(BestMove),
}

impl SearchEvent {
    /// Check if this is the final event.
    pub fn is_final(&self) -> bool {
        matches!(self, SearchEvent::BestMove(_))
    }

    /// Get the progress report if this is an info event.
    pub fn as_info(&self) -> Option<&SearchInfo> {
        match self {
            SearchEvent::Info(info) => Some(info),
            SearchEvent::BestMove(_) => None,
        }
    }
}
