//! Search stream implementation.
//!
//! This module provides [`SearchStream`], which implements [`futures::Stream`]
//! to yield [`SearchEvent`]s from a running search.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{mpsc, oneshot};

use super::events::SearchEvent;
use crate::handler::SearchHandler;
use crate::protocol::{BestMove, SearchInfo};
use crate::{Error, Result};

/// A stream of progress reports from a search, ending with the best move.
///
/// The stream yields every parsed `info` line as [`SearchEvent::Info`] and
/// finishes with exactly one [`SearchEvent::BestMove`] or one error.
///
/// # Cancellation
///
/// Dropping a `SearchStream` does not stop the search; the engine finishes
/// it and the result is discarded. Use [`UciEngine::cancel`](crate::UciEngine::cancel)
/// to abandon it.
///
/// # Example
///
/// ```ignore
/// use futures::StreamExt;
/// use libuci::{SearchEvent, SearchOptions};
///
/// let mut stream = engine.search_stream(SearchOptions::depth(12)).await?;
/// while let Some(event) = stream.next().await {
///     match event? {
///         SearchEvent::Info(info) => println!("depth {:?} pv {:?}", info.depth, info.pv),
///         SearchEvent::BestMove(best) => println!("bestmove {}", best.mv),
///     }
/// }
/// ```
pub struct SearchStream {
    info: mpsc::UnboundedReceiver<SearchInfo>,
    result: Option<oneshot::Receiver<Result<BestMove>>>,
}

impl SearchStream {
    /// Create the handler feeding a stream, and the stream itself. The
    /// stream needs the receiving end of the request once it is submitted.
    pub(crate) fn channel() -> (SearchHandler, StreamParts) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = SearchHandler::with_observer(move |info: &SearchInfo| {
            let _ = tx.send(info.clone());
        });
        (handler, StreamParts { info: rx })
    }

    /// Wait for the search to finish, discarding progress reports.
    pub async fn best_move(mut self) -> Result<BestMove> {
        use futures::StreamExt;

        while let Some(event) = self.next().await {
            if let SearchEvent::BestMove(best) = event? {
                return Ok(best);
            }
        }
        Err(Error::SupervisorGone)
    }

    /// Collect all events from the stream.
    pub async fn collect_all(mut self) -> Result<CollectedSearch> {
        use futures::StreamExt;

        let mut collected = CollectedSearch::default();
        while let Some(event) = self.next().await {
            match event? {
                SearchEvent::Info(info) => collected.infos.push(info),
                SearchEvent::BestMove(best) => collected.best_move = Some(best),
            }
        }
        Ok(collected)
    }
}

/// The half of a [`SearchStream`] that exists before the request is sent.
pub(crate) struct StreamParts {
    info: mpsc::UnboundedReceiver<SearchInfo>,
}

impl StreamParts {
    pub(crate) fn attach(self, result: oneshot::Receiver<Result<BestMove>>) -> SearchStream {
        SearchStream {
            info: self.info,
            result: Some(result),
        }
    }
}

impl Stream for SearchStream {
    type Item = Result<SearchEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match this.info.poll_recv(cx) {
            Poll::Ready(Some(info)) => return Poll::Ready(Some(Ok(SearchEvent::Info(info)))),
            Poll::Pending => return Poll::Pending,
            // the handler is gone, so the result is on its way
            Poll::Ready(None) => {}
        }

        let Some(result) = this.result.as_mut() else {
            return Poll::Ready(None);
        };
        let outcome = match Pin::new(result).poll(cx) {
            Poll::Ready(outcome) => outcome,
            Poll::Pending => return Poll::Pending,
        };
        this.result = None;
        Poll::Ready(Some(match outcome {
            Ok(Ok(best)) => Ok(SearchEvent::BestMove(best)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::SupervisorGone),
        }))
    }
}

/// A collected search.
#[derive(Debug, Clone, Default)]
pub struct CollectedSearch {
    /// All progress reports in order.
    pub infos: Vec<SearchInfo>,
    /// The final move.
    pub best_move: Option<BestMove>,
}

impl CollectedSearch {
    /// Deepest depth reported.
    pub fn max_depth(&self) -> Option<u32> {
        self.infos.iter().filter_map(|info| info.depth).max()
    }
}
