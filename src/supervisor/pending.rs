//! Type-erased pending requests.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::handler::{Interrupt, ResponseHandler};
use crate::{Error, Result};

/// A queued request as the supervisor sees it.
///
/// Every settling method consumes the box, so a request can be completed,
/// timed out or rejected at most once.
pub(crate) trait Responder: Send {
    fn on_line(&mut self, line: &str);
    fn is_complete(&self, line: &str) -> bool;
    /// The budget the request was given.
    fn timeout(&self) -> Duration;
    fn complete(self: Box<Self>, line: String);
    fn time_out(self: Box<Self>) -> Option<Interrupt>;
    fn reject(self: Box<Self>, error: Error);
}

/// A [`ResponseHandler`] paired with the channel its caller awaits.
pub(crate) struct Pending<H: ResponseHandler> {
    handler: H,
    reply: oneshot::Sender<Result<H::Output>>,
    timeout: Duration,
}

impl<H: ResponseHandler> Pending<H> {
    pub(crate) fn new(
        handler: H,
        reply: oneshot::Sender<Result<H::Output>>,
        timeout: Duration,
    ) -> Self {
        Self {
            handler,
            reply,
            timeout,
        }
    }

    fn settle(reply: oneshot::Sender<Result<H::Output>>, result: Result<H::Output>) {
        if reply.send(result).is_err() {
            tracing::trace!("caller dropped before its request settled");
        }
    }
}

impl<H: ResponseHandler> Responder for Pending<H> {
    fn on_line(&mut self, line: &str) {
        let handler = &mut self.handler;
        if catch_unwind(AssertUnwindSafe(|| handler.on_line(line))).is_err() {
            tracing::warn!(line, "response callback panicked; continuing");
        }
    }

    fn is_complete(&self, line: &str) -> bool {
        let handler = &self.handler;
        catch_unwind(AssertUnwindSafe(|| handler.is_complete(line))).unwrap_or_else(|_| {
            tracing::warn!(line, "completion check panicked; treating line as incomplete");
            false
        })
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn complete(self: Box<Self>, line: String) {
        let Pending { handler, reply, .. } = *self;
        let result = catch_unwind(AssertUnwindSafe(|| handler.complete(line))).unwrap_or_else(|_| {
            Err(Error::EngineRejected {
                message: "response handler panicked".to_string(),
            })
        });
        Self::settle(reply, result);
    }

    fn time_out(self: Box<Self>) -> Option<Interrupt> {
        let Pending {
            handler,
            reply,
            timeout,
        } = *self;
        let interrupt = handler.interrupt();
        let result = catch_unwind(AssertUnwindSafe(|| handler.timed_out(timeout)))
            .unwrap_or(Err(Error::Timeout(timeout)));
        Self::settle(reply, result);
        interrupt
    }

    fn reject(self: Box<Self>, error: Error) {
        let Pending { reply, .. } = *self;
        Self::settle(reply, Err(error));
    }
}
