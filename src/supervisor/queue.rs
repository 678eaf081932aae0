//! FIFO of requests awaiting engine output.
//!
//! The engine answers commands in the order it received them, so only the
//! head of the queue is ever matched against a line. Deadlines are stored
//! on the entries themselves; the supervisor sleeps until the earliest one
//! and then calls [`CommandQueue::expire`].

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use super::pending::Responder;
use crate::handler::Interrupt;
use crate::protocol::{has_marker, Command, READY_OK, UCI_OK};
use crate::Error;

/// The two steps of the startup handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandshakeStep {
    Uci,
    IsReady,
}

impl HandshakeStep {
    pub(crate) fn command(self) -> Command {
        match self {
            HandshakeStep::Uci => Command::Uci,
            HandshakeStep::IsReady => Command::IsReady,
        }
    }

    pub(crate) fn marker(self) -> &'static str {
        match self {
            HandshakeStep::Uci => UCI_OK,
            HandshakeStep::IsReady => READY_OK,
        }
    }
}

pub(crate) enum Waiter {
    /// Owned by the supervisor itself during startup.
    Handshake(HandshakeStep),
    /// A caller awaiting a result.
    Caller(Box<dyn Responder>),
    /// Swallows the late answer to a request that already timed out.
    ///
    /// `interrupt` is written once the entry reaches the head, and the entry
    /// then lingers for `linger` before giving up on the answer.
    Drain {
        marker: &'static str,
        interrupt: Option<Command>,
        linger: Duration,
    },
}

pub(crate) struct Entry {
    label: String,
    /// Unset for a drain entry that has not reached the head yet.
    deadline: Option<Instant>,
    waiter: Waiter,
}

impl Entry {
    pub(crate) fn handshake(step: HandshakeStep, deadline: Instant) -> Self {
        Self {
            label: step.command().verb().to_string(),
            deadline: Some(deadline),
            waiter: Waiter::Handshake(step),
        }
    }

    pub(crate) fn caller(label: String, deadline: Instant, responder: Box<dyn Responder>) -> Self {
        Self {
            label,
            deadline: Some(deadline),
            waiter: Waiter::Caller(responder),
        }
    }

    fn accepts(&mut self, line: &str) -> bool {
        match &mut self.waiter {
            Waiter::Handshake(step) => has_marker(line, step.marker()),
            Waiter::Caller(responder) => {
                responder.on_line(line);
                responder.is_complete(line)
            }
            Waiter::Drain { marker, .. } => has_marker(line, *marker),
        }
    }
}

/// `now + after`, or a deadline that never arrives in practice if that
/// overflows.
pub(crate) fn deadline_after(now: Instant, after: Duration) -> Instant {
    now.checked_add(after).unwrap_or_else(|| now + FAR_FUTURE)
}

const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// What a routed line settled.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Settled {
    Handshake(HandshakeStep),
    Caller(String),
    Drained(String),
}

/// What a deadline settled.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Expired {
    Handshake(HandshakeStep),
    Caller(String),
    Drain(String),
}

#[derive(Default)]
pub(crate) struct CommandQueue {
    entries: VecDeque<Entry>,
}

impl CommandQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_back(&mut self, entry: Entry) {
        self.entries.push_back(entry);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offer a line to the head entry. Lines arriving while the queue is
    /// empty, or that the head does not accept, are dropped.
    pub(crate) fn route(&mut self, line: &str) -> Option<Settled> {
        let head = self.entries.front_mut()?;
        if !head.accepts(line) {
            return None;
        }
        let entry = self.entries.pop_front()?;
        Some(match entry.waiter {
            Waiter::Handshake(step) => Settled::Handshake(step),
            Waiter::Caller(responder) => {
                responder.complete(line.to_string());
                Settled::Caller(entry.label)
            }
            Waiter::Drain { .. } => Settled::Drained(entry.label),
        })
    }

    /// Settle every entry whose deadline is at or before `now`.
    ///
    /// A caller whose handler asks for an interrupt is replaced in place by
    /// a drain entry, so the engine's eventual answer is not mistaken for the
    /// answer to a later request. The drain stays unarmed until
    /// [`activate_head`](Self::activate_head) finds it at the head.
    pub(crate) fn expire(&mut self, now: Instant, drain_for: Duration) -> Vec<Expired> {
        let mut expired = Vec::new();
        let mut index = 0;
        while index < self.entries.len() {
            if !self.entries[index].deadline.is_some_and(|at| at <= now) {
                index += 1;
                continue;
            }
            let Some(Entry { label, waiter, .. }) = self.entries.remove(index) else {
                break;
            };
            match waiter {
                Waiter::Caller(responder) => {
                    let budget = responder.timeout();
                    if let Some(Interrupt {
                        command,
                        drain_marker,
                    }) = responder.time_out()
                    {
                        // without a command the engine finishes on its own time
                        let linger = if command.is_some() { drain_for } else { budget };
                        self.entries.insert(
                            index,
                            Entry {
                                label: label.clone(),
                                deadline: None,
                                waiter: Waiter::Drain {
                                    marker: drain_marker,
                                    interrupt: command,
                                    linger,
                                },
                            },
                        );
                        index += 1;
                    }
                    expired.push(Expired::Caller(label));
                }
                Waiter::Handshake(step) => expired.push(Expired::Handshake(step)),
                Waiter::Drain { .. } => expired.push(Expired::Drain(label)),
            }
        }
        expired
    }

    /// Arm a drain entry that has reached the head. Returns the command to
    /// write so the engine abandons the work the entry stands for.
    ///
    /// Call after anything that may change the head.
    pub(crate) fn activate_head(&mut self, now: Instant) -> Option<Command> {
        let head = self.entries.front_mut()?;
        if head.deadline.is_some() {
            return None;
        }
        let Waiter::Drain {
            interrupt, linger, ..
        } = &mut head.waiter
        else {
            return None;
        };
        head.deadline = Some(deadline_after(now, *linger));
        interrupt.take()
    }

    /// Earliest deadline in the queue.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().filter_map(|entry| entry.deadline).min()
    }

    /// Empty the queue, failing every caller with a fresh error. Returns
    /// the number of callers that were rejected.
    pub(crate) fn reject_all(&mut self, make_error: impl Fn() -> Error) -> usize {
        let mut rejected = 0;
        for entry in self.entries.drain(..) {
            if let Waiter::Caller(responder) = entry.waiter {
                responder.reject(make_error());
                rejected += 1;
            }
        }
        rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BenchHandler, LineMatch, ResponseHandler, SearchHandler};
    use crate::protocol::BestMove;
    use crate::supervisor::pending::Pending;
    use crate::Result;
    use tokio::sync::oneshot;

    const SECOND: Duration = Duration::from_secs(1);

    fn caller<H: ResponseHandler>(
        handler: H,
        label: &str,
        deadline: Instant,
    ) -> (Entry, oneshot::Receiver<Result<H::Output>>) {
        let (tx, rx) = oneshot::channel();
        let pending = Pending::new(handler, tx, SECOND);
        (
            Entry::caller(label.to_string(), deadline, Box::new(pending)),
            rx,
        )
    }

    fn search(deadline: Instant) -> (Entry, oneshot::Receiver<Result<BestMove>>) {
        caller(SearchHandler::new(), "go", deadline)
    }

    #[tokio::test(start_paused = true)]
    async fn only_head_is_matched() {
        let now = Instant::now();
        let mut queue = CommandQueue::new();
        let (first, mut first_rx) = caller(LineMatch::ready(), "isready", now + SECOND);
        let (second, mut second_rx) = search(now + SECOND);
        queue.push_back(first);
        queue.push_back(second);

        // bestmove belongs to the second entry but the head gets to see it first
        assert_eq!(queue.route("bestmove e2e4"), None);
        assert!(second_rx.try_recv().is_err());

        assert_eq!(
            queue.route("readyok"),
            Some(Settled::Caller("isready".into()))
        );
        assert_eq!(first_rx.try_recv().unwrap().unwrap(), "readyok");

        assert_eq!(
            queue.route("bestmove d2d4"),
            Some(Settled::Caller("go".into()))
        );
        assert_eq!(second_rx.try_recv().unwrap().unwrap().mv, "d2d4");
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn lines_on_empty_queue_are_dropped() {
        let mut queue = CommandQueue::new();
        assert_eq!(queue.route("readyok"), None);
        assert_eq!(queue.next_deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn handshake_steps_settle_in_order() {
        let now = Instant::now();
        let mut queue = CommandQueue::new();
        queue.push_back(Entry::handshake(HandshakeStep::Uci, now + SECOND));
        queue.push_back(Entry::handshake(HandshakeStep::IsReady, now + SECOND * 2));

        assert_eq!(queue.route("readyok"), None);
        assert_eq!(queue.route("id name Engine"), None);
        assert_eq!(
            queue.route("uciok"),
            Some(Settled::Handshake(HandshakeStep::Uci))
        );
        assert_eq!(
            queue.route("readyok"),
            Some(Settled::Handshake(HandshakeStep::IsReady))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn expired_head_search_becomes_drain_and_interrupts() {
        let now = Instant::now();
        let mut queue = CommandQueue::new();
        let (entry, mut rx) = search(now + SECOND);
        let (next, mut next_rx) = search(now + SECOND * 10);
        queue.push_back(entry);
        queue.push_back(next);

        queue.route("info depth 5 pv e2e4 e7e5");
        let expired = queue.expire(now + SECOND, SECOND * 2);
        assert_eq!(expired, vec![Expired::Caller("go".into())]);

        let best = rx.try_recv().unwrap().unwrap();
        assert_eq!(best.mv, "e2e4");
        assert!(best.timed_out);
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.activate_head(now + SECOND), Some(Command::Stop));
        assert_eq!(queue.next_deadline(), Some(now + SECOND * 3));
        // armed once only
        assert_eq!(queue.activate_head(now + SECOND), None);

        // the late answer is swallowed, the next search gets its own
        assert_eq!(
            queue.route("bestmove e2e4"),
            Some(Settled::Drained("go".into()))
        );
        assert!(next_rx.try_recv().is_err());
        assert_eq!(
            queue.route("bestmove g1f3"),
            Some(Settled::Caller("go".into()))
        );
        assert_eq!(next_rx.try_recv().unwrap().unwrap().mv, "g1f3");
    }

    #[tokio::test(start_paused = true)]
    async fn expired_non_head_search_waits_for_the_head() {
        let now = Instant::now();
        let mut queue = CommandQueue::new();
        let (head, _head_rx) = search(now + SECOND * 10);
        let (tail, mut tail_rx) = search(now + SECOND);
        queue.push_back(head);
        queue.push_back(tail);

        let expired = queue.expire(now + SECOND, SECOND);
        assert_eq!(expired, vec![Expired::Caller("go".into())]);
        assert!(tail_rx.try_recv().unwrap().unwrap().is_null());
        assert_eq!(queue.len(), 2);

        // the engine has not started that search, so nothing is interrupted
        // and the drain does not count down
        assert_eq!(queue.activate_head(now + SECOND), None);
        assert_eq!(queue.next_deadline(), Some(now + SECOND * 10));
        assert!(queue.expire(now + SECOND * 5, SECOND).is_empty());

        assert_eq!(
            queue.route("bestmove a2a3"),
            Some(Settled::Caller("go".into()))
        );
        assert_eq!(queue.activate_head(now + SECOND * 6), Some(Command::Stop));
        assert_eq!(queue.next_deadline(), Some(now + SECOND * 7));
        assert_eq!(
            queue.route("bestmove b2b3"),
            Some(Settled::Drained("go".into()))
        );
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_bench_drains_for_its_own_budget() {
        let now = Instant::now();
        let mut queue = CommandQueue::new();
        let (entry, mut rx) = caller(BenchHandler::new(), "bench", now + SECOND);
        queue.push_back(entry);

        queue.route("Total Evals: 10");
        assert_eq!(
            queue.expire(now + SECOND, Duration::from_millis(1)),
            vec![Expired::Caller("bench".into())]
        );
        assert!(rx.try_recv().unwrap().unwrap().is_partial);

        // no command stops a benchmark; wait as long again for the banner
        assert_eq!(queue.activate_head(now + SECOND), None);
        assert_eq!(queue.next_deadline(), Some(now + SECOND * 2));
        assert_eq!(queue.route("Total Nodes: 99"), None);
        assert_eq!(
            queue.route("--- Benchmark Complete ---"),
            Some(Settled::Drained("bench".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_without_interrupt_is_removed() {
        let now = Instant::now();
        let mut queue = CommandQueue::new();
        let (entry, mut rx) = caller(LineMatch::ready(), "isready", now + SECOND);
        queue.push_back(entry);

        assert!(queue.expire(now, SECOND).is_empty());
        assert_eq!(queue.next_deadline(), Some(now + SECOND));

        let expired = queue.expire(now + SECOND, SECOND);
        assert_eq!(expired.len(), 1);
        assert!(queue.is_empty());
        assert!(matches!(rx.try_recv().unwrap(), Err(Error::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn drain_entries_expire() {
        let now = Instant::now();
        let mut queue = CommandQueue::new();
        let (entry, _rx) = search(now);
        queue.push_back(entry);

        queue.expire(now, SECOND);
        assert_eq!(queue.next_deadline(), None);
        queue.activate_head(now);
        assert_eq!(queue.next_deadline(), Some(now + SECOND));
        assert_eq!(
            queue.expire(now + SECOND, SECOND),
            vec![Expired::Drain("go".into())]
        );
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn huge_timeouts_do_not_overflow() {
        let now = Instant::now();
        let deadline = deadline_after(now, Duration::MAX);
        assert!(deadline > now + SECOND * 3600);
        assert_eq!(deadline_after(now, SECOND), now + SECOND);
    }

    #[tokio::test(start_paused = true)]
    async fn reject_all_settles_every_caller() {
        let now = Instant::now();
        let mut queue = CommandQueue::new();
        queue.push_back(Entry::handshake(HandshakeStep::Uci, now + SECOND));
        let (a, mut a_rx) = search(now + SECOND);
        let (b, mut b_rx) = caller(LineMatch::ready(), "isready", now + SECOND);
        queue.push_back(a);
        queue.push_back(b);

        let rejected = queue.reject_all(|| Error::crashed("stdout closed"));
        assert_eq!(rejected, 2);
        assert!(queue.is_empty());
        assert!(matches!(a_rx.try_recv().unwrap(), Err(Error::EngineCrashed { .. })));
        assert!(matches!(b_rx.try_recv().unwrap(), Err(Error::EngineCrashed { .. })));
    }
}
