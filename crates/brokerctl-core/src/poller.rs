//! Exponential-backoff polling of a result queue
//!
//! A total budget is split into geometrically increasing per-poll timeouts so
//! a fast answer is seen quickly while a slow one still fits in the budget.
//! For budgets up to 2 s the queue is polled once. Above that,
//! `attempts = floor(log2(total_ms / 1000)) + 1` and the first timeout is
//! `total_ms / (2^attempts - 1)`, doubling on every attempt.

use crate::broker::EventQueue;
use crate::event::{Event, EventKind};
use std::time::Duration;
use tracing::{debug, trace};

/// Budgets at or below this are polled in a single attempt
pub const SINGLE_POLL_THRESHOLD: Duration = Duration::from_millis(2000);

/// Per-attempt timeouts derived from a total polling budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    attempts: u32,
    initial: Duration,
}

impl PollSchedule {
    pub fn for_budget(total: Duration) -> Self {
        if total <= SINGLE_POLL_THRESHOLD {
            return Self {
                attempts: 1,
                initial: total,
            };
        }

        let total_ms = u64::try_from(total.as_millis()).unwrap_or(u64::MAX);
        let attempts = (total_ms / 1000).ilog2() + 1;
        let initial_ms = total_ms / ((1u64 << attempts) - 1);

        Self {
            attempts,
            initial: Duration::from_millis(initial_ms),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Timeout of the first poll
    pub fn initial(&self) -> Duration {
        self.initial
    }

    /// Timeout of every poll, in order
    pub fn timeouts(&self) -> impl Iterator<Item = Duration> {
        let initial = self.initial;
        (0..self.attempts).map(move |i| initial.saturating_mul(1u32 << i.min(31)))
    }
}

/// Poll `queue` for an event of kind `wanted` within `total`.
///
/// Returns `None` when the budget runs out. Events of any other kind are
/// dropped and the attempt counts as spent, so a stray event looks the same
/// as a timeout to the caller.
pub async fn poll_for_event(
    queue: &mut dyn EventQueue,
    wanted: EventKind,
    total: Duration,
) -> Option<Event> {
    let schedule = PollSchedule::for_budget(total);
    trace!(
        ?total,
        attempts = schedule.attempts(),
        initial = ?schedule.initial(),
        "polling for {}",
        wanted
    );

    for (attempt, timeout) in schedule.timeouts().enumerate() {
        match queue.poll(timeout).await {
            Some(event) if event.kind() == wanted => {
                trace!(attempt, "matched {}", wanted);
                return Some(event);
            }
            Some(event) => {
                debug!(
                    attempt,
                    expected = %wanted,
                    got = %event.kind(),
                    "discarding event of unexpected kind"
                );
            }
            None => trace!(attempt, ?timeout, "poll timed out"),
        }
    }

    None
}
