//! Drives an engine from a command ring on the current thread.
//!
//! The runner is the single writer of the book. It returns once the
//! producer side of the ring is closed and every command already in the
//! ring has been applied.

use meridian_ring::{Consumer, Producer};
use serde::Serialize;
use tracing::{error, info};

use crate::engine::{Command, MatchingEngine, Outcome};
use crate::error::Result;
use crate::event::{Event, EventSink};

/// Forward events to another thread through a ring.
///
/// Blocks (spins) while the ring is full, which back-pressures the engine
/// on a slow journal rather than dropping events.
impl EventSink for Producer<'_, Event> {
    #[inline]
    fn publish(&mut self, event: Event) {
        Producer::publish(self, event);
    }
}

/// Counters gathered over one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: u64,
    pub submitted: u64,
    pub cancelled: u64,
    pub rejected: u64,
    /// Commands aborted on a broken invariant.
    pub fatal: u64,
    pub trades: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: &Result<Outcome>) {
        self.processed += 1;
        match outcome {
            Ok(Outcome::Submitted(report)) => {
                self.submitted += 1;
                self.trades += report.trades.len() as u64;
            }
            Ok(Outcome::Cancelled(_)) => self.cancelled += 1,
            Err(err) if err.is_fatal() => self.fatal += 1,
            Err(_) => self.rejected += 1,
        }
    }
}

/// Apply every command from `commands` until the ring is closed and drained.
pub fn run<S: EventSink>(
    engine: &mut MatchingEngine<S>,
    commands: &mut Consumer<'_, Command>,
) -> RunSummary {
    run_with(engine, commands, |_, _, _| {})
}

/// Like [`run`], calling `observe` with each command, its outcome and the
/// time spent applying it in nanoseconds.
pub fn run_with<S, F>(
    engine: &mut MatchingEngine<S>,
    commands: &mut Consumer<'_, Command>,
    mut observe: F,
) -> RunSummary
where
    S: EventSink,
    F: FnMut(&Command, &Result<Outcome>, u64),
{
    let clock = quanta::Clock::new();
    let mut summary = RunSummary::default();

    while let Some(command) = commands.recv() {
        let start = clock.raw();
        let outcome = engine.execute(command);
        let nanos = clock.delta_as_nanos(start, clock.raw());

        if let Err(err) = &outcome {
            if err.is_fatal() {
                error!(?command, error = %err, "command failed");
            }
        }
        summary.record(&outcome);
        observe(&command, &outcome, nanos);
    }

    info!(
        processed = summary.processed,
        rejected = summary.rejected,
        trades = summary.trades,
        sequence = engine.sequence(),
        "command stream drained"
    );
    summary
}
