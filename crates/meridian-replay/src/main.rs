//! Meridian Replay - drive the matching engine from a script or a
//! synthetic workload.
//!
//! Commands are fed to a dedicated engine thread through an SPSC ring.
//! Events come back through a second ring to a journal thread that writes
//! them as JSON lines. Per-command latency is recorded on the engine thread.

mod error;
mod journal;
mod script;
mod workload;

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use clap::Parser;
use core_affinity::CoreId;
use meridian_core::{
    run_with, Command, DepthSnapshot, EngineConfig, Event, MatchingEngine, Outcome, RunSummary,
    TopOfBook,
};
use meridian_metrics::{CommandKind, CommandLatency};
use meridian_ring::{Producer, SpscRing, DEFAULT_CAPACITY};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::ReplayError;
use crate::journal::write_journal;
use crate::script::parse_script;
use crate::workload::OrderGenerator;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Command script to replay (B/S/C lines)
    #[clap(short, long)]
    input: Option<PathBuf>,

    /// Number of synthetic commands to generate when no script is given
    #[clap(short, long)]
    orders: Option<usize>,

    /// Seed for the synthetic workload
    #[clap(long, default_value_t = 0x5eed)]
    seed: u64,

    /// Maximum number of resting orders
    #[clap(long, default_value_t = EngineConfig::default().capacity)]
    capacity: usize,

    /// Slots in each ring (rounded up to a power of two)
    #[clap(long, default_value_t = DEFAULT_CAPACITY)]
    ring_size: usize,

    /// Price levels per side in the final depth report
    #[clap(long, default_value_t = EngineConfig::default().depth_levels)]
    depth: usize,

    /// Write every event as a JSON line to this file
    #[clap(short, long)]
    journal: Option<PathBuf>,

    /// Pin the engine thread to this core
    #[clap(long)]
    pin_core: Option<usize>,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_capacity(self.capacity)
            .with_depth_levels(self.depth)
    }

    fn load_commands(&self) -> Result<Vec<Command>, ReplayError> {
        match (&self.input, self.orders) {
            (Some(path), _) => {
                let source = fs::read_to_string(path)?;
                let commands = parse_script(&source)?;
                info!(path = %path.display(), commands = commands.len(), "script loaded");
                Ok(commands)
            }
            (None, Some(count)) => {
                info!(count, seed = self.seed, "generating synthetic workload");
                Ok(OrderGenerator::new(self.seed).generate(count))
            }
            (None, None) => Err(ReplayError::NoWorkload),
        }
    }
}

/// What the engine thread hands back once the command stream is drained.
struct EngineReport {
    summary: RunSummary,
    latency: CommandLatency,
    depth: DepthSnapshot,
    top: TopOfBook,
    pool: (usize, usize),
}

fn find_core(core: usize) -> Result<CoreId, ReplayError> {
    core_affinity::get_core_ids()
        .unwrap_or_default()
        .into_iter()
        .find(|id| id.id == core)
        .ok_or(ReplayError::UnknownCore(core))
}

fn pin_current_thread(core: CoreId) {
    if core_affinity::set_for_current(core) {
        info!(core = core.id, "engine thread pinned");
    } else {
        warn!(core = core.id, "failed to pin engine thread");
    }
}

fn latency_kind(command: &Command, outcome: &meridian_core::Result<Outcome>) -> CommandKind {
    match (command, outcome) {
        (_, Err(_)) => CommandKind::Rejected,
        (Command::NewOrder(_), Ok(_)) => CommandKind::Submit,
        (Command::Cancel { .. }, Ok(_)) => CommandKind::Cancel,
    }
}

fn replay(args: &Args, commands: Vec<Command>) -> Result<(EngineReport, u64), ReplayError> {
    let config = args.engine_config();
    let journal_out = match &args.journal {
        Some(path) => Some(BufWriter::new(File::create(path)?)),
        None => None,
    };
    // Fail before any thread starts.
    let latency = CommandLatency::new()?;
    let pin_core = args.pin_core.map(find_core).transpose()?;

    let mut command_ring: SpscRing<Command> = SpscRing::with_capacity(args.ring_size);
    let mut event_ring: SpscRing<Event> = SpscRing::with_capacity(args.ring_size);
    let (mut command_tx, mut command_rx) = command_ring.split();
    let (event_tx, event_rx) = event_ring.split();

    let (engine_result, journal_result) = thread::scope(|scope| {
        let engine_thread = scope.spawn(move || {
            if let Some(core) = pin_core {
                pin_current_thread(core);
            }
            let mut latency = latency;
            let mut engine = MatchingEngine::with_sink(config, event_tx);
            let summary = run_with(&mut engine, &mut command_rx, |command, outcome, nanos| {
                latency.record(latency_kind(command, outcome), nanos);
            });
            // The engine and its event producer drop on return, ending the journal.
            EngineReport {
                summary,
                latency,
                depth: engine.depth(),
                top: engine.top_of_book(),
                pool: engine.pool_stats(),
            }
        });
        let journal_thread = scope.spawn(move || write_journal(event_rx, journal_out));

        let total = commands.len();
        let fed = feed(&mut command_tx, commands);
        if fed < total {
            warn!(fed, total, "engine thread stopped before the stream ended");
        }
        command_tx.close();

        (engine_thread.join(), journal_thread.join())
    });

    let report = engine_result.map_err(|_| ReplayError::ThreadPanicked("engine"))?;
    let events = journal_result.map_err(|_| ReplayError::ThreadPanicked("journal"))??;
    Ok((report, events))
}

/// Publish `commands` in order, stopping early if the engine side of the
/// ring has gone away. Returns how many were handed over.
fn feed(tx: &mut Producer<'_, Command>, commands: Vec<Command>) -> usize {
    commands.into_iter().take_while(|command| tx.publish(*command)).count()
}

fn log_depth(depth: &DepthSnapshot) {
    for level in depth.asks.iter().rev() {
        debug!(side = "ask", price = %level.price, quantity = %level.quantity, orders = level.order_count, "depth");
    }
    for level in &depth.bids {
        debug!(side = "bid", price = %level.price, quantity = %level.quantity, orders = level.order_count, "depth");
    }
}

fn main() -> Result<(), ReplayError> {
    let args = Args::parse();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting Meridian replay...");
    let commands = args.load_commands()?;
    let total = commands.len();

    let start = Instant::now();
    let (report, events) = replay(&args, commands)?;
    let elapsed = start.elapsed();

    let summary = report.summary;
    let rate = total as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    info!(
        processed = summary.processed,
        submitted = summary.submitted,
        cancelled = summary.cancelled,
        rejected = summary.rejected,
        fatal = summary.fatal,
        trades = summary.trades,
        events,
        elapsed = ?elapsed,
        commands_per_sec = rate as u64,
        "replay finished"
    );
    report.latency.log_summary();

    let top = report.top;
    info!(
        sequence = top.sequence,
        best_bid = ?top.best_bid.map(|p| p.0),
        bid_qty = %top.bid_qty,
        best_ask = ?top.best_ask.map(|p| p.0),
        ask_qty = %top.ask_qty,
        "top of book"
    );
    log_depth(&report.depth);

    let (active, capacity) = report.pool;
    info!(active, capacity, "order pool");
    if summary.fatal > 0 {
        warn!(fatal = summary.fatal, "commands aborted on broken invariants");
    }
    Ok(())
}
