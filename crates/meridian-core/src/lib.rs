//! # Meridian Core
//!
//! Price/time-priority limit order book and matching engine for a single
//! instrument.
//!
//! ## Design Principles
//! - Single writer: one thread applies commands in arrival order
//! - Integer ticks and lots (no floats)
//! - Arena-backed intrusive FIFO queues for O(1) cancellation
//! - Every command either fully applies (with events) or changes nothing

pub mod config;
pub mod error;
pub mod fixed;
pub mod order;
pub mod pool;
pub mod level;
pub mod book;
pub mod event;
pub mod snapshot;
pub mod engine;
pub mod runner;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use fixed::{Price, Quantity};
pub use order::{Order, OrderId, OwnerId, Side};
pub use pool::{OrderHandle, OrderPool};
pub use level::PriceLevel;
pub use book::{BookSide, MatchResult, OrderBook, Trade};
pub use event::{Event, EventKind, EventSink, FillKind, NullSink};
pub use snapshot::{DepthLevel, DepthSnapshot, QuoteReader, TopOfBook};
pub use engine::{CancelReport, Command, MatchingEngine, NewOrder, Outcome, SubmitReport};
pub use runner::{run, run_with, RunSummary};
