//! # Lockstep
//!
//! A cooperative, single-pass event-processing pipeline for time-ordered
//! instrument records.
//!
//! Lockstep drives a set of processing units over one or more record
//! streams in a strict single-threaded tick loop, keeping independent
//! streams aligned in time through a shared clock, so selections can
//! look back over a bounded window of recent events without random
//! access to the underlying storage.
//!
//! ## Features
//!
//! - **Typed registry**: units find each other by type and optional tag,
//!   wired once during the connect phase
//! - **Tick scheduler**: registration-order execution with cut
//!   (`SkipToNext`) and end-of-stream semantics
//! - **Cross-stream sync**: one clock-writer stream, any number of gated
//!   reader streams with prefetch and gap recovery
//! - **Bounded lookback**: ring-buffered windows with stable cursors
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lockstep::prelude::*;
//!
//! let mut pipe = Pipeline::new();
//! pipe.add_tool(Clock::new());
//! pipe.add_alg(TimeSyncReader::new(muons, ClockMode::Writer));
//! pipe.add_alg(TimeSyncReader::new(triggers, ClockMode::Reader));
//! pipe.add_alg(SimpleAlg::<TriggerReader, _>::new(|t: &Trigger| {
//!     Ok(veto_if(t.charge_pe < 3000.0))
//! }));
//! pipe.run(inputs)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alg;
pub mod clock;
pub mod error;
pub mod event_buf;
pub mod node;
pub mod pipeline;
pub mod reader;
pub mod ring;
pub mod storage;
pub mod time;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::alg::{Consume, SimpleAlg};
    pub use crate::clock::Clock;
    pub use crate::error::{Error, Result};
    pub use crate::event_buf::{BufPolicy, BufferedAlg, ConsumeIter, EventBuf, MinSize, Window};
    pub use crate::node::{veto_if, Algorithm, Handle, Node, Select, Source, Status};
    pub use crate::pipeline::Pipeline;
    pub use crate::reader::{ClockMode, PrefetchLooper, Prefetching, SeqReader, TimeSyncReader};
    pub use crate::ring::{RingBuf, RingIter};
    pub use crate::storage::{Fetch, OutputFile, Timestamped};
    pub use crate::time::Time;
}

pub use error::{Error, Result};
