//! Pipeline registry and scheduler.
//!
//! This module provides the [`Pipeline`]: the owner of every processing
//! unit and tool instance, the typed/tagged lookup registry that wires
//! them together during the connect phase, and the cooperative tick loop
//! that drives them until every reader stream is exhausted.
//!
//! # Example
//!
//! ```rust,ignore
//! use lockstep::prelude::*;
//!
//! let mut pipe = Pipeline::new();
//! pipe.add_tool(Clock::new());
//! pipe.add_alg(TimeSyncReader::new(muon_fetch, ClockMode::Writer));
//! pipe.add_alg(TimeSyncReader::new(trigger_fetch, ClockMode::Reader));
//! pipe.add_alg(SimpleAlg::<TriggerReader, _>::new(|rec| Ok(veto_if(rec.noisy()))));
//! pipe.run(inputs)?;
//! ```

mod driver;
mod registry;

use crate::storage::OutputFile;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

pub(crate) use registry::{AlgEntry, ToolEntry};

/// Startup/run phase, used to fence registry lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Phase {
    Register,
    Load,
    Connect,
    Run,
    Finalize,
}

/// The registry/scheduler: owns all units, wires them during the connect
/// phase, and drives the per-tick execution loop.
///
/// Lifecycle: register units, then [`Pipeline::run`] performs two-phase
/// startup (load, then connect), ticks until every reader has returned
/// [`Status::EndOfFile`](crate::node::Status::EndOfFile), and finalizes.
pub struct Pipeline {
    pub(crate) algs: Vec<AlgEntry>,
    pub(crate) tools: Vec<ToolEntry>,
    /// Indices into `algs` of readers that have not yet hit end of file.
    pub(crate) running_readers: HashSet<usize>,
    pub(crate) phase: Phase,
    pub(crate) inputs: Vec<PathBuf>,
    pub(crate) outputs: RefCell<BTreeMap<String, OutputFile>>,
    pub(crate) current_output: RefCell<Option<String>>,
    /// Input-source-change notifications queued during a unit's step and
    /// fanned out between unit steps.
    pub(crate) file_changes: RefCell<Vec<usize>>,
}

impl Pipeline {
    /// Name of the default output artifact.
    pub const DEFAULT_OUTPUT: &'static str = "";

    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self {
            algs: Vec::new(),
            tools: Vec::new(),
            running_readers: HashSet::new(),
            phase: Phase::Register,
            inputs: Vec::new(),
            outputs: RefCell::new(BTreeMap::new()),
            current_output: RefCell::new(None),
            file_changes: RefCell::new(Vec::new()),
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
