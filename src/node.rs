//! Core capability traits for pipeline units.
//!
//! A unit attaches to the pipeline through one of two capability traits:
//!
//! - [`Node`]: anything the registry owns — resolves its dependencies
//!   during the connect phase and hears about input-source changes.
//! - [`Algorithm`]: a [`Node`] that also takes part in the tick loop
//!   (load / execute / post_execute / finalize) and may be a reader.
//!
//! Typed record access between units goes through [`Source`], the
//! stream-reader capability: a published record per tick, gated by
//! [`Source::ready`].

use crate::error::Result;
use crate::pipeline::Pipeline;
use std::cell::{Ref, RefCell, RefMut};
use std::path::PathBuf;
use std::rc::Rc;

// ============================================================================
// Status
// ============================================================================

/// Per-tick outcome of a unit's primary step.
///
/// These are expected control-flow results, never errors:
///
/// - `Continue`: proceed to the next unit this tick.
/// - `SkipToNext`: abort the remainder of this tick; no further unit runs
///   its primary step.
/// - `EndOfFile`: this reader is exhausted. It is dropped from the
///   running-reader set, but the current tick still runs to completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Proceed to the next unit this tick.
    Continue,
    /// Abort the remainder of this tick.
    SkipToNext,
    /// This reader's stream is exhausted.
    EndOfFile,
}

/// Map a veto decision onto a [`Status`].
///
/// Returns `SkipToNext` when the condition holds, `Continue` otherwise.
/// The idiomatic ending for a cut:
///
/// ```rust
/// use lockstep::node::{veto_if, Status};
///
/// let energy = 0.3;
/// let status = veto_if(energy < 0.7);
/// assert_eq!(status, Status::SkipToNext);
/// ```
#[inline]
pub fn veto_if(cond: bool) -> Status {
    if cond {
        Status::SkipToNext
    } else {
        Status::Continue
    }
}

// ============================================================================
// Node / Algorithm
// ============================================================================

/// A pipeline-attachable unit.
///
/// Registration happens before startup; during the connect phase the
/// pipeline calls [`Node::connect`], which is the only point a unit may
/// resolve typed/tagged dependencies via the registry lookups.
pub trait Node {
    /// Resolve dependencies against the registry.
    ///
    /// Called exactly once, after every registration and load, before the
    /// first tick.
    fn connect(&mut self, pipe: &Pipeline) -> Result<()> {
        let _ = pipe;
        Ok(())
    }

    /// Notification that a reader switched to input source `index`.
    fn file_changed(&mut self, index: usize) {
        let _ = index;
    }
}

/// A unit that takes part in the tick loop.
///
/// Execution order is registration order, every tick, for both the
/// primary and the post-step pass.
pub trait Algorithm: Node {
    /// Bind to the input list. Called before the connect phase, in
    /// registration order.
    fn load(&mut self, inputs: &[PathBuf]) -> Result<()> {
        let _ = inputs;
        Ok(())
    }

    /// The primary per-tick step.
    fn execute(&mut self, pipe: &Pipeline) -> Result<Status> {
        let _ = pipe;
        Ok(Status::Continue)
    }

    /// The post-step hook, run after the primary pass for every unit that
    /// executed its primary step this tick.
    fn post_execute(&mut self) {}

    /// Called once after the tick loop terminates, in registration order,
    /// regardless of how the run ended.
    fn finalize(&mut self, pipe: &Pipeline) -> Result<()> {
        let _ = pipe;
        Ok(())
    }

    /// Readers produce a terminating stream and are tracked until they
    /// return [`Status::EndOfFile`].
    fn is_reader(&self) -> bool {
        false
    }
}

// ============================================================================
// Source
// ============================================================================

/// The stream-reader capability: typed access to a per-tick record.
///
/// A unit that publishes records implements `Source`; downstream
/// consumers resolve it during connect and read [`Source::data`] on every
/// tick where [`Source::ready`] holds. A gated reader simply reports
/// `ready() == false` for the tick.
pub trait Source {
    /// The record type this source publishes.
    type Data;

    /// Whether a record was published this tick.
    fn ready(&self) -> bool;

    /// The published record.
    ///
    /// Only meaningful while [`Source::ready`] holds; calling it before
    /// the first publication is a contract bug.
    fn data(&self) -> &Self::Data;
}

// ============================================================================
// Handle
// ============================================================================

/// A shared, cloneable reference to a registered unit.
///
/// Returned by registration and by registry lookups. Borrow discipline is
/// the single-threaded cooperative model: the scheduler holds a mutable
/// borrow of exactly one unit at a time, so a unit may freely borrow the
/// units it depends on during its own step.
pub struct Handle<T: ?Sized> {
    inner: Rc<RefCell<T>>,
}

impl<T: ?Sized> Handle<T> {
    pub(crate) fn new(inner: Rc<RefCell<T>>) -> Self {
        Self { inner }
    }

    /// Immutably borrow the unit.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.inner.borrow()
    }

    /// Mutably borrow the unit (for configuration between registration
    /// and startup).
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.inner.borrow_mut()
    }

    pub(crate) fn rc(&self) -> Rc<RefCell<T>> {
        Rc::clone(&self.inner)
    }
}

impl<T: ?Sized> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

// ============================================================================
// Select
// ============================================================================

/// How a consumer unit picks its upstream source among registered units
/// of the same concrete type.
pub enum Select<R: ?Sized> {
    /// The single untagged instance (tag 0).
    Any,
    /// The instance registered with this tag.
    Tag(i32),
    /// The single instance matching a predicate.
    Pred(Box<dyn Fn(&R) -> bool>),
}

impl<R: 'static> Select<R> {
    /// Resolve against the registered algorithms.
    pub fn resolve_alg(&self, pipe: &Pipeline) -> Result<Handle<R>> {
        match self {
            Select::Any => pipe.alg::<R>(),
            Select::Tag(tag) => pipe.alg_tagged::<R>(*tag),
            Select::Pred(pred) => pipe.alg_matching::<R>(pred),
        }
    }

    /// Resolve against the registered tools.
    pub fn resolve_tool(&self, pipe: &Pipeline) -> Result<Handle<R>> {
        match self {
            Select::Any => pipe.tool::<R>(),
            Select::Tag(tag) => pipe.tool_tagged::<R>(*tag),
            Select::Pred(pred) => pipe.tool_matching::<R>(pred),
        }
    }
}

impl<R> Default for Select<R> {
    fn default() -> Self {
        Select::Any
    }
}
