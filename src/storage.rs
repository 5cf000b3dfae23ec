//! Boundary contracts with the external storage adapter.
//!
//! The core never parses or persists records itself. Readers pull
//! records through [`Fetch`], synchronized streams expose their record
//! timestamps through [`Timestamped`], and named output artifacts are
//! handed out as opaque [`OutputFile`] handles that a storage adapter
//! binds fields to.

use crate::error::Result;
use crate::time::Time;
use std::path::{Path, PathBuf};
use std::rc::Rc;

// ============================================================================
// Fetch
// ============================================================================

/// Record access provided by a storage adapter.
///
/// A `Fetch` implementation owns whatever file/chain machinery the
/// storage layer needs; the core only asks it to bind to the input list
/// once and to produce the record for a given entry number.
pub trait Fetch {
    /// The record type this adapter produces.
    type Record;

    /// Bind to the named inputs. Called once, before the first fetch.
    fn load(&mut self, inputs: &[PathBuf]) -> Result<()>;

    /// Fetch the record for `entry`, or `None` once the stream is
    /// exhausted. Each entry is attempted exactly once.
    fn fetch(&mut self, entry: u64) -> Result<Option<Self::Record>>;

    /// If the last fetch crossed into a different input source, its index
    /// in the input list. The reader fans this out as a file-changed
    /// notification.
    fn source_changed(&mut self) -> Option<usize> {
        None
    }
}

/// Access to a record's timestamp, required by synchronized streams.
pub trait Timestamped {
    /// The record's timestamp.
    fn time(&self) -> Time;
}

// ============================================================================
// OutputFile
// ============================================================================

/// An opaque handle to a named output artifact.
///
/// The core only names and tracks outputs; creating and writing the
/// actual artifact is the storage adapter's business. Handles are cheap
/// to clone and remain valid even if the name is later reopened (the
/// reopened name maps to a fresh handle).
#[derive(Clone)]
pub struct OutputFile {
    inner: Rc<OutputInner>,
}

struct OutputInner {
    name: String,
    path: PathBuf,
}

impl OutputFile {
    pub(crate) fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Rc::new(OutputInner {
                name: name.into(),
                path: path.into(),
            }),
        }
    }

    /// The registered name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The path the artifact should be materialized at.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Whether two handles refer to the same opened artifact.
    pub fn same_handle(&self, other: &OutputFile) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for OutputFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputFile")
            .field("name", &self.inner.name)
            .field("path", &self.inner.path)
            .finish()
    }
}
