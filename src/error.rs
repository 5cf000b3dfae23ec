//! Error types for lockstep.

use thiserror::Error;

/// Result type alias using lockstep's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for lockstep operations.
///
/// Every variant except [`Error::Io`] and [`Error::Storage`] is a fatal
/// wiring mistake: it aborts startup or registration and is never retried.
/// Per-tick outcomes like `SkipToNext` and `EndOfFile` are plain control
/// flow (see [`Status`](crate::node::Status)), not errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Typed lookup found no matching registered unit.
    #[error("lookup found no {0}")]
    LookupNotFound(&'static str),

    /// Typed lookup matched more than one registered unit.
    #[error("lookup found multiple matches for {0}")]
    LookupAmbiguous(&'static str),

    /// Typed lookup was attempted before the connect phase.
    #[error("lookup is only allowed during or after the connect phase")]
    LookupBeforeConnect,

    /// A second stream tried to claim the clock writer role.
    #[error("attempted to register multiple clock writers")]
    DuplicateClockWriter,

    /// A named output was opened twice without `reopen`.
    #[error("output \"{0}\" already open")]
    OutputAlreadyOpen(String),

    /// A named output was requested but never opened.
    #[error("output \"{0}\" was never opened")]
    OutputNotOpen(String),

    /// Storage adapter failure while loading inputs or fetching a record.
    #[error("storage error: {0}")]
    Storage(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
