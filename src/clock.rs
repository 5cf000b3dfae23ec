//! Process-wide shared logical time.
//!
//! The [`Clock`] is a tool shared by every synchronized stream: one
//! writer stream advances it, any number of reader streams gate against
//! it. Because execution is single-threaded and updates are
//! monotonic-max, the single-writer invariant is the entire locking
//! discipline.

use crate::error::{Error, Result};
use crate::node::Node;
use crate::time::Time;
use std::cell::Cell;

/// Shared logical time with single-writer discipline.
///
/// - [`Clock::update`] never regresses: the stored time is the running
///   maximum of everything the writer has published.
/// - [`Clock::signal_end`] is one-way: once the writer's stream is
///   exhausted the flag stays set for the rest of the run, letting reader
///   streams drain unconditionally.
/// - [`Clock::register_writer`] enforces that at most one stream per
///   clock holds the writer role.
///
/// # Examples
///
/// ```rust
/// use lockstep::clock::Clock;
/// use lockstep::time::Time;
///
/// let clock = Clock::new();
/// clock.update(Time::new(5, 0));
/// clock.update(Time::new(3, 0)); // ignored: would regress
/// assert_eq!(clock.current(), Time::new(5, 0));
/// ```
#[derive(Default)]
pub struct Clock {
    current: Cell<Time>,
    at_end: Cell<bool>,
    writers: Cell<u32>,
}

impl Clock {
    /// Create a clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current logical time.
    #[inline]
    pub fn current(&self) -> Time {
        self.current.get()
    }

    /// Advance to `t` if it is later than the current time
    /// (monotonic-max; earlier values are ignored).
    #[inline]
    pub fn update(&self, t: Time) {
        if t > self.current.get() {
            self.current.set(t);
        }
    }

    /// Whether the writer stream has ended.
    #[inline]
    pub fn at_end(&self) -> bool {
        self.at_end.get()
    }

    /// Mark the end of the writer stream. Never reset.
    pub fn signal_end(&self) {
        tracing::debug!("clock writer signalled end of stream");
        self.at_end.set(true);
    }

    /// Claim the writer role for a stream.
    ///
    /// At most one stream per clock may write; a second registration is
    /// fatal.
    pub fn register_writer(&self) -> Result<()> {
        let n = self.writers.get() + 1;
        self.writers.set(n);
        if n > 1 {
            return Err(Error::DuplicateClockWriter);
        }
        Ok(())
    }
}

impl Node for Clock {}
