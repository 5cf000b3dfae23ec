//! Clock-synchronized stream reader.

use crate::clock::Clock;
use crate::error::Result;
use crate::node::{Algorithm, Handle, Node, Source, Status};
use crate::pipeline::Pipeline;
use crate::reader::SeqReader;
use crate::storage::{Fetch, Timestamped};
use crate::time::Time;
use std::path::PathBuf;

/// A synchronized stream's role against the shared [`Clock`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockMode {
    /// Advances the clock to each record's timestamp and signals the end
    /// of stream. At most one per clock.
    Writer,
    /// Gates publication against the clock to stay within the lead-time
    /// window of the writer stream.
    Reader,
}

/// Lookahead-window visibility, for [`PrefetchLooper`].
///
/// [`PrefetchLooper`]: crate::reader::PrefetchLooper
pub trait Prefetching {
    /// Whether the stream is currently building its lookahead window.
    fn is_prefetching(&self) -> bool;
}

/// A [`SeqReader`] synchronized against the shared [`Clock`].
///
/// A `Writer`-mode stream publishes every record and drags the clock
/// along. A `Reader`-mode stream holds a fetched record back whenever it
/// runs more than the lead time ahead of the clock, re-fetching only
/// after the held record has been published, so the stream never drifts
/// more than one record past the gate. Three situations force
/// publication regardless of the gate:
///
/// - the very first record, and any record while the stream is building
///   its lookahead window (prefetching);
/// - a gap since the previous published record larger than the gap
///   threshold, which restarts prefetching;
/// - the clock's end flag, after which the stream drains unconditionally.
pub struct TimeSyncReader<F: Fetch>
where
    F::Record: Timestamped,
{
    inner: SeqReader<F>,
    mode: ClockMode,
    lead_time_us: i64,
    gap_threshold_us: i64,
    prefetching: bool,
    clock: Option<Handle<Clock>>,
    prefetch_start: Time,
    prev_time: Time,
}

impl<F: Fetch> TimeSyncReader<F>
where
    F::Record: Timestamped,
{
    /// Default gate width.
    pub const DEFAULT_LEAD_TIME_US: i64 = 2_000;
    /// Default silent-period length that restarts prefetching.
    pub const DEFAULT_GAP_THRESHOLD_US: i64 = 10_000_000;

    /// Create a synchronized reader over a fetch adapter.
    pub fn new(fetch: F, mode: ClockMode) -> Self {
        Self {
            inner: SeqReader::new(fetch),
            mode,
            lead_time_us: Self::DEFAULT_LEAD_TIME_US,
            gap_threshold_us: Self::DEFAULT_GAP_THRESHOLD_US,
            prefetching: false,
            clock: None,
            prefetch_start: Time::ZERO,
            prev_time: Time::ZERO,
        }
    }

    /// How far ahead of the clock a reader stream may publish (μs).
    pub fn lead_time_us(mut self, us: i64) -> Self {
        self.lead_time_us = us;
        self
    }

    /// Silent-period length that restarts prefetching (μs).
    pub fn gap_threshold_us(mut self, us: i64) -> Self {
        self.gap_threshold_us = us;
        self
    }

    /// Stop after `n` records even if the stream has more (0 = no cap).
    pub fn max_events(mut self, n: u64) -> Self {
        self.inner = self.inner.max_events(n);
        self
    }

    /// Log progress every `n` records (0 = silent).
    pub fn report_interval(mut self, n: u64) -> Self {
        self.inner = self.inner.report_interval(n);
        self
    }

    fn clock(&self) -> Handle<Clock> {
        match &self.clock {
            Some(c) => c.clone(),
            None => panic!("synchronized stream executed before connect"),
        }
    }
}

impl<F: Fetch> Node for TimeSyncReader<F>
where
    F::Record: Timestamped,
{
    fn connect(&mut self, pipe: &Pipeline) -> Result<()> {
        let clock = pipe.tool::<Clock>()?;
        if self.mode == ClockMode::Writer {
            clock.borrow().register_writer()?;
        }
        self.clock = Some(clock);
        Ok(())
    }
}

impl<F: Fetch> Algorithm for TimeSyncReader<F>
where
    F::Record: Timestamped,
{
    fn load(&mut self, inputs: &[PathBuf]) -> Result<()> {
        self.inner.load_inputs(inputs)
    }

    fn execute(&mut self, pipe: &Pipeline) -> Result<Status> {
        let first = self.inner.entry() == 0;
        let clock = self.clock();

        // ready means the held record was published last tick, so the
        // stream owes us a fresh one.
        if first || self.inner.ready() {
            if self.inner.advance(pipe)? == Status::EndOfFile {
                self.prefetching = false;
                if self.mode == ClockMode::Writer {
                    clock.borrow().signal_end();
                }
                return Ok(Status::EndOfFile);
            }
        }

        let t = self.inner.data().time();

        match self.mode {
            ClockMode::Writer => {
                clock.borrow().update(t);
            }
            ClockMode::Reader => {
                let clock = clock.borrow();
                let dt_clock_us = t.diff_us(clock.current());
                let dt_prev_us = t.diff_us(self.prev_time);

                let found_gap = dt_prev_us > self.gap_threshold_us;
                let too_far_ahead = dt_clock_us > self.lead_time_us;
                let not_far_enough = dt_clock_us < self.lead_time_us / 2;

                self.inner.set_ready(true);

                if first || not_far_enough || found_gap {
                    self.prefetching = true;
                    self.prefetch_start = if not_far_enough { clock.current() } else { t };
                    tracing::trace!(%t, start = %self.prefetch_start, "prefetching");
                } else if self.prefetching && t.diff_us(self.prefetch_start) > self.lead_time_us {
                    self.prefetching = false;
                }

                // The gate applies as soon as the window closes, so even
                // the record that closed it can be withheld.
                if !self.prefetching && too_far_ahead && !clock.at_end() {
                    self.inner.set_ready(false);
                }
            }
        }

        self.prev_time = t;
        Ok(Status::Continue)
    }

    fn is_reader(&self) -> bool {
        true
    }
}

impl<F: Fetch> Source for TimeSyncReader<F>
where
    F::Record: Timestamped,
{
    type Data = F::Record;

    fn ready(&self) -> bool {
        self.inner.ready()
    }

    fn data(&self) -> &F::Record {
        self.inner.data()
    }
}

impl<F: Fetch> Prefetching for TimeSyncReader<F>
where
    F::Record: Timestamped,
{
    fn is_prefetching(&self) -> bool {
        self.prefetching
    }
}
