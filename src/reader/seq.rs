//! Sequential record reader.

use crate::error::Result;
use crate::node::{Algorithm, Node, Source, Status};
use crate::pipeline::Pipeline;
use crate::storage::Fetch;
use std::path::PathBuf;

/// A reader that pulls records one entry at a time from a [`Fetch`]
/// adapter and publishes each for exactly one tick.
///
/// Every successful fetch publishes the record (`ready() == true`) for
/// the tick; once the adapter reports exhaustion, or the configured event
/// cap is hit, the reader returns [`Status::EndOfFile`] and stops
/// publishing.
pub struct SeqReader<F: Fetch> {
    fetch: F,
    record: Option<F::Record>,
    entry: u64,
    ready: bool,
    max_events: u64,
    report_interval: u64,
}

impl<F: Fetch> SeqReader<F> {
    /// Create a reader over a fetch adapter.
    pub fn new(fetch: F) -> Self {
        Self {
            fetch,
            record: None,
            entry: 0,
            ready: false,
            max_events: 0,
            report_interval: 0,
        }
    }

    /// Stop after `n` records even if the stream has more (0 = no cap).
    pub fn max_events(mut self, n: u64) -> Self {
        self.max_events = n;
        self
    }

    /// Log progress every `n` records (0 = silent).
    pub fn report_interval(mut self, n: u64) -> Self {
        self.report_interval = n;
        self
    }

    /// Number of records fetched so far.
    pub fn entry(&self) -> u64 {
        self.entry
    }

    /// Fetch and publish the next record.
    ///
    /// Shared with the synchronized reader, which decides per tick
    /// whether to advance at all.
    pub(crate) fn advance(&mut self, pipe: &Pipeline) -> Result<Status> {
        if self.max_events != 0 && self.entry >= self.max_events {
            tracing::debug!(cap = self.max_events, "event cap reached");
            self.ready = false;
            return Ok(Status::EndOfFile);
        }

        match self.fetch.fetch(self.entry)? {
            Some(record) => {
                if self.report_interval != 0 && self.entry % self.report_interval == 0 {
                    tracing::info!(entry = self.entry, "---------- event ----------");
                }
                if let Some(index) = self.fetch.source_changed() {
                    pipe.notify_file_changed(index);
                }
                self.record = Some(record);
                self.ready = true;
                self.entry += 1;
                Ok(Status::Continue)
            }
            None => {
                self.ready = false;
                Ok(Status::EndOfFile)
            }
        }
    }

    pub(crate) fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub(crate) fn load_inputs(&mut self, inputs: &[PathBuf]) -> Result<()> {
        self.fetch.load(inputs)
    }
}

impl<F: Fetch> Node for SeqReader<F> {}

impl<F: Fetch> Algorithm for SeqReader<F> {
    fn load(&mut self, inputs: &[PathBuf]) -> Result<()> {
        self.load_inputs(inputs)
    }

    fn execute(&mut self, pipe: &Pipeline) -> Result<Status> {
        self.advance(pipe)
    }

    fn is_reader(&self) -> bool {
        true
    }
}

impl<F: Fetch> Source for SeqReader<F> {
    type Data = F::Record;

    fn ready(&self) -> bool {
        self.ready
    }

    fn data(&self) -> &F::Record {
        match &self.record {
            Some(r) => r,
            None => panic!("data() before first publication"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecFetch {
        values: Vec<u32>,
        loaded: bool,
    }

    impl VecFetch {
        fn new(values: Vec<u32>) -> Self {
            Self {
                values,
                loaded: false,
            }
        }
    }

    impl Fetch for VecFetch {
        type Record = u32;

        fn load(&mut self, _inputs: &[PathBuf]) -> Result<()> {
            self.loaded = true;
            Ok(())
        }

        fn fetch(&mut self, entry: u64) -> Result<Option<u32>> {
            assert!(self.loaded);
            Ok(self.values.get(entry as usize).copied())
        }
    }

    #[test]
    fn test_publishes_each_record_once() {
        let pipe = Pipeline::new();
        let mut reader = SeqReader::new(VecFetch::new(vec![7, 8]));
        reader.load(&[]).unwrap();

        assert_eq!(reader.execute(&pipe).unwrap(), Status::Continue);
        assert!(reader.ready());
        assert_eq!(*reader.data(), 7);

        assert_eq!(reader.execute(&pipe).unwrap(), Status::Continue);
        assert_eq!(*reader.data(), 8);

        assert_eq!(reader.execute(&pipe).unwrap(), Status::EndOfFile);
        assert!(!reader.ready());
    }

    #[test]
    fn test_max_events_caps_stream() {
        let pipe = Pipeline::new();
        let mut reader = SeqReader::new(VecFetch::new(vec![1, 2, 3, 4])).max_events(2);
        reader.load(&[]).unwrap();

        assert_eq!(reader.execute(&pipe).unwrap(), Status::Continue);
        assert_eq!(reader.execute(&pipe).unwrap(), Status::Continue);
        assert_eq!(reader.execute(&pipe).unwrap(), Status::EndOfFile);
        assert_eq!(reader.entry(), 2);
    }

    #[test]
    fn test_source_change_queued() {
        struct SwitchingFetch;

        impl Fetch for SwitchingFetch {
            type Record = u32;

            fn load(&mut self, _inputs: &[PathBuf]) -> Result<()> {
                Ok(())
            }

            fn fetch(&mut self, entry: u64) -> Result<Option<u32>> {
                Ok((entry < 2).then_some(entry as u32))
            }

            fn source_changed(&mut self) -> Option<usize> {
                Some(1)
            }
        }

        let pipe = Pipeline::new();
        let mut reader = SeqReader::new(SwitchingFetch);
        reader.execute(&pipe).unwrap();
        // The notification lands in the pipeline queue for fan-out
        // between unit steps.
        assert_eq!(pipe.file_changes.borrow().as_slice(), &[1]);
    }
}
