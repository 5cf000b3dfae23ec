//! Windowed event accumulator.
//!
//! An [`EventBuf`] sits downstream of a stream reader and keeps a
//! bounded window of admitted records in a [`RingBuf`]. It is itself a
//! [`Source`]: once its policy judges the window sufficient, it releases
//! the oldest unreleased record, one per tick, to downstream consumers.
//! A [`BufferedAlg`] consumes those releases together with a cursor over
//! the whole window, which is what look-back logic (e.g. a muon veto
//! scanning recent muons around a candidate) needs.

use crate::error::Result;
use crate::node::{Algorithm, Handle, Node, Select, Source, Status};
use crate::pipeline::Pipeline;
use crate::ring::{RingBuf, RingIter};

// ============================================================================
// Policy
// ============================================================================

/// Admission and sufficiency policy for an [`EventBuf`].
pub trait BufPolicy<T> {
    /// Whether `candidate` is admitted to the window.
    fn keep(&mut self, candidate: &T) -> bool {
        let _ = candidate;
        true
    }

    /// Whether the current window suffices to release a pending record.
    fn enough(&mut self, buf: &RingBuf<T>) -> bool;
}

/// Keep everything; the window is sufficient once it holds at least
/// this many items.
#[derive(Clone, Copy, Debug)]
pub struct MinSize(
    /// Minimum window size.
    pub usize,
);

impl<T> BufPolicy<T> for MinSize {
    fn enough(&mut self, buf: &RingBuf<T>) -> bool {
        buf.len() >= self.0
    }
}

// ============================================================================
// EventBuf
// ============================================================================

/// A bounded window over an upstream [`Source`], releasing records once
/// the window is sufficient.
///
/// Each tick where the upstream published, the record passes through the
/// policy's `keep` filter into the ring and bumps the pending counter.
/// When `enough` holds, the buffer publishes (as a `Source` in its own
/// right) the oldest still-pending record for exactly one tick; the
/// post-step retires it. Records keep ageing through the ring after
/// release, so downstream window scans see both released and pending
/// items until capacity evicts them.
pub struct EventBuf<R: Source + 'static, P: BufPolicy<R::Data>>
where
    R::Data: Clone,
{
    select: Select<R>,
    upstream: Option<Handle<R>>,
    buf: RingBuf<R::Data>,
    policy: P,
    pending: usize,
    ready: bool,
}

impl<R: Source + 'static, P: BufPolicy<R::Data>> EventBuf<R, P>
where
    R::Data: Clone,
{
    /// Window over the single untagged instance of `R`.
    pub fn new(capacity: usize, policy: P) -> Self {
        Self::selecting(Select::Any, capacity, policy)
    }

    /// Window over the instance of `R` registered under `tag`.
    pub fn tagged(tag: i32, capacity: usize, policy: P) -> Self {
        Self::selecting(Select::Tag(tag), capacity, policy)
    }

    fn selecting(select: Select<R>, capacity: usize, policy: P) -> Self {
        Self {
            select,
            upstream: None,
            buf: RingBuf::new(capacity),
            policy,
            pending: 0,
            ready: false,
        }
    }

    /// Reallocate the window, dropping current contents.
    pub fn resize(&mut self, capacity: usize) {
        self.buf.resize(capacity);
        self.pending = 0;
        self.ready = false;
    }

    /// Offer one record to the window.
    pub fn consume(&mut self, data: R::Data) {
        if self.policy.keep(&data) {
            self.buf.put(data);
            self.pending += 1;
            if self.policy.enough(&self.buf) {
                self.ready = true;
            }
        }
    }

    /// The newest record in the window.
    pub fn latest(&self) -> &R::Data {
        self.buf.top()
    }

    /// Cursor positioned at the record being released, with the whole
    /// window reachable through cursor arithmetic.
    pub fn iter(&self) -> RingIter<'_, R::Data> {
        self.buf.iter_at(self.pending - 1)
    }

    /// Number of admitted records not yet released.
    pub fn pending(&self) -> usize {
        self.pending
    }

    fn upstream(&self) -> Handle<R> {
        match &self.upstream {
            Some(r) => r.clone(),
            None => panic!("executed before connect"),
        }
    }
}

impl<R: Source + 'static, P: BufPolicy<R::Data>> Node for EventBuf<R, P>
where
    R::Data: Clone,
{
    fn connect(&mut self, pipe: &Pipeline) -> Result<()> {
        self.upstream = Some(self.select.resolve_alg(pipe)?);
        Ok(())
    }
}

impl<R: Source + 'static, P: BufPolicy<R::Data>> Algorithm for EventBuf<R, P>
where
    R::Data: Clone,
{
    fn execute(&mut self, _pipe: &Pipeline) -> Result<Status> {
        let upstream = self.upstream();
        let data = {
            let upstream = upstream.borrow();
            upstream.ready().then(|| upstream.data().clone())
        };
        if let Some(data) = data {
            self.consume(data);
        }
        Ok(Status::Continue)
    }

    fn post_execute(&mut self) {
        // Released exactly one record this tick?
        if self.ready {
            self.pending -= 1;
        }
        self.ready = false;
    }
}

impl<R: Source + 'static, P: BufPolicy<R::Data>> Source for EventBuf<R, P>
where
    R::Data: Clone,
{
    type Data = R::Data;

    fn ready(&self) -> bool {
        self.ready
    }

    fn data(&self) -> &R::Data {
        self.buf.at(self.pending - 1)
    }
}

// ============================================================================
// Windowed consumers
// ============================================================================

/// A [`Source`] that also exposes a cursor over its retained window.
pub trait Window: Source {
    /// Cursor at the released record; the rest of the window is reachable
    /// through cursor arithmetic.
    fn window(&self) -> RingIter<'_, Self::Data>;
}

impl<R: Source + 'static, P: BufPolicy<R::Data>> Window for EventBuf<R, P>
where
    R::Data: Clone,
{
    fn window(&self) -> RingIter<'_, Self::Data> {
        self.iter()
    }
}

/// Per-release logic hosted by a [`BufferedAlg`].
///
/// Blanket-implemented for closures over a window cursor.
pub trait ConsumeIter<T> {
    /// Handle one released record, given a cursor positioned at it.
    fn consume_iter(&mut self, window: RingIter<'_, T>) -> Result<Status>;
}

impl<T, F> ConsumeIter<T> for F
where
    F: for<'a> FnMut(RingIter<'a, T>) -> Result<Status>,
{
    fn consume_iter(&mut self, window: RingIter<'_, T>) -> Result<Status> {
        self(window)
    }
}

/// An algorithm fed by a [`Window`] source, seeing each released record
/// along with the window around it.
pub struct BufferedAlg<W: Window + 'static, C: ConsumeIter<W::Data>> {
    select: Select<W>,
    window: Option<Handle<W>>,
    consumer: C,
}

impl<W: Window + 'static, C: ConsumeIter<W::Data>> BufferedAlg<W, C> {
    /// Consume from the single untagged instance of `W`.
    pub fn new(consumer: C) -> Self {
        Self::selecting(Select::Any, consumer)
    }

    /// Consume from the instance of `W` registered under `tag`.
    pub fn tagged(tag: i32, consumer: C) -> Self {
        Self::selecting(Select::Tag(tag), consumer)
    }

    fn selecting(select: Select<W>, consumer: C) -> Self {
        Self {
            select,
            window: None,
            consumer,
        }
    }

    fn window(&self) -> Handle<W> {
        match &self.window {
            Some(w) => w.clone(),
            None => panic!("executed before connect"),
        }
    }
}

impl<W: Window + 'static, C: ConsumeIter<W::Data>> Node for BufferedAlg<W, C> {
    fn connect(&mut self, pipe: &Pipeline) -> Result<()> {
        self.window = Some(self.select.resolve_alg(pipe)?);
        Ok(())
    }
}

impl<W: Window + 'static, C: ConsumeIter<W::Data>> Algorithm for BufferedAlg<W, C> {
    fn execute(&mut self, _pipe: &Pipeline) -> Result<Status> {
        let window = self.window();
        let window = window.borrow();
        if window.ready() {
            self.consumer.consume_iter(window.window())
        } else {
            Ok(Status::Continue)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::SeqReader;
    use crate::storage::Fetch;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    struct VecFetch(Vec<u32>);

    impl Fetch for VecFetch {
        type Record = u32;

        fn load(&mut self, _inputs: &[PathBuf]) -> Result<()> {
            Ok(())
        }

        fn fetch(&mut self, entry: u64) -> Result<Option<u32>> {
            Ok(self.0.get(entry as usize).copied())
        }
    }

    type Reader = SeqReader<VecFetch>;
    type Buf = EventBuf<Reader, MinSize>;

    #[test]
    fn test_ready_after_sufficient_window() {
        // Scenario: keep everything, sufficiency at three items.
        let mut buf = Buf::new(8, MinSize(3));

        buf.consume(10);
        assert!(!buf.ready());
        buf.consume(20);
        assert!(!buf.ready());
        buf.consume(30);
        assert!(buf.ready());
        assert_eq!(buf.pending(), 3);

        // The released record is the oldest pending one.
        assert_eq!(*buf.data(), 10);
        assert_eq!(*buf.latest(), 30);

        buf.post_execute();
        assert!(!buf.ready());
        assert_eq!(buf.pending(), 2);
    }

    #[test]
    fn test_releases_one_per_tick() {
        let mut buf = Buf::new(8, MinSize(3));
        for v in [1, 2, 3, 4] {
            buf.consume(v);
            buf.post_execute();
        }
        // Window sufficient since the third item; two releases so far.
        assert_eq!(buf.pending(), 2);

        buf.consume(5);
        assert!(buf.ready());
        assert_eq!(*buf.data(), 3);
    }

    #[test]
    fn test_admission_filter() {
        struct EvenOnly;
        impl BufPolicy<u32> for EvenOnly {
            fn keep(&mut self, candidate: &u32) -> bool {
                candidate % 2 == 0
            }
            fn enough(&mut self, buf: &RingBuf<u32>) -> bool {
                !buf.is_empty()
            }
        }

        let mut buf = EventBuf::<Reader, _>::new(4, EvenOnly);
        buf.consume(1);
        assert!(!buf.ready());
        assert_eq!(buf.pending(), 0);

        buf.consume(2);
        assert!(buf.ready());
        assert_eq!(*buf.data(), 2);
    }

    #[test]
    fn test_windowed_pipeline_sees_lookback() {
        // Each release should see itself plus the newer records that
        // arrived while it was pending.
        let windows: Rc<RefCell<Vec<Vec<u32>>>> = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&windows);

        let mut pipe = Pipeline::new();
        pipe.add_alg(SeqReader::new(VecFetch(vec![1, 2, 3, 4, 5])));
        pipe.add_alg(Buf::new(8, MinSize(3)));
        pipe.add_alg(BufferedAlg::<Buf, _>::new(move |w: RingIter<'_, u32>| {
            // Walk from the released record toward the newest.
            let mut seen = Vec::new();
            let mut cur = w;
            loop {
                seen.push(*cur.item().unwrap());
                if cur.age() == 0 {
                    break;
                }
                cur = cur.later();
            }
            log.borrow_mut().push(seen);
            Ok(Status::Continue)
        }));

        pipe.run(vec![]).unwrap();

        assert_eq!(
            *windows.borrow(),
            vec![vec![1, 2, 3], vec![2, 3, 4], vec![3, 4, 5]]
        );
    }
}
