//! Tick gating on an upstream prefetch window.

use crate::error::Result;
use crate::node::{Algorithm, Handle, Node, Select, Status};
use crate::pipeline::Pipeline;
use crate::reader::Prefetching;

/// Skips the rest of the tick while an upstream stream is prefetching.
///
/// Register it between the stream and the units that should only see
/// records once the lookahead window is in place, e.g. a selection that
/// needs a buffer of muons before it can veto against them.
pub struct PrefetchLooper<R: ?Sized> {
    select: Select<R>,
    reader: Option<Handle<R>>,
}

impl<R: Prefetching + 'static> PrefetchLooper<R> {
    /// Gate on the single untagged instance of `R`.
    pub fn new() -> Self {
        Self {
            select: Select::Any,
            reader: None,
        }
    }

    /// Gate on the instance of `R` registered under `tag`.
    pub fn tagged(tag: i32) -> Self {
        Self {
            select: Select::Tag(tag),
            reader: None,
        }
    }
}

impl<R: Prefetching + 'static> Default for PrefetchLooper<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Prefetching + 'static> Node for PrefetchLooper<R> {
    fn connect(&mut self, pipe: &Pipeline) -> Result<()> {
        self.reader = Some(self.select.resolve_alg(pipe)?);
        Ok(())
    }
}

impl<R: Prefetching + 'static> Algorithm for PrefetchLooper<R> {
    fn execute(&mut self, _pipe: &Pipeline) -> Result<Status> {
        let reader = match &self.reader {
            Some(r) => r.clone(),
            None => panic!("executed before connect"),
        };
        let prefetching = reader.borrow().is_prefetching();
        Ok(if prefetching {
            Status::SkipToNext
        } else {
            Status::Continue
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct ToggleReader {
        prefetching: bool,
        ticks_left: u32,
    }

    impl Prefetching for ToggleReader {
        fn is_prefetching(&self) -> bool {
            self.prefetching
        }
    }

    impl Node for ToggleReader {}

    impl Algorithm for ToggleReader {
        fn execute(&mut self, _pipe: &Pipeline) -> Result<Status> {
            if self.ticks_left == 0 {
                return Ok(Status::EndOfFile);
            }
            self.ticks_left -= 1;
            // Window closes after the first tick.
            self.prefetching = self.ticks_left > 1;
            Ok(Status::Continue)
        }

        fn is_reader(&self) -> bool {
            true
        }
    }

    struct Counter {
        hits: Rc<RefCell<u32>>,
    }

    impl Node for Counter {}

    impl Algorithm for Counter {
        fn execute(&mut self, _pipe: &Pipeline) -> Result<Status> {
            *self.hits.borrow_mut() += 1;
            Ok(Status::Continue)
        }
    }

    #[test]
    fn test_downstream_held_back_while_prefetching() {
        let hits = Rc::new(RefCell::new(0));
        let mut pipe = Pipeline::new();
        pipe.add_alg(ToggleReader {
            prefetching: false,
            ticks_left: 3,
        });
        pipe.add_alg(PrefetchLooper::<ToggleReader>::new());
        pipe.add_alg(Counter {
            hits: Rc::clone(&hits),
        });

        pipe.run(vec![]).unwrap();

        // Tick 1 is inside the window, ticks 2-4 pass through.
        assert_eq!(*hits.borrow(), 3);
    }
}
