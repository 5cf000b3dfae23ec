//! Record-consuming algorithms.
//!
//! Most selection logic boils down to: find my upstream source, and run
//! a function over each record it publishes. [`SimpleAlg`] packages that
//! wiring; the per-record logic is anything implementing [`Consume`],
//! including plain closures:
//!
//! ```rust,ignore
//! pipe.add_alg(SimpleAlg::<MuonReader, _>::new(|muon: &Muon| {
//!     Ok(veto_if(muon.charge_pe < 3000.0))
//! }));
//! ```

use crate::error::Result;
use crate::node::{Algorithm, Handle, Node, Select, Source, Status};
use crate::pipeline::Pipeline;

/// Per-record logic hosted by a [`SimpleAlg`].
///
/// Blanket-implemented for closures, so a bare `FnMut(&T) -> Result<Status>`
/// is a valid consumer. Units that need more than per-record logic
/// (end-of-run summaries, extra wiring) implement
/// [`Algorithm`] themselves instead.
pub trait Consume<T> {
    /// Handle one published record.
    fn consume(&mut self, data: &T) -> Result<Status>;
}

impl<T, F> Consume<T> for F
where
    F: FnMut(&T) -> Result<Status>,
{
    fn consume(&mut self, data: &T) -> Result<Status> {
        self(data)
    }
}

/// An algorithm that feeds each record published by an upstream
/// [`Source`] to a [`Consume`] implementation.
///
/// The upstream is resolved during the connect phase via [`Select`]; on
/// ticks where the upstream is gated (`ready() == false`) the consumer is
/// not called and the tick continues.
pub struct SimpleAlg<R: Source + 'static, C: Consume<R::Data>> {
    select: Select<R>,
    reader: Option<Handle<R>>,
    consumer: C,
}

impl<R: Source + 'static, C: Consume<R::Data>> SimpleAlg<R, C> {
    /// Consume from the single untagged instance of `R`.
    pub fn new(consumer: C) -> Self {
        Self::selecting(Select::Any, consumer)
    }

    /// Consume from the instance of `R` registered under `tag`.
    pub fn tagged(tag: i32, consumer: C) -> Self {
        Self::selecting(Select::Tag(tag), consumer)
    }

    /// Consume from the single instance of `R` matching `pred`.
    pub fn matching(pred: impl Fn(&R) -> bool + 'static, consumer: C) -> Self {
        Self::selecting(Select::Pred(Box::new(pred)), consumer)
    }

    fn selecting(select: Select<R>, consumer: C) -> Self {
        Self {
            select,
            reader: None,
            consumer,
        }
    }

    /// The hosted consumer.
    pub fn consumer(&self) -> &C {
        &self.consumer
    }

    /// Mutable access to the hosted consumer.
    pub fn consumer_mut(&mut self) -> &mut C {
        &mut self.consumer
    }

    fn reader(&self) -> Handle<R> {
        match &self.reader {
            Some(r) => r.clone(),
            None => panic!("executed before connect"),
        }
    }
}

impl<R: Source + 'static, C: Consume<R::Data>> Node for SimpleAlg<R, C> {
    fn connect(&mut self, pipe: &Pipeline) -> Result<()> {
        self.reader = Some(self.select.resolve_alg(pipe)?);
        Ok(())
    }
}

impl<R: Source + 'static, C: Consume<R::Data>> Algorithm for SimpleAlg<R, C> {
    fn execute(&mut self, _pipe: &Pipeline) -> Result<Status> {
        let reader = self.reader();
        let reader = reader.borrow();
        if reader.ready() {
            self.consumer.consume(reader.data())
        } else {
            Ok(Status::Continue)
        }
    }
}
