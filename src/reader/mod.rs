//! Stream readers.
//!
//! [`SeqReader`] pulls records sequentially from a [`Fetch`] adapter and
//! publishes one per tick. [`TimeSyncReader`] layers the cross-stream
//! synchronization protocol on top: a `Writer` stream advances the shared
//! [`Clock`](crate::clock::Clock), `Reader` streams gate their publication
//! against it. [`PrefetchLooper`] holds downstream units back while a
//! synchronized stream is still building its lookahead window.
//!
//! [`Fetch`]: crate::storage::Fetch

mod prefetch;
mod seq;
mod timesync;

pub use prefetch::PrefetchLooper;
pub use seq::SeqReader;
pub use timesync::{ClockMode, Prefetching, TimeSyncReader};
