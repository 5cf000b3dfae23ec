//! Bounded-lookback ring buffer.
//!
//! This module provides:
//! - [`RingBuf`]: a fixed-capacity circular buffer addressed by logical
//!   age (age 0 is the most recently stored item)
//! - [`RingIter`]: a restartable cursor/iterator over the buffer that
//!   never exposes raw storage indices
//!
//! `RingBuf` is the primitive behind sliding windows over history: once
//! full, every [`RingBuf::put`] silently evicts the oldest retained item.

use std::fmt;

const DEFAULT_CAPACITY: usize = 1000;

/// A fixed-capacity circular buffer addressed by logical age.
///
/// `at(0)` is always the most recently put item, `at(size() - 1)` the
/// oldest retained one. [`RingBuf::put`] is the only way the size grows
/// and the only steady-state way items are evicted.
///
/// # Examples
///
/// ```rust
/// use lockstep::ring::RingBuf;
///
/// let mut ring = RingBuf::new(3);
/// for v in [1, 2, 3, 4] {
///     ring.put(v);
/// }
///
/// assert_eq!(*ring.at(0), 4);
/// assert_eq!(*ring.at(2), 2);
/// assert!(ring.full());
/// ```
pub struct RingBuf<T> {
    buf: Vec<T>,
    cap: usize,
    /// Physical slot the next `put` writes to. Equals `buf.len()` until
    /// the buffer first fills, then cycles modulo `cap`.
    head: usize,
}

impl<T> RingBuf<T> {
    /// Create a ring buffer with the given capacity.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be nonzero");
        Self {
            buf: Vec::with_capacity(capacity),
            cap: capacity,
            head: 0,
        }
    }

    /// Change the capacity, dropping all current contents.
    pub fn resize(&mut self, capacity: usize) {
        assert!(capacity > 0, "ring buffer capacity must be nonzero");
        self.buf = Vec::with_capacity(capacity);
        self.cap = capacity;
        self.head = 0;
    }

    /// Number of items currently retained.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check whether no items are retained.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Check whether the buffer has reached capacity.
    #[inline]
    pub fn full(&self) -> bool {
        self.buf.len() == self.cap
    }

    /// The fixed capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Map a logical age onto a physical slot.
    #[inline]
    fn raw_idx(&self, age: usize) -> usize {
        (self.head + self.cap - 1 - age) % self.cap
    }

    /// Store an item, evicting the oldest once full. O(1).
    pub fn put(&mut self, item: T) {
        if self.buf.len() < self.cap {
            self.buf.push(item);
        } else {
            self.buf[self.head] = item;
        }
        self.head = (self.head + 1) % self.cap;
    }

    /// Access the item of the given logical age (`0 <= age < len`). O(1).
    #[inline]
    pub fn at(&self, age: usize) -> &T {
        assert!(age < self.buf.len(), "age {age} out of range");
        &self.buf[self.raw_idx(age)]
    }

    /// Mutable access to the item of the given logical age.
    #[inline]
    pub fn at_mut(&mut self, age: usize) -> &mut T {
        assert!(age < self.buf.len(), "age {age} out of range");
        let idx = self.raw_idx(age);
        &mut self.buf[idx]
    }

    /// The most recently put item.
    ///
    /// Panics if the buffer is empty.
    #[inline]
    pub fn top(&self) -> &T {
        self.at(0)
    }

    /// Insert an item one position newer than `at(age)`, so the new item
    /// becomes observable at age `age`. Items previously at smaller ages
    /// keep their ages; items at `age` and older shift one step older,
    /// evicting the oldest if full.
    ///
    /// `insert(0, item)` is equivalent to `put(item)`. O(len); intended
    /// for out-of-order corrections within the window, not steady-state
    /// use.
    pub fn insert(&mut self, age: usize, item: T) {
        assert!(age < self.buf.len(), "age {age} out of range");

        // One newer than `at(age)`: age 0 maps straight onto the head.
        let dest = (self.head + self.cap - age) % self.cap;

        if !self.full() {
            // Still linear in memory, so Vec::insert does the shifting.
            self.buf.insert(dest, item);
        } else if dest <= self.head {
            // Shift [dest, head) one slot up; the slot at head held the
            // oldest item and gets overwritten.
            self.buf[dest..=self.head].rotate_right(1);
            self.buf[dest] = item;
        } else {
            // Insertion point lies above the head: shift both wrapped
            // segments, carrying one item across the physical boundary.
            self.buf[0..=self.head].rotate_right(1);
            self.buf.swap(0, self.cap - 1);
            self.buf[dest..self.cap].rotate_right(1);
            self.buf[dest] = item;
        }
        self.head = (self.head + 1) % self.cap;
    }

    /// Cursor positioned at age 0 (the newest item).
    #[inline]
    pub fn iter(&self) -> RingIter<'_, T> {
        RingIter {
            ring: self,
            pos: 0,
            end: self.buf.len(),
        }
    }

    /// Cursor positioned at the given age.
    #[inline]
    pub fn iter_at(&self, age: usize) -> RingIter<'_, T> {
        RingIter {
            ring: self,
            pos: age,
            end: self.buf.len(),
        }
    }
}

impl<T> Default for RingBuf<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<T: fmt::Debug> fmt::Debug for RingBuf<T> {
    /// Shows the visible contents, newest first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// A restartable cursor over a [`RingBuf`], addressed by logical age.
///
/// `RingIter` is `Copy`: any position can be saved and revisited. As an
/// [`Iterator`] it yields items from its current age toward the oldest;
/// as a [`DoubleEndedIterator`] it can walk oldest-first. The
/// [`earlier`](RingIter::earlier) / [`later`](RingIter::later) /
/// [`offset`](RingIter::offset) methods give cursor arithmetic without
/// consuming the iteration state.
pub struct RingIter<'a, T> {
    ring: &'a RingBuf<T>,
    pos: usize,
    end: usize,
}

impl<'a, T> RingIter<'a, T> {
    /// The item under the cursor, or `None` past either end.
    #[inline]
    pub fn item(&self) -> Option<&'a T> {
        (self.pos < self.ring.len()).then(|| self.ring.at(self.pos))
    }

    /// The logical age under the cursor.
    #[inline]
    pub fn age(&self) -> usize {
        self.pos
    }

    /// Cursor moved one step toward the oldest item.
    #[inline]
    pub fn earlier(self) -> Self {
        Self {
            pos: self.pos + 1,
            ..self
        }
    }

    /// Cursor moved one step toward the newest item.
    ///
    /// Panics in debug builds if already at age 0.
    #[inline]
    pub fn later(self) -> Self {
        debug_assert!(self.pos > 0, "already at the newest item");
        Self {
            pos: self.pos - 1,
            ..self
        }
    }

    /// Cursor moved by a signed number of ages (positive = older).
    #[inline]
    pub fn offset(self, n: isize) -> Self {
        let pos = self.pos as isize + n;
        debug_assert!(pos >= 0, "cursor offset past the newest item");
        Self {
            pos: pos as usize,
            ..self
        }
    }
}

impl<'a, T> Clone for RingIter<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for RingIter<'a, T> {}

impl<'a, T> Iterator for RingIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.pos >= self.end {
            return None;
        }
        let item = self.ring.at(self.pos);
        self.pos += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.end.saturating_sub(self.pos);
        (n, Some(n))
    }
}

impl<'a, T> DoubleEndedIterator for RingIter<'a, T> {
    fn next_back(&mut self) -> Option<&'a T> {
        if self.pos >= self.end {
            return None;
        }
        self.end -= 1;
        Some(self.ring.at(self.end))
    }
}

impl<'a, T> ExactSizeIterator for RingIter<'a, T> {}

impl<'a, T> IntoIterator for &'a RingBuf<T> {
    type Item = &'a T;
    type IntoIter = RingIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
