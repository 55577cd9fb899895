//! # Bounded Event Stream
//!
//! Append-only, multi-reader sequence with a hard cap on retained items.
//!
//! ## Layout
//!
//! ```text
//!   first                                             next
//!     │                                                 │
//!     ▼                                                 ▼
//!   ┌─────┬─────┐ ┌─────┬─────┐ ┌─────┬─────┐ ┌─────┬ ─ ─ ┐
//!   │  3  │  4  │ │  5  │  6  │ │  7  │  8  │ │  9  │
//!   └─────┴─────┘ └─────┴─────┘ └─────┴─────┘ └─────┴ ─ ─ ┘
//!      segment        segment       segment      segment
//! ```
//!
//! Items are addressed by a monotonic position. The oldest items are evicted
//! one at a time as new ones arrive; a segment is released once all of its
//! items are gone. At most `capacity` items are retained at any moment.
//!
//! ## Readers
//!
//! Readers hold a [`Cursor`] and never block writers. A cursor that fell
//! behind eviction resumes at the oldest retained item; the jump is visible
//! as `batch.start != cursor`. Blocking reads park on a [`Notify`] that is
//! armed before the emptiness check, so an append racing the check still
//! wakes the reader.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Notify;

/// Logical position in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cursor(pub u64);

impl Cursor {
    /// Position of the first item ever appended.
    pub const ORIGIN: Cursor = Cursor(0);

    #[must_use]
    pub fn position(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    /// Items in append order.
    pub items: Vec<T>,
    /// Position of the first item (or of `next` when empty).
    pub start: Cursor,
    /// Position to resume from.
    pub next: Cursor,
}

impl<T> Batch<T> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Items lost to eviction between `requested` and this batch.
    #[must_use]
    pub fn skipped(&self, requested: Cursor) -> u64 {
        self.start.0.saturating_sub(requested.0)
    }
}

struct Inner<T> {
    segments: VecDeque<VecDeque<T>>,
    /// Position of the oldest retained item.
    first: u64,
    /// Position the next appended item will take.
    next: u64,
    len: usize,
}

impl<T: Clone> Inner<T> {
    fn push(&mut self, item: T, segment_size: usize, capacity: usize) {
        match self.segments.back_mut() {
            Some(segment) if segment.len() < segment_size => segment.push_back(item),
            _ => {
                let mut segment = VecDeque::with_capacity(segment_size);
                segment.push_back(item);
                self.segments.push_back(segment);
            }
        }
        self.next += 1;
        self.len += 1;

        while self.len > capacity {
            self.evict_oldest();
        }
    }

    fn evict_oldest(&mut self) {
        let Some(front) = self.segments.front_mut() else {
            return;
        };
        if front.pop_front().is_some() {
            self.first += 1;
            self.len -= 1;
        }
        if front.is_empty() {
            self.segments.pop_front();
        }
    }

    fn read(&self, cursor: Cursor, limit: usize) -> Batch<T> {
        let start = cursor.0.clamp(self.first, self.next);
        let available = (self.next - start) as usize;
        let take = limit.min(available);

        let mut items = Vec::with_capacity(take);
        let mut skip = (start - self.first) as usize;
        for segment in &self.segments {
            if items.len() == take {
                break;
            }
            if skip >= segment.len() {
                skip -= segment.len();
                continue;
            }
            let want = take - items.len();
            items.extend(segment.iter().skip(skip).take(want).cloned());
            skip = 0;
        }

        Batch {
            start: Cursor(start),
            next: Cursor(start + items.len() as u64),
            items,
        }
    }
}

/// Bounded, segmented, multi-reader event stream.
pub struct BoundedEventStream<T> {
    inner: Mutex<Inner<T>>,
    notify: Notify,
    segment_size: usize,
    capacity: usize,
}

impl<T: Clone> BoundedEventStream<T> {
    /// Creates an empty stream.
    ///
    /// A zero `segment_size` is treated as one; `capacity` is rounded up to
    /// a whole, non-zero number of segments.
    #[must_use]
    pub fn new(segment_size: usize, capacity: usize) -> Self {
        let segment_size = segment_size.max(1);
        let segments = capacity.div_ceil(segment_size).max(1);
        Self {
            inner: Mutex::new(Inner {
                segments: VecDeque::with_capacity(segments + 1),
                first: 0,
                next: 0,
                len: 0,
            }),
            notify: Notify::new(),
            segment_size,
            capacity: segments * segment_size,
        }
    }

    /// Appends `items` as one contiguous run and returns the new head.
    ///
    /// Items beyond `capacity` in a single call evict earlier items of the
    /// same call, so only the last `capacity` survive. `items` is drained
    /// before the stream is locked.
    pub fn append<I>(&self, items: I) -> Cursor
    where
        I: IntoIterator<Item = T>,
    {
        let items: Vec<T> = items.into_iter().collect();
        let (head, added) = {
            let mut inner = self.inner.lock();
            let before = inner.next;
            for item in items {
                inner.push(item, self.segment_size, self.capacity);
            }
            (inner.next, inner.next - before)
        };

        if added > 0 {
            self.notify.notify_waiters();
        }
        Cursor(head)
    }

    /// Non-blocking read of up to `limit` items at or after `cursor`.
    #[must_use]
    pub fn read(&self, cursor: Cursor, limit: usize) -> Batch<T> {
        self.inner.lock().read(cursor, limit)
    }

    /// Like [`read`](Self::read), but waits for data when none is available.
    ///
    /// Returns as soon as at least one item can be returned, or with an empty
    /// batch once `cancel` resolves. A zero `limit` never waits.
    pub async fn read_blocking<F>(&self, cursor: Cursor, limit: usize, cancel: F) -> Batch<T>
    where
        F: Future,
    {
        tokio::pin!(cancel);
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let batch = self.read(cursor, limit);
            if !batch.is_empty() || limit == 0 {
                return batch;
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = &mut cancel => return batch,
            }
        }
    }

    /// [`read_blocking`](Self::read_blocking) bounded by `timeout`.
    pub async fn read_timeout(&self, cursor: Cursor, limit: usize, timeout: Duration) -> Batch<T> {
        self.read_blocking(cursor, limit, tokio::time::sleep(timeout))
            .await
    }
}

impl<T> BoundedEventStream<T> {
    /// Position of the oldest retained item.
    #[must_use]
    pub fn first(&self) -> Cursor {
        Cursor(self.inner.lock().first)
    }

    /// Position the next appended item will take. Readers starting here see
    /// only future items.
    #[must_use]
    pub fn tail(&self) -> Cursor {
        Cursor(self.inner.lock().next)
    }

    /// Number of retained items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Number of allocated segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.inner.lock().segments.len()
    }
}

impl<T> fmt::Debug for BoundedEventStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BoundedEventStream")
            .field("first", &inner.first)
            .field("next", &inner.next)
            .field("len", &inner.len)
            .field("segment_size", &self.segment_size)
            .field("capacity", &self.capacity)
            .finish()
    }
}
