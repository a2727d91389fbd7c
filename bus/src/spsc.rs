//! Bounded single-producer single-consumer ring

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A monotonically increasing position counter, alone on its cache line so
/// the producer and consumer never false-share.
#[repr(C, align(64))]
struct Cursor {
    pos: AtomicU64,
}

impl Cursor {
    const fn new() -> Self {
        Self {
            pos: AtomicU64::new(0),
        }
    }
}

/// Shared ring state. Positions increase without wrapping; the slot for a
/// position is `pos & mask`. Capacity is a power of two.
struct Inner<T> {
    write: Cursor,
    read: Cursor,
    mask: u64,
    capacity: u64,
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// One producer and one consumer each touch disjoint slots between the two
// cursors, so moving T across threads is the only requirement.
unsafe impl<T: Send> Send for Inner<T> {}
unsafe impl<T: Send> Sync for Inner<T> {}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        // Both handles are gone; drop whatever is still queued.
        let read = *self.read.pos.get_mut();
        let write = *self.write.pos.get_mut();
        for pos in read..write {
            let slot = (pos & self.mask) as usize;
            unsafe { (*self.buffer[slot].get()).assume_init_drop() };
        }
    }
}

/// Create a bounded SPSC queue. `capacity` is rounded up to the next power
/// of two (minimum 1).
#[must_use]
pub fn channel<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    let capacity = capacity.max(1).next_power_of_two();
    let buffer = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect::<Vec<_>>()
        .into_boxed_slice();

    let inner = Arc::new(Inner {
        write: Cursor::new(),
        read: Cursor::new(),
        mask: (capacity - 1) as u64,
        capacity: capacity as u64,
        buffer,
    });

    (
        Producer {
            inner: Arc::clone(&inner),
        },
        Consumer { inner },
    )
}

/// Producing half of the queue. Not cloneable: exactly one producer exists,
/// which is what makes the relaxed write-position load sound.
pub struct Producer<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Producer<T> {
    /// Attempt to push a value. Returns it back if the queue is full.
    ///
    /// # Errors
    /// `Err(value)` when the ring has no free slot.
    #[inline]
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let write = self.inner.write.pos.load(Ordering::Relaxed);
        let read = self.inner.read.pos.load(Ordering::Acquire);
        if write - read >= self.inner.capacity {
            return Err(value);
        }

        let slot = (write & self.inner.mask) as usize;
        unsafe { (*self.inner.buffer[slot].get()).write(value) };
        self.inner.write.pos.store(write + 1, Ordering::Release);
        Ok(())
    }

    /// Number of elements currently queued
    #[must_use]
    pub fn len(&self) -> usize {
        len(&self.inner)
    }

    /// Whether the queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the queue is full
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() as u64 >= self.inner.capacity
    }

    /// Fixed capacity of the ring
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity as usize
    }
}

/// Consuming half of the queue. Not cloneable.
pub struct Consumer<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Consumer<T> {
    /// Attempt to pop the oldest value
    #[inline]
    pub fn try_pop(&self) -> Option<T> {
        let read = self.inner.read.pos.load(Ordering::Relaxed);
        let write = self.inner.write.pos.load(Ordering::Acquire);
        if read >= write {
            return None;
        }

        let slot = (read & self.inner.mask) as usize;
        let value = unsafe { (*self.inner.buffer[slot].get()).assume_init_read() };
        self.inner.read.pos.store(read + 1, Ordering::Release);
        Some(value)
    }

    /// Number of elements currently queued
    #[must_use]
    pub fn len(&self) -> usize {
        len(&self.inner)
    }

    /// Whether the queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fixed capacity of the ring
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity as usize
    }
}

fn len<T>(inner: &Inner<T>) -> usize {
    let write = inner.write.pos.load(Ordering::Acquire);
    let read = inner.read.pos.load(Ordering::Acquire);
    write.saturating_sub(read) as usize
}
