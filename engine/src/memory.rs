//! Typed lock-free object pool for zero-allocation report handling
//!
//! Slots live in ~4 KiB blocks; the block table is append-only so slot
//! pointers stay stable for the pool's lifetime. The free list is a
//! lock-free LIFO threaded through the slots, tagged with a generation
//! counter in the upper 32 bits to prevent ABA on concurrent pops. When
//! every block is full the pool falls back to the system allocator;
//! callers cannot tell the two apart.

use parking_lot::Mutex;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, AtomicU32, AtomicU64, AtomicUsize, Ordering};

/// Sentinel index meaning "no slot"
const NIL: u32 = u32::MAX;

/// Upper bound on pool growth; beyond this the system allocator takes over
const MAX_BLOCKS: usize = 64;

/// Target size of one slot block in bytes
const BLOCK_BYTES: usize = 4096;

#[inline]
const fn pack(generation: u32, index: u32) -> u64 {
    ((generation as u64) << 32) | index as u64
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
const fn unpack_generation(tagged: u64) -> u32 {
    (tagged >> 32) as u32
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
const fn unpack_index(tagged: u64) -> u32 {
    tagged as u32
}

struct Slot<T> {
    next: AtomicU32,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Free-list allocator for one element type.
///
/// `create` never fails: the pool grows a block at a time and spills to the
/// heap once `MAX_BLOCKS` are live. `allocate`/`deallocate` (via
/// [`PoolBox`]) may run on any thread.
pub struct ObjectPool<T> {
    blocks: [AtomicPtr<Slot<T>>; MAX_BLOCKS],
    block_count: AtomicUsize,
    slots_per_block: usize,
    free_head: AtomicU64,
    grow_lock: Mutex<()>,
    allocated: AtomicUsize,
}

unsafe impl<T: Send> Send for ObjectPool<T> {}
unsafe impl<T: Send> Sync for ObjectPool<T> {}

impl<T> ObjectPool<T> {
    /// Create an empty pool; the first block is allocated on first use
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocks: [const { AtomicPtr::new(std::ptr::null_mut()) }; MAX_BLOCKS],
            block_count: AtomicUsize::new(0),
            slots_per_block: (BLOCK_BYTES / std::mem::size_of::<Slot<T>>()).max(1),
            free_head: AtomicU64::new(pack(0, NIL)),
            grow_lock: Mutex::new(()),
            allocated: AtomicUsize::new(0),
        }
    }

    /// Move `value` into a pool slot and return an owning handle
    pub fn create(&self, value: T) -> PoolBox<'_, T> {
        self.allocated.fetch_add(1, Ordering::Relaxed);

        let index = loop {
            if let Some(index) = self.pop_free() {
                break Some(index);
            }
            if !self.grow() {
                break None;
            }
        };

        match index {
            Some(index) => {
                let slot = self.slot_ptr(index);
                // SAFETY: a popped slot is exclusively ours until released.
                let ptr = unsafe {
                    (*(*slot).value.get()).write(value);
                    NonNull::new_unchecked((*(*slot).value.get()).as_mut_ptr())
                };
                PoolBox {
                    ptr,
                    index,
                    pool: self,
                }
            }
            None => {
                // Block table exhausted: system allocator fallback.
                // SAFETY: Box::into_raw never returns null.
                let ptr = unsafe { NonNull::new_unchecked(Box::into_raw(Box::new(value))) };
                PoolBox {
                    ptr,
                    index: NIL,
                    pool: self,
                }
            }
        }
    }

    /// Number of live objects handed out (pool slots plus heap fallbacks)
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Total slots across all allocated blocks
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.block_count.load(Ordering::Acquire) * self.slots_per_block
    }

    fn slot_ptr(&self, index: u32) -> *mut Slot<T> {
        let block = index as usize / self.slots_per_block;
        let slot = index as usize % self.slots_per_block;
        // SAFETY: indexes on the free list only ever refer to published blocks.
        unsafe { self.blocks[block].load(Ordering::Acquire).add(slot) }
    }

    fn pop_free(&self) -> Option<u32> {
        loop {
            let head = self.free_head.load(Ordering::Acquire);
            let index = unpack_index(head);
            if index == NIL {
                return None;
            }

            // SAFETY: a listed index refers to a live, published slot.
            let next = unsafe { (*self.slot_ptr(index)).next.load(Ordering::Acquire) };
            let new_head = pack(unpack_generation(head).wrapping_add(1), next);
            if self
                .free_head
                .compare_exchange_weak(head, new_head, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(index);
            }
        }
    }

    fn push_free(&self, index: u32) {
        let slot = self.slot_ptr(index);
        loop {
            let head = self.free_head.load(Ordering::Acquire);
            // SAFETY: the slot is ours until the CAS below publishes it.
            unsafe { (*slot).next.store(unpack_index(head), Ordering::Release) };
            let new_head = pack(unpack_generation(head).wrapping_add(1), index);
            if self
                .free_head
                .compare_exchange_weak(head, new_head, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
        }
    }

    /// Allocate one more block and thread its slots onto the free list.
    /// Returns false once `MAX_BLOCKS` blocks exist.
    #[allow(clippy::cast_possible_truncation)]
    fn grow(&self) -> bool {
        let _guard = self.grow_lock.lock();
        let count = self.block_count.load(Ordering::Acquire);
        if count >= MAX_BLOCKS {
            return false;
        }

        let block: Box<[Slot<T>]> = (0..self.slots_per_block)
            .map(|_| Slot {
                next: AtomicU32::new(NIL),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();
        let base = Box::into_raw(block).cast::<Slot<T>>();

        self.blocks[count].store(base, Ordering::Release);
        self.block_count.store(count + 1, Ordering::Release);

        let first = (count * self.slots_per_block) as u32;
        for offset in 0..self.slots_per_block as u32 {
            self.push_free(first + offset);
        }
        true
    }
}

impl<T> Default for ObjectPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for ObjectPool<T> {
    fn drop(&mut self) {
        // Every PoolBox borrows the pool, so no objects are live here; only
        // the raw block storage needs freeing.
        let count = *self.block_count.get_mut();
        for block in &mut self.blocks[..count] {
            let base = *block.get_mut();
            let slice = std::ptr::slice_from_raw_parts_mut(base, self.slots_per_block);
            // SAFETY: created by Box::into_raw in grow() with this length.
            drop(unsafe { Box::from_raw(slice) });
        }
    }
}

/// Owning handle to a pool-allocated object; returns the slot on drop.
pub struct PoolBox<'a, T> {
    ptr: NonNull<T>,
    index: u32,
    pool: &'a ObjectPool<T>,
}

unsafe impl<T: Send> Send for PoolBox<'_, T> {}

impl<T> std::ops::Deref for PoolBox<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: ptr refers to an initialized value owned by this handle.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> std::ops::DerefMut for PoolBox<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: ptr refers to an initialized value owned by this handle.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T> Drop for PoolBox<'_, T> {
    fn drop(&mut self) {
        if self.index == NIL {
            // SAFETY: heap fallback created by Box::into_raw in create().
            drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
        } else {
            // SAFETY: the slot value is initialized and exclusively ours.
            unsafe { std::ptr::drop_in_place(self.ptr.as_ptr()) };
            self.pool.push_free(self.index);
        }
        self.pool.allocated.fetch_sub(1, Ordering::Relaxed);
    }
}
