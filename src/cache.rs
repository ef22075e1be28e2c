//! Thread-tagged row cursor cache.
//!
//! Each thread hashes its tag into a small table of slots. A slot holds at
//! most one cursor, tagged with the thread that stored it. Fetching takes the
//! cursor out of its slot so no other thread can reach it while it is in
//! use; dropping the [`CachedRow`] guard puts it back, unless the buffer
//! was disposed in the meantime. Colliding threads overwrite each other's
//! slot. That only costs a rebuilt cursor, never a wrong row.
//!
//! Slots are mutexes taken with `try_lock` rather than atomic pointer
//! swaps: a contended slot counts as a miss, so no fetch ever waits.

use core::fmt;
use core::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use crate::buffer::BufferCore;
use crate::error::Result;
use crate::row::RowCursor;

static NEXT_THREAD_TAG: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static THREAD_TAG: usize = NEXT_THREAD_TAG.fetch_add(1, Ordering::Relaxed);
}

fn thread_tag() -> usize {
    THREAD_TAG.with(|tag| *tag)
}

struct Slot {
    thread: usize,
    cursor: RowCursor,
}

pub(crate) struct RowCache {
    slots: Box<[Mutex<Option<Slot>>]>,
}

/// Non-blocking slot lock. A poisoned slot still holds a usable cursor.
fn try_lock(slot: &Mutex<Option<Slot>>) -> Option<MutexGuard<'_, Option<Slot>>> {
    match slot.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

impl RowCache {
    /// `max(8, next_pow2(2 * cores))` slots.
    pub(crate) fn new() -> Self {
        let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
        Self::with_slots((2 * cores).next_power_of_two().max(8))
    }

    pub(crate) fn with_slots(len: usize) -> Self {
        debug_assert!(len.is_power_of_two());
        Self {
            slots: (0..len).map(|_| Mutex::new(None)).collect(),
        }
    }

    #[inline]
    fn slot_of(&self, thread: usize) -> usize {
        thread & (self.slots.len() - 1)
    }

    /// Cursor for row `y` on the calling thread. `y` must already be valid.
    pub(crate) fn get<'a>(&'a self, core: &Arc<BufferCore>, y: usize) -> Result<CachedRow<'a>> {
        let thread = thread_tag();
        let slot = self.slot_of(thread);
        let cached = try_lock(&self.slots[slot])
            .and_then(|mut guard| guard.take_if(|s| s.thread == thread))
            .map(|s| s.cursor);
        let cursor = match cached {
            Some(mut cursor) => {
                if cursor.index() != y {
                    cursor.move_to_row(y)?;
                }
                cursor
            }
            None => {
                log::trace!("row cache miss on slot {slot} for row {y}");
                RowCursor::new(Arc::clone(core), y)
            }
        };
        Ok(CachedRow {
            cache: self,
            slot,
            thread,
            cursor: Some(cursor),
        })
    }

    /// Drop every cached cursor.
    pub(crate) fn clear(&self) {
        for slot in self.slots.iter() {
            let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
            *guard = None;
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub(crate) fn occupied(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| try_lock(slot).is_some_and(|guard| guard.is_some()))
            .count()
    }
}

impl fmt::Debug for RowCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowCache")
            .field("slots", &self.slots.len())
            .finish()
    }
}

/// A row cursor borrowed from a buffer's thread cache.
///
/// Dereferences to [`RowCursor`]. Dropping it returns the cursor to the
/// calling thread's slot.
pub struct CachedRow<'a> {
    cache: &'a RowCache,
    slot: usize,
    thread: usize,
    cursor: Option<RowCursor>,
}

impl Deref for CachedRow<'_> {
    type Target = RowCursor;

    fn deref(&self) -> &RowCursor {
        // Only `Drop` empties the option.
        match &self.cursor {
            Some(cursor) => cursor,
            None => unreachable!("cached row used after release"),
        }
    }
}

impl DerefMut for CachedRow<'_> {
    fn deref_mut(&mut self) -> &mut RowCursor {
        match &mut self.cursor {
            Some(cursor) => cursor,
            None => unreachable!("cached row used after release"),
        }
    }
}

impl Drop for CachedRow<'_> {
    fn drop(&mut self) {
        let Some(cursor) = self.cursor.take() else {
            return;
        };
        // Checked under the slot lock; dispose marks the buffer before it
        // clears the slots.
        if let Some(mut guard) = try_lock(&self.cache.slots[self.slot])
            && !cursor.is_disposed()
        {
            *guard = Some(Slot {
                thread: self.thread,
                cursor,
            });
        }
    }
}

impl fmt::Debug for CachedRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CachedRow").field(&self.cursor).finish()
    }
}
