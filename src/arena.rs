//! Pooled buffer arena.
//!
//! A thread-safe pool of reusable, growable byte buffers. Send and receive
//! paths borrow scratch storage from the arena instead of allocating and
//! discarding a buffer per message.
//!
//! # Lifecycle
//!
//! ```text
//! acquire() ──► PooledBuffer (len 0) ──► write / grow ──► drop or release()
//!     ▲                                                          │
//!     └──────────── free list (len reset, capacity kept) ◄───────┘
//! ```
//!
//! Capacity only grows across reuse cycles. A released buffer goes back to
//! the free list exactly once, because release is tied to the buffer's
//! ownership: [`BufferArena::release`] consumes it and dropping it performs
//! the same return.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::mem;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::trace;

// ============================================================================
// Constants
// ============================================================================

/// Capacity of freshly allocated buffers (16 KiB).
pub const DEFAULT_INITIAL_CAPACITY: usize = 16 * 1024;

/// Maximum idle buffers retained by the free list.
pub const DEFAULT_MAX_IDLE: usize = 1024;

/// Process-wide arena returned by [`BufferArena::shared`].
static SHARED_ARENA: OnceLock<BufferArena> = OnceLock::new();

// ============================================================================
// ArenaConfig
// ============================================================================

/// Arena sizing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Capacity reserved for buffers allocated on a pool miss.
    pub initial_capacity: usize,

    /// Idle buffers kept for reuse. Releases beyond this are freed.
    pub max_idle: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ArenaConfig {
    /// Creates the default configuration.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_idle: DEFAULT_MAX_IDLE,
        }
    }

    /// Sets the capacity of freshly allocated buffers.
    #[inline]
    #[must_use]
    pub const fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Sets the number of idle buffers retained.
    #[inline]
    #[must_use]
    pub const fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }
}

// ============================================================================
// ArenaStats
// ============================================================================

/// Point-in-time arena accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Buffers allocated on pool misses since the arena was created.
    pub created: usize,
    /// Buffers sitting in the free list.
    pub idle: usize,
    /// Buffers currently owned by callers.
    pub leased: usize,
}

// ============================================================================
// BufferArena
// ============================================================================

/// Shared pool of reusable byte buffers.
///
/// Cloning is cheap and yields a handle to the same pool.
///
/// # Thread Safety
///
/// `BufferArena` is `Send + Sync`. The free list is lock-protected, so
/// concurrent [`acquire`](Self::acquire) and release from many channels is
/// safe.
#[derive(Clone)]
pub struct BufferArena {
    inner: Arc<ArenaInner>,
}

struct ArenaInner {
    free: Mutex<Vec<Vec<u8>>>,
    config: ArenaConfig,
    created: AtomicUsize,
    leased: AtomicUsize,
}

impl Default for BufferArena {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BufferArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferArena")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl BufferArena {
    /// Creates an empty arena with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ArenaConfig::default())
    }

    /// Creates an empty arena with the given configuration.
    #[must_use]
    pub fn with_config(config: ArenaConfig) -> Self {
        Self {
            inner: Arc::new(ArenaInner {
                free: Mutex::new(Vec::new()),
                config,
                created: AtomicUsize::new(0),
                leased: AtomicUsize::new(0),
            }),
        }
    }

    /// Returns the process-wide arena, creating it on first use.
    #[must_use]
    pub fn shared() -> Self {
        SHARED_ARENA.get_or_init(Self::new).clone()
    }

    /// Returns the arena configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> ArenaConfig {
        self.inner.config
    }

    /// Takes a buffer from the free list, or allocates one on a miss.
    ///
    /// The returned buffer has length 0. Never blocks on I/O and never fails.
    pub fn acquire(&self) -> PooledBuffer {
        let reused = self.inner.free.lock().pop();

        let storage = match reused {
            Some(storage) => storage,
            None => {
                self.inner.created.fetch_add(1, Ordering::Relaxed);
                trace!(
                    capacity = self.inner.config.initial_capacity,
                    "Arena miss, allocating buffer"
                );
                Vec::with_capacity(self.inner.config.initial_capacity)
            }
        };

        self.inner.leased.fetch_add(1, Ordering::Relaxed);

        PooledBuffer {
            storage,
            arena: Arc::clone(&self.inner),
        }
    }

    /// Returns a buffer to the arena it was acquired from.
    ///
    /// Equivalent to dropping it.
    #[inline]
    pub fn release(&self, buffer: PooledBuffer) {
        drop(buffer);
    }

    /// Returns current accounting.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            created: self.inner.created.load(Ordering::Relaxed),
            idle: self.inner.free.lock().len(),
            leased: self.inner.leased.load(Ordering::Relaxed),
        }
    }

    /// Drops every idle buffer and returns how many were freed.
    ///
    /// Leased buffers are unaffected and rejoin the (now empty) free list
    /// when released.
    pub fn clear(&self) -> usize {
        let drained = mem::take(&mut *self.inner.free.lock());
        drained.len()
    }
}

impl ArenaInner {
    fn give_back(&self, mut storage: Vec<u8>) {
        storage.clear();
        self.leased.fetch_sub(1, Ordering::Relaxed);

        let mut free = self.free.lock();
        if free.len() < self.config.max_idle {
            free.push(storage);
        }
    }
}

// ============================================================================
// PooledBuffer
// ============================================================================

/// A byte buffer on loan from a [`BufferArena`].
///
/// Dereferences to the written bytes (`len`, not capacity). Dropping the
/// buffer resets its length and returns it to its arena.
pub struct PooledBuffer {
    storage: Vec<u8>,
    arena: Arc<ArenaInner>,
}

impl PooledBuffer {
    /// Returns the logical length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Returns `true` if no bytes have been written.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Returns the allocated capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    /// Returns the written bytes.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.storage
    }

    /// Appends bytes, growing capacity as needed.
    #[inline]
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.storage.extend_from_slice(bytes);
    }

    /// Reserves room for at least `additional` more bytes.
    #[inline]
    pub fn reserve(&mut self, additional: usize) {
        self.storage.reserve(additional);
    }

    /// Resets the length to 0, keeping capacity.
    #[inline]
    pub fn clear(&mut self) {
        self.storage.clear();
    }

    /// Gives transports append access to the backing storage.
    #[inline]
    pub(crate) fn as_mut_vec(&mut self) -> &mut Vec<u8> {
        &mut self.storage
    }
}

impl Deref for PooledBuffer {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.storage
    }
}

impl AsRef<[u8]> for PooledBuffer {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.storage
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.storage.len())
            .field("capacity", &self.storage.capacity())
            .finish()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.arena.give_back(mem::take(&mut self.storage));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;

    #[test]
    fn test_acquire_starts_empty_with_initial_capacity() {
        let arena = BufferArena::with_config(ArenaConfig::new().with_initial_capacity(64));
        let buf = arena.acquire();

        assert!(buf.is_empty());
        assert!(buf.capacity() >= 64);
        assert_eq!(
            arena.stats(),
            ArenaStats {
                created: 1,
                idle: 0,
                leased: 1
            }
        );
    }

    #[test]
    fn test_release_resets_length_and_keeps_capacity() {
        let arena = BufferArena::with_config(ArenaConfig::new().with_initial_capacity(8));

        let mut buf = arena.acquire();
        buf.extend_from_slice(&[7u8; 1000]);
        let grown = buf.capacity();
        arena.release(buf);

        let buf = arena.acquire();
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.capacity(), grown);
        assert_eq!(arena.stats().created, 1);
    }

    #[test]
    fn test_drop_returns_buffer() {
        let arena = BufferArena::new();
        {
            let mut buf = arena.acquire();
            buf.extend_from_slice(b"scratch");
        }

        let stats = arena.stats();
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.leased, 0);
    }

    #[test]
    fn test_live_buffers_never_share_storage() {
        let arena = BufferArena::new();
        let mut a = arena.acquire();
        let mut b = arena.acquire();

        a.extend_from_slice(b"aaaa");
        b.extend_from_slice(b"bb");

        assert_eq!(a.as_slice(), b"aaaa");
        assert_eq!(b.as_slice(), b"bb");
        assert_eq!(arena.stats().created, 2);
    }

    #[test]
    fn test_max_idle_bounds_free_list() {
        let arena = BufferArena::with_config(ArenaConfig::new().with_max_idle(2));
        let buffers: Vec<_> = (0..5).map(|_| arena.acquire()).collect();
        drop(buffers);

        let stats = arena.stats();
        assert_eq!(stats.idle, 2);
        assert_eq!(stats.leased, 0);
    }

    #[test]
    fn test_clear_drops_idle_buffers() {
        let arena = BufferArena::new();
        drop((arena.acquire(), arena.acquire()));
        let leased = arena.acquire();

        assert_eq!(arena.clear(), 1);
        assert_eq!(arena.stats().idle, 0);

        drop(leased);
        assert_eq!(arena.stats().idle, 1);
    }

    #[test]
    fn test_shared_is_one_pool() {
        let a = BufferArena::shared();
        let b = BufferArena::shared();
        assert!(Arc::ptr_eq(&a.inner, &b.inner));
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let arena = BufferArena::with_config(ArenaConfig::new().with_initial_capacity(16));

        let workers: Vec<_> = (0..8u8)
            .map(|id| {
                let arena = arena.clone();
                thread::spawn(move || {
                    for round in 0..500usize {
                        let mut buf = arena.acquire();
                        assert!(buf.is_empty());
                        buf.extend_from_slice(&vec![id; round % 64 + 1]);
                        assert!(buf.iter().all(|&b| b == id));
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().expect("worker panicked");
        }

        let stats = arena.stats();
        assert_eq!(stats.leased, 0);
        assert!(stats.created <= 8);
        assert_eq!(stats.idle, stats.created);
    }
}
