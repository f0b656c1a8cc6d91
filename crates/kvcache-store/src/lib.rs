//! Bounded LRU key/value store.
//!
//! An arena-of-nodes representation: a `Vec<Option<Node>>` addressed by
//! `u32` index rather than a pointer-based intrusive list. All five
//! [`Storage`] operations are pure index manipulation; no node is ever
//! moved or reallocated once created.

mod inner;

use std::cell::RefCell;

use inner::Inner;
use parking_lot::Mutex;

/// Outcome of [`Storage::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    Rejected,
}

/// Outcome of [`Storage::put_if_absent`] and [`Storage::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalOutcome {
    Stored,
    NotStored,
}

/// Outcome of [`Storage::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Absent,
}

/// Five-operation key/value store contract.
///
/// Implementations never panic on ordinary input: failures are encoded in
/// the return value, and an operation either commits its full effect or
/// leaves the store unchanged.
pub trait Storage {
    fn put(&self, key: &[u8], value: &[u8]) -> PutOutcome;
    fn put_if_absent(&self, key: &[u8], value: &[u8]) -> ConditionalOutcome;
    fn set(&self, key: &[u8], value: &[u8]) -> ConditionalOutcome;
    fn delete(&self, key: &[u8]) -> DeleteOutcome;
    fn get(&self, key: &[u8]) -> Option<Box<[u8]>>;

    /// Lifecycle hook; no-op unless a backend needs warm-up or teardown work.
    fn start(&self) {}
    /// Lifecycle hook; no-op unless a backend needs warm-up or teardown work.
    fn stop(&self) {}
}

/// Unsynchronized store backend. Not `Sync`: the type system keeps it from
/// being shared across OS threads, for use under a single-threaded runtime
/// where no locking is needed.
pub struct SimpleLru {
    inner: RefCell<Inner>,
}

impl SimpleLru {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            inner: RefCell::new(Inner::new(max_bytes)),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn size_bytes(&self) -> usize {
        self.inner.borrow().size_bytes
    }
}

impl Storage for SimpleLru {
    fn put(&self, key: &[u8], value: &[u8]) -> PutOutcome {
        self.inner.borrow_mut().put(key, value)
    }

    fn put_if_absent(&self, key: &[u8], value: &[u8]) -> ConditionalOutcome {
        self.inner.borrow_mut().put_if_absent(key, value)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> ConditionalOutcome {
        self.inner.borrow_mut().set(key, value)
    }

    fn delete(&self, key: &[u8]) -> DeleteOutcome {
        self.inner.borrow_mut().delete(key)
    }

    fn get(&self, key: &[u8]) -> Option<Box<[u8]>> {
        self.inner.borrow_mut().get(key)
    }
}

// SAFETY net: SimpleLru intentionally stays !Sync via RefCell. We still
// want it usable from a single Tokio `current_thread` runtime behind an
// `Rc`, which only requires `'static`, so no unsafe impls are needed here.

/// Thread-safe store backend: the same [`Inner`] logic behind one
/// `parking_lot::Mutex` held for the entire operation, so every call is
/// linearizable with no finer-grained locking.
pub struct ThreadSafeLru {
    inner: Mutex<Inner>,
}

impl ThreadSafeLru {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::new(max_bytes)),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn size_bytes(&self) -> usize {
        self.inner.lock().size_bytes
    }
}

impl Storage for ThreadSafeLru {
    fn put(&self, key: &[u8], value: &[u8]) -> PutOutcome {
        self.inner.lock().put(key, value)
    }

    fn put_if_absent(&self, key: &[u8], value: &[u8]) -> ConditionalOutcome {
        self.inner.lock().put_if_absent(key, value)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> ConditionalOutcome {
        self.inner.lock().set(key, value)
    }

    fn delete(&self, key: &[u8]) -> DeleteOutcome {
        self.inner.lock().delete(key)
    }

    fn get(&self, key: &[u8]) -> Option<Box<[u8]>> {
        self.inner.lock().get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> &[u8] {
        s.as_bytes()
    }

    #[test]
    fn basic_put_get() {
        let s = SimpleLru::new(1024);
        assert_eq!(s.put(b("foo"), b("bar")), PutOutcome::Stored);
        assert_eq!(s.get(b("foo")).as_deref(), Some(b("bar")));
    }

    #[test]
    fn eviction_order_follows_recency() {
        // max_bytes 10, each entry 5 bytes: third insert forces an eviction
        // of whichever of the first two entries is least recently used.
        let s = SimpleLru::new(10);
        assert_eq!(s.put(b("aaa"), b("AA")), PutOutcome::Stored); // 5 bytes
        assert_eq!(s.put(b("bbb"), b("BB")), PutOutcome::Stored); // 5 bytes, total 10
        assert_eq!(s.get(b("aaa")).as_deref(), Some(b("AA"))); // promotes aaa
        assert_eq!(s.put(b("ccc"), b("CC")), PutOutcome::Stored); // evicts bbb
        assert_eq!(s.get(b("bbb")), None);
        assert_eq!(s.get(b("aaa")).as_deref(), Some(b("AA")));
        assert_eq!(s.get(b("ccc")).as_deref(), Some(b("CC")));
    }

    #[test]
    fn add_vs_replace() {
        let s = SimpleLru::new(1024);
        assert_eq!(s.put_if_absent(b("x"), b("1")), ConditionalOutcome::Stored);
        assert_eq!(
            s.put_if_absent(b("x"), b("2")),
            ConditionalOutcome::NotStored
        );
        assert_eq!(s.set(b("y"), b("1")), ConditionalOutcome::NotStored);
        assert_eq!(s.set(b("x"), b("9")), ConditionalOutcome::Stored);
        assert_eq!(s.get(b("x")).as_deref(), Some(b("9")));
    }

    #[test]
    fn oversize_rejected_without_mutation() {
        let s = SimpleLru::new(4);
        assert_eq!(s.put(b("bigkey"), b("X")), PutOutcome::Rejected);
        assert!(s.is_empty());
    }

    #[test]
    fn zero_capacity_rejects_everything() {
        let s = SimpleLru::new(0);
        assert_eq!(s.put(b(""), b("")), PutOutcome::Rejected);
        assert_eq!(s.put(b("a"), b("")), PutOutcome::Rejected);
        assert_eq!(s.get(b("a")), None);
        assert_eq!(s.delete(b("a")), DeleteOutcome::Absent);
    }

    #[test]
    fn delete_is_idempotent() {
        let s = SimpleLru::new(1024);
        s.put(b("k"), b("v"));
        assert_eq!(s.delete(b("k")), DeleteOutcome::Deleted);
        assert_eq!(s.delete(b("k")), DeleteOutcome::Absent);
        assert_eq!(s.get(b("k")), None);
    }

    #[test]
    fn update_to_identical_value_still_promotes() {
        let s = SimpleLru::new(10);
        s.put(b("a"), b("AA")); // 3
        s.put(b("b"), b("BB")); // 3, total 6
        s.put(b("a"), b("AA")); // identical value, re-promotes a
        s.put(b("c"), b("CCCC")); // 5, total would be 3+3+5=11 > 10, evicts b (LRU)
        assert_eq!(s.get(b("b")), None);
        assert_eq!(s.get(b("a")).as_deref(), Some(b("AA")));
    }

    #[test]
    fn thread_safe_variant_same_semantics() {
        let s = ThreadSafeLru::new(6);
        assert_eq!(s.put(b("a"), b("AA")), PutOutcome::Stored); // 3
        assert_eq!(s.put(b("b"), b("BB")), PutOutcome::Stored); // 3, total 6
        assert_eq!(s.get(b("a")).as_deref(), Some(b("AA"))); // promotes a
        assert_eq!(s.put(b("c"), b("CC")), PutOutcome::Stored); // evicts b (LRU)
        assert_eq!(s.get(b("b")), None);
        assert_eq!(s.get(b("a")).as_deref(), Some(b("AA")));
    }
}
