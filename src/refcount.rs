//! Component I: reentrancy-safe reference counting and the optional
//! external mutex (spec.md §3, §5, §9).
//!
//! Design Notes §9 suggests replacing ad-hoc incref/decref with a
//! shared-ownership handle so "Free" becomes "last handle dropped". This
//! crate takes a lighter middle path: the refcount stays an explicit,
//! testable field (spec.md §8 property P1 asserts `ref_count == 0 ⇔ state ==
//! Free` directly), but every call site that may invoke into the
//! application or the message layer acquires a [`ReentrancyGuard`] instead
//! of hand-writing `incref`/`decref` pairs.
//!
//! The counter uses [`core::cell::Cell`] rather than requiring `&mut`
//! specifically so a guard can be held *across* a reentrant callback: if a
//! method holding a guard invokes the application, and the application
//! synchronously calls back into the client, the inner call takes its own
//! guard on the same [`RefCount`] without conflicting with the outer
//! borrow — `&mut RefCount` would make that second borrow a compile error,
//! which is exactly the shape spec.md §5 describes as a supported
//! suspension point.

use crate::limits::MAX_REF_COUNT;
use core::cell::Cell;

/// The reentrancy-safe counter itself. Not `Send`/`Sync`: the concurrency
/// model (spec.md §5) is single-threaded cooperative, so this is a plain
/// `Cell`, not an atomic — the optional external mutex ([`ExternalLock`]) is
/// the only concession to cross-thread callers, and it guards the update
/// engine specifically, not this counter.
#[derive(Debug, Default)]
pub struct RefCount(Cell<u8>);

impl RefCount {
    pub fn new() -> Self {
        Self(Cell::new(0))
    }

    pub fn get(&self) -> u8 {
        self.0.get()
    }

    pub fn is_zero(&self) -> bool {
        self.0.get() == 0
    }

    /// `pub(crate)` rather than private: [`crate::lifecycle`] calls this
    /// directly for the long-lived holds named in spec.md §3 (`Init`'s
    /// permanent +1), while [`ReentrancyGuard`] calls it for the transient
    /// holds taken around a single method's application callback. Both
    /// represent the same invariant — "something still needs this client
    /// alive" — so they share one counter.
    pub(crate) fn incref(&self) {
        let current = self.0.get();
        debug_assert!(current < MAX_REF_COUNT, "refcount overflow");
        self.0.set(current.saturating_add(1).min(MAX_REF_COUNT));
    }

    /// Returns `true` iff this decrement brought the count to zero.
    pub(crate) fn decref(&self) -> bool {
        let next = self.0.get().saturating_sub(1);
        self.0.set(next);
        next == 0
    }
}

/// RAII guard: increments on construction, decrements on drop. Any method
/// that may call out to the application's [`crate::events`] callbacks or to
/// the exchange adapter must hold one of these for its duration, so that a
/// callback which causes the last *other* reference to drop cannot free the
/// client out from under the current stack frame (spec.md §5: "incref →
/// work → (possibly invoke external callback) → decref").
pub struct ReentrancyGuard<'a> {
    count: &'a RefCount,
}

impl<'a> ReentrancyGuard<'a> {
    pub fn enter(count: &'a RefCount) -> Self {
        count.incref();
        Self { count }
    }

    /// Whether the count has reached zero *right now* — callers poll this
    /// immediately after the guard's scope ends (see
    /// [`crate::client::SubscriptionClient::handle_subscription_terminated`])
    /// rather than relying on a callback out of `Drop`, since Rust
    /// destructors cannot cleanly propagate a fallible follow-up action.
    pub fn would_free(&self) -> bool {
        self.count.get() == 1
    }
}

impl<'a> Drop for ReentrancyGuard<'a> {
    fn drop(&mut self) {
        self.count.decref();
    }
}

/// Optional external mutex protecting `SetUpdated`/`FlushUpdate` from
/// callers on a different thread than the client's execution context
/// (spec.md §5). Re-entrant-safe in the sense required by the spec: it is
/// never held across an application callback, only across the synchronous
/// update-store mutation itself.
pub trait ExternalLock: Send + Sync {
    fn lock(&self);
    fn unlock(&self);
}

/// No-op lock used when the embedder runs everything on a single thread and
/// has no cross-thread `SetUpdated` callers.
#[derive(Debug, Default)]
pub struct NoopLock;

impl ExternalLock for NoopLock {
    fn lock(&self) {}
    fn unlock(&self) {}
}

/// A lock built on [`spin::Mutex`] for embedders that do call
/// `SetUpdated`/`FlushUpdate` from another thread. `spin` is already part of
/// the dependency stack (used elsewhere for small, short-held critical
/// sections), so reusing it here avoids pulling in a second mutex
/// implementation for what is, per spec.md §5, meant to be an uncontended,
/// briefly-held lock.
///
/// The `lock`/`unlock` pair (rather than a scope guard) matches the spec's
/// `Lock()`/`Unlock()` binding-style API; the held guard is intentionally
/// forgotten and released later through `force_unlock`, since the caller's
/// critical section does not nest inside a single Rust scope here.
#[derive(Debug, Default)]
pub struct SpinLock(spin::Mutex<()>);

impl SpinLock {
    pub fn new() -> Self {
        Self(spin::Mutex::new(()))
    }
}

impl ExternalLock for SpinLock {
    fn lock(&self) {
        core::mem::forget(self.0.lock());
    }

    fn unlock(&self) {
        unsafe { self.0.force_unlock() };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_increments_and_decrements() {
        let count = RefCount::new();
        {
            let _g1 = ReentrancyGuard::enter(&count);
            assert_eq!(count.get(), 1);
        }
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn reentrant_guard_nests_via_shared_borrow() {
        let count = RefCount::new();
        let outer = ReentrancyGuard::enter(&count);
        assert_eq!(count.get(), 1);
        {
            // Simulates a synchronous re-entrant call made from inside an
            // application callback while `outer` is still held.
            let inner = ReentrancyGuard::enter(&count);
            assert_eq!(count.get(), 2);
            assert!(!inner.would_free());
        }
        assert_eq!(count.get(), 1);
        assert!(outer.would_free());
        drop(outer);
        assert!(count.is_zero());
    }
}
