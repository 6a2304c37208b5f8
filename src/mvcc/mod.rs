//! # Version Broker
//!
//! Multi-version concurrency for the graph store. Readers capture the
//! latest published version and see a stable snapshot for their whole
//! query; a writer works under `latest + 1` and publishes by advancing
//! the latest version. Objects superseded by a mutation (for example a
//! flushed matrix replaced by a new flush) are registered with the
//! writer's previous version so concurrent readers keep observing a
//! consistent snapshot; they are dropped exactly once, when the last
//! reference to that version goes away.
//!
//! Each thread carries its active version in thread-local storage, so a
//! reader or writer never has to thread the version through call chains.
//!
//! ## Reference counting
//!
//! Every version starts with one reference standing for "this is the
//! latest published version". Publishing version `v + 1` releases that
//! reference on `v`; readers add and release their own. A version is
//! finalized when its count reaches zero, which can only happen after it
//! has been superseded.

use crate::error::{GraphError, GraphResult};
use parking_lot::Mutex;
use std::any::Any;
use std::cell::Cell;

/// Version number; `NO_VERSION` marks a thread with no active version.
pub type Version = i64;

const NO_VERSION: Version = -1;

thread_local! {
    static TLS_VERSION: Cell<Version> = const { Cell::new(NO_VERSION) };
}

/// An object owned by a version, dropped at finalization.
type OwnedObj = Box<dyn Any + Send>;

struct VersionSlot {
    v: Version,
    ref_count: u64,
    objects: Vec<OwnedObj>,
}

struct BrokerInner {
    latest: Version,
    active: Vec<VersionSlot>,
}

impl BrokerInner {
    fn slot_mut(&mut self, v: Version) -> GraphResult<&mut VersionSlot> {
        self.active
            .iter_mut()
            .find(|s| s.v == v)
            .ok_or(GraphError::VersionConflict(v))
    }

    /// Decrement `v`'s count; return its objects when it finalized.
    fn release(&mut self, v: Version) -> GraphResult<Vec<OwnedObj>> {
        let latest = self.latest;
        let slot = self.slot_mut(v)?;
        debug_assert!(slot.ref_count > 0);
        slot.ref_count -= 1;

        if slot.ref_count == 0 && v < latest {
            let idx = self
                .active
                .iter()
                .position(|s| s.v == v)
                .ok_or(GraphError::VersionConflict(v))?;
            let slot = self.active.swap_remove(idx);
            return Ok(slot.objects);
        }
        Ok(Vec::new())
    }
}

/// Process-wide-per-graph version broker.
///
/// The active-version list is small, so a single mutex guards it; owned
/// objects are dropped outside the lock.
pub struct VersionBroker {
    inner: Mutex<BrokerInner>,
}

impl Default for VersionBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionBroker {
    pub fn new() -> Self {
        VersionBroker {
            inner: Mutex::new(BrokerInner {
                latest: 0,
                active: vec![VersionSlot {
                    v: 0,
                    ref_count: 1,
                    objects: Vec::new(),
                }],
            }),
        }
    }

    /// Latest published version.
    pub fn latest_version(&self) -> Version {
        self.inner.lock().latest
    }

    /// The calling thread's active version, if any.
    pub fn current_version() -> Option<Version> {
        let v = TLS_VERSION.with(Cell::get);
        (v != NO_VERSION).then_some(v)
    }

    /// Capture the latest version for a READ query: bumps its reference
    /// count and records it in the caller's thread-local slot.
    pub fn get_read_version(&self) -> Version {
        let mut inner = self.inner.lock();
        let v = inner.latest;
        if let Ok(slot) = inner.slot_mut(v) {
            slot.ref_count += 1;
        }
        drop(inner);

        TLS_VERSION.with(|t| t.set(v));
        v
    }

    /// Counterpart to [`VersionBroker::get_read_version`]; finalizes the
    /// version when this was the last reference. Owned objects are
    /// dropped outside the broker lock, on the releasing thread.
    pub fn return_read_version(&self) -> GraphResult<()> {
        let v = TLS_VERSION.with(Cell::get);
        if v == NO_VERSION {
            return Err(GraphError::invalid("thread holds no read version"));
        }
        TLS_VERSION.with(|t| t.set(NO_VERSION));

        let finalized = self.inner.lock().release(v)?;
        drop(finalized);
        Ok(())
    }

    /// Open version `latest + 1` for a WRITE query.
    pub fn get_write_version(&self) -> Version {
        let mut inner = self.inner.lock();
        let v = inner.latest + 1;
        inner.active.push(VersionSlot {
            v,
            ref_count: 1,
            objects: Vec::new(),
        });
        drop(inner);

        TLS_VERSION.with(|t| t.set(v));
        v
    }

    /// Publish the calling writer's version: advances the latest version
    /// and releases the previous version's "latest" reference.
    pub fn return_write_version(&self) -> GraphResult<()> {
        let v = TLS_VERSION.with(Cell::get);
        if v == NO_VERSION {
            return Err(GraphError::invalid("thread holds no write version"));
        }
        TLS_VERSION.with(|t| t.set(NO_VERSION));

        let mut inner = self.inner.lock();
        debug_assert_eq!(v, inner.latest + 1);
        inner.latest = v;
        let finalized = inner.release(v - 1)?;
        drop(inner);

        drop(finalized);
        Ok(())
    }

    /// Register an object with the calling thread's active version; the
    /// object is dropped when that version finalizes.
    pub fn register_object(&self, obj: OwnedObj) -> GraphResult<()> {
        let v = TLS_VERSION.with(Cell::get);
        if v == NO_VERSION {
            return Err(GraphError::invalid("thread holds no active version"));
        }
        self.register_object_at(v, obj)
    }

    /// Register an object under an explicit version. Used where the
    /// mutating work has been fanned out to worker threads that do not
    /// carry the owning query's version in their thread-local slot.
    pub fn register_object_at(&self, v: Version, obj: OwnedObj) -> GraphResult<()> {
        let mut inner = self.inner.lock();
        inner.slot_mut(v)?.objects.push(obj);
        Ok(())
    }

    /// Verify version `v` is still retained; readers resuming work after
    /// a pause use this to detect stale snapshots.
    pub fn pin_check(&self, v: Version) -> GraphResult<()> {
        let inner = self.inner.lock();
        if inner.active.iter().any(|s| s.v == v) {
            Ok(())
        } else {
            Err(GraphError::VersionConflict(v))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct DropProbe(Arc<AtomicUsize>);

    impl Drop for DropProbe {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_reader_sees_latest() {
        let vb = VersionBroker::new();
        assert_eq!(vb.get_read_version(), 0);
        assert_eq!(VersionBroker::current_version(), Some(0));
        vb.return_read_version().unwrap();
        assert_eq!(VersionBroker::current_version(), None);
    }

    #[test]
    fn test_writer_publishes_next_version() {
        let vb = VersionBroker::new();
        assert_eq!(vb.get_write_version(), 1);
        vb.return_write_version().unwrap();
        assert_eq!(vb.latest_version(), 1);
        assert_eq!(vb.get_read_version(), 1);
        vb.return_read_version().unwrap();
    }

    #[test]
    fn test_superseded_objects_freed_once_after_last_reference() {
        let vb = VersionBroker::new();
        let drops = Arc::new(AtomicUsize::new(0));

        // reader pins version 0
        let v0 = vb.get_read_version();
        assert_eq!(v0, 0);

        // a writer on another logical task supersedes an object owned by
        // version 0; thread-locals are per thread, so hand the write
        // version to a scoped thread
        let probe = DropProbe(Arc::clone(&drops));
        std::thread::scope(|s| {
            s.spawn(|| {
                vb.get_write_version();
                // outgoing object belongs to the snapshot being replaced
                vb.register_object(Box::new(probe)).unwrap();
                vb.return_write_version().unwrap();
            });
        });

        // version 1 is retained (it is latest); the probe lives in
        // version 1's list, untouched so far
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        // reader done: version 0 finalizes, version 1 still latest
        vb.return_read_version().unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        // next publish releases version 1 and drops its objects, once
        vb.get_write_version();
        vb.return_write_version().unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stale_pin_is_a_conflict() {
        let vb = VersionBroker::new();
        vb.get_write_version();
        vb.return_write_version().unwrap();
        // version 0 had no readers and was finalized at publish
        assert_eq!(vb.pin_check(0), Err(GraphError::VersionConflict(0)));
        assert!(vb.pin_check(1).is_ok());
    }
}
