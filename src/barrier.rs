use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Coordinates emitters, flushers and the drain task.
///
/// Emitters hold the admission lock in shared mode while they register a
/// record and enqueue it. A flush takes it exclusively, which stops new
/// registrations, then waits for the pending count to reach zero. Tokio's
/// `RwLock` is fair, so a waiting flush is not starved by a stream of new
/// emitters.
#[derive(Debug, Default)]
pub struct FlushBarrier {
    admission: RwLock<()>,
    pending: AtomicUsize,
    drained: Notify,
}

/// Shared admission held by one emitter.
pub type Admission<'a> = RwLockReadGuard<'a, ()>;

/// Exclusive admission held by a flush or shutdown.
pub type ExclusiveAdmission<'a> = RwLockWriteGuard<'a, ()>;

impl FlushBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for shared admission.
    pub async fn admit(&self) -> Admission<'_> {
        self.admission.read().await
    }

    /// Shared admission if no flush holds or awaits the lock.
    pub fn try_admit(&self) -> Option<Admission<'_>> {
        self.admission.try_read().ok()
    }

    /// Wait for exclusive admission. No emitter can register while the
    /// guard lives.
    pub async fn exclusive(&self) -> ExclusiveAdmission<'_> {
        self.admission.write().await
    }

    /// Count one record as pending. Must happen before it is enqueued.
    pub fn register(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Mark one record as handled, whether or not it reached the sink.
    pub fn complete(&self) {
        let previous = self.pending.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "pending count underflow");
        if previous == 1 {
            self.drained.notify_waiters();
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Wait until no record is pending. Returns immediately when nothing is.
    pub async fn wait_drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            // Register interest before reading the count so a completion
            // between the load and the await is not missed.
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Block new admissions, then wait until everything admitted so far has
    /// been handled. The returned guard keeps admissions blocked.
    pub async fn drain(&self) -> ExclusiveAdmission<'_> {
        let exclusive = self.exclusive().await;
        self.wait_drained().await;
        exclusive
    }
}
