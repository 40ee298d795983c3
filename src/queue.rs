use crate::record::LogRecord;
use tokio::sync::mpsc;

/// Default capacity of the dispatch queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8192;

/// Producer side of the bounded FIFO between emitters and the drain task.
///
/// A full queue makes `enqueue` wait for the drain task to free a slot.
/// That wait is the pipeline's only backpressure: nothing is dropped and
/// no record jumps the line.
#[derive(Clone, Debug)]
pub struct QueueSender {
    tx: mpsc::Sender<LogRecord>,
}

/// Consumer side, owned by exactly one drain task.
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::Receiver<LogRecord>,
}

/// Create a queue holding at most `capacity` records (at least one).
pub fn dispatch_queue(capacity: usize) -> (QueueSender, QueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (QueueSender { tx }, QueueReceiver { rx })
}

impl QueueSender {
    /// Wait for a free slot and enqueue `record`.
    ///
    /// Gives the record back if the drain task is gone.
    pub async fn enqueue(&self, record: LogRecord) -> Result<(), LogRecord> {
        self.tx.send(record).await.map_err(|e| e.0)
    }

    /// Wait for a free slot without handing over a record yet.
    ///
    /// Dropping the returned permit gives the slot back, so a caller that is
    /// cancelled while waiting here leaves nothing behind.
    pub async fn reserve(&self) -> Result<mpsc::Permit<'_, LogRecord>, mpsc::error::SendError<()>> {
        self.tx.reserve().await
    }

    /// Enqueue without waiting.
    pub fn try_enqueue(&self, record: LogRecord) -> Result<(), mpsc::error::TrySendError<LogRecord>> {
        self.tx.try_send(record)
    }

    pub fn max_capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Number of records currently waiting in the queue.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl QueueReceiver {
    /// Wait for the next record. `None` once every sender is gone and the
    /// queue is empty.
    pub async fn dequeue(&mut self) -> Option<LogRecord> {
        self.rx.recv().await
    }

    /// Stop accepting records; already queued ones can still be dequeued.
    pub fn close(&mut self) {
        self.rx.close()
    }

    pub fn try_dequeue(&mut self) -> Option<LogRecord> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Level;
    use std::time::Duration;

    #[tokio::test]
    async fn preserves_fifo_order() {
        let (tx, mut rx) = dispatch_queue(16);
        for i in 0..10 {
            tx.enqueue(LogRecord::new(Level::Info, format!("m{}", i))).await.unwrap();
        }
        assert_eq!(tx.len(), 10);
        for i in 0..10 {
            assert_eq!(rx.dequeue().await.unwrap().message, format!("m{}", i));
        }
        assert!(tx.is_empty());
    }

    #[tokio::test]
    async fn full_queue_waits_for_a_slot() {
        let (tx, mut rx) = dispatch_queue(1);
        tx.enqueue(LogRecord::new(Level::Info, "first")).await.unwrap();
        assert!(tx.try_enqueue(LogRecord::new(Level::Info, "x")).is_err());

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            tx.enqueue(LogRecord::new(Level::Info, "second")),
        )
        .await;
        assert!(blocked.is_err());

        assert_eq!(rx.dequeue().await.unwrap().message, "first");
        tx.enqueue(LogRecord::new(Level::Info, "second")).await.unwrap();
        assert_eq!(rx.dequeue().await.unwrap().message, "second");
    }

    #[tokio::test]
    async fn dropped_permit_frees_its_slot() {
        let (tx, mut rx) = dispatch_queue(1);
        let permit = tx.reserve().await.unwrap();
        assert!(tx.try_enqueue(LogRecord::new(Level::Info, "x")).is_err());
        drop(permit);

        tx.reserve().await.unwrap().send(LogRecord::new(Level::Info, "kept"));
        assert_eq!(rx.dequeue().await.unwrap().message, "kept");
    }

    #[tokio::test]
    async fn zero_capacity_is_clamped() {
        let (tx, _rx) = dispatch_queue(0);
        assert_eq!(tx.max_capacity(), 1);
    }

    #[tokio::test]
    async fn closed_receiver_returns_record() {
        let (tx, mut rx) = dispatch_queue(4);
        rx.close();
        let back = tx.enqueue(LogRecord::new(Level::Error, "late")).await.unwrap_err();
        assert_eq!(back.message, "late");
        assert!(rx.try_dequeue().is_none());
    }
}
