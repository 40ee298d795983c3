use crate::barrier::FlushBarrier;
use crate::error::PipelineError;
use crate::formatter::RecordFormatter;
use crate::observer::ErrorObserver;
use crate::queue::QueueReceiver;
use crate::record::LogRecord;
use crate::sink::LogSink;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

tokio::task_local! {
    static IN_DRAIN: ();
}

/// True when called from inside a drain task.
///
/// Events raised while a record is being formatted or written (for example
/// by an HTTP client inside a sink) must not be fed back into the pipeline.
pub fn in_drain_task() -> bool {
    IN_DRAIN.try_with(|_| ()).is_ok()
}

/// Run `future` as if it were part of the drain task, so events it raises
/// are not fed back into the pipeline.
pub(crate) fn drain_scope<F: Future>(future: F) -> impl Future<Output = F::Output> {
    IN_DRAIN.scope((), future)
}

/// Cumulative counters updated by the drain task.
#[derive(Debug, Default)]
pub struct DrainCounters {
    pub written: AtomicU64,
    pub format_failures: AtomicU64,
    pub write_failures: AtomicU64,
}

/// The single consumer of a dispatch queue.
///
/// Formats each record, writes it to the sink and retires it from the
/// pending count. Failures go to the observer and the record is dropped.
/// Being the only caller of the formatter and the sink is what lets both
/// run without locking.
pub struct DrainWorker {
    pub(crate) queue: QueueReceiver,
    pub(crate) formatter: Arc<dyn RecordFormatter>,
    pub(crate) sink: Arc<dyn LogSink>,
    pub(crate) observer: Arc<dyn ErrorObserver>,
    pub(crate) barrier: Arc<FlushBarrier>,
    pub(crate) counters: Arc<DrainCounters>,
    pub(crate) shutdown: watch::Receiver<bool>,
}

impl DrainWorker {
    /// Spawn the worker on the current Tokio runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(drain_scope(self.run()))
    }

    async fn run(mut self) {
        tracing::debug!(target: "tracing_logstash::worker", "drain worker started");
        loop {
            tokio::select! {
                biased;
                record = self.queue.dequeue() => match record {
                    Some(record) => self.drain(record).await,
                    None => break,
                },
                _ = self.shutdown.changed() => break,
            }
        }

        // Anything that slipped in before the queue closed is still owed to
        // the sink and to the pending count.
        self.queue.close();
        while let Some(record) = self.queue.try_dequeue() {
            self.drain(record).await;
        }
        tracing::debug!(target: "tracing_logstash::worker", "drain worker stopped");
    }

    async fn drain(&self, record: LogRecord) {
        let result = match self.formatter.format(&record) {
            Ok(payload) => self.sink.write(&payload).await.map_err(PipelineError::Write),
            Err(e) => Err(PipelineError::Format(e)),
        };

        match result {
            Ok(()) => {
                self.counters.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                let counter = match e {
                    PipelineError::Format(_) => &self.counters.format_failures,
                    _ => &self.counters.write_failures,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                self.observer.on_error(&e);
            }
        }

        self.barrier.complete();
    }
}
