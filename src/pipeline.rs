use crate::barrier::FlushBarrier;
use crate::error::{EmitError, PipelineError};
use crate::formatter::RecordFormatter;
use crate::observer::{ErrorObserver, StderrObserver};
use crate::pool::DEFAULT_MAX_IDLE_RECORDS;
use crate::queue::{dispatch_queue, QueueSender, DEFAULT_QUEUE_CAPACITY};
use crate::record::{Level, LogRecord};
use crate::sink::LogSink;
use crate::worker::{drain_scope, DrainCounters, DrainWorker};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Construction-time settings for a [`Pipeline`].
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Records the dispatch queue holds before emitters start waiting.
    pub queue_capacity: usize,
    /// Idle records kept by the formatter's record pool. Only read by
    /// helpers that build the formatter, such as `init_tracing_with_config`.
    pub max_idle_records: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_idle_records: DEFAULT_MAX_IDLE_RECORDS,
        }
    }
}

/// Point-in-time view of a pipeline's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Records admitted into the dispatch queue.
    pub accepted: u64,
    /// Records written to the sink.
    pub written: u64,
    pub format_failures: u64,
    pub write_failures: u64,
    /// Records admitted but not yet handled by the drain task.
    pub pending: usize,
}

struct Inner {
    queue: QueueSender,
    barrier: Arc<FlushBarrier>,
    counters: Arc<DrainCounters>,
    accepted: AtomicU64,
    sink: Arc<dyn LogSink>,
    observer: Arc<dyn ErrorObserver>,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    runtime: Handle,
}

impl Inner {
    // Undo the bookkeeping of a record that never made it into the queue.
    fn withdraw(&self) {
        self.accepted.fetch_sub(1, Ordering::Relaxed);
        self.barrier.complete();
    }
}

/// Handle to an asynchronous log shipping pipeline.
///
/// Records passed to [`emit`](Self::emit) are queued and written to the
/// sink, in order, by a single background drain task. [`flush`](Self::flush)
/// waits until everything emitted before it has reached the sink.
///
/// Cloning is cheap; all clones feed the same queue. The drain task stops
/// after [`shutdown`](Self::shutdown) or once every clone is dropped.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Inner>,
}

impl Pipeline {
    /// Create a pipeline and spawn its drain task on the current Tokio
    /// runtime. Failures are printed to stderr.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(
        sink: Arc<dyn LogSink>,
        formatter: Arc<dyn RecordFormatter>,
        config: PipelineConfig,
    ) -> Self {
        Self::with_observer(sink, formatter, config, Arc::new(StderrObserver))
    }

    /// Like [`new`](Self::new), reporting failures to `observer`.
    pub fn with_observer(
        sink: Arc<dyn LogSink>,
        formatter: Arc<dyn RecordFormatter>,
        config: PipelineConfig,
        observer: Arc<dyn ErrorObserver>,
    ) -> Self {
        let (queue, receiver) = dispatch_queue(config.queue_capacity);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let barrier = Arc::new(FlushBarrier::new());
        let counters = Arc::new(DrainCounters::default());

        let worker = DrainWorker {
            queue: receiver,
            formatter,
            sink: Arc::clone(&sink),
            observer: Arc::clone(&observer),
            barrier: Arc::clone(&barrier),
            counters: Arc::clone(&counters),
            shutdown: shutdown_rx,
        }
        .spawn();

        tracing::debug!(
            target: "tracing_logstash::pipeline",
            queue_capacity = queue.max_capacity(),
            "log pipeline started"
        );

        Self {
            inner: Arc::new(Inner {
                queue,
                barrier,
                counters,
                accepted: AtomicU64::new(0),
                sink,
                observer,
                closed: AtomicBool::new(false),
                shutdown,
                worker: Mutex::new(Some(worker)),
                runtime: Handle::current(),
            }),
        }
    }

    /// Severities this pipeline accepts: all of them.
    pub fn levels(&self) -> &'static [Level] {
        &Level::ALL
    }

    /// Queue `record` for the drain task.
    ///
    /// Waits while a flush holds admission and while the queue is full.
    /// Dropping the future during either wait is safe: the record is simply
    /// not emitted. Formatting and sink failures are never reported here; the
    /// only error is [`EmitError::Closed`] after shutdown.
    pub async fn emit(&self, record: LogRecord) -> Result<(), EmitError> {
        let inner = &*self.inner;
        let _admission = inner.barrier.admit().await;
        if inner.closed.load(Ordering::Acquire) {
            return Err(EmitError::Closed);
        }

        // Only count the record once its slot is secured: nothing below may
        // await, or a cancelled caller would leave the count raised forever.
        let permit = inner.queue.reserve().await.map_err(|_| EmitError::Closed)?;
        inner.barrier.register();
        inner.accepted.fetch_add(1, Ordering::Relaxed);
        permit.send(record);
        Ok(())
    }

    /// Queue `record` only if that needs no waiting.
    pub fn try_emit(&self, record: LogRecord) -> Result<(), EmitError> {
        let inner = &*self.inner;
        let _admission = inner.barrier.try_admit().ok_or(EmitError::FlushInProgress)?;
        if inner.closed.load(Ordering::Acquire) {
            return Err(EmitError::Closed);
        }

        inner.barrier.register();
        inner.accepted.fetch_add(1, Ordering::Relaxed);
        match inner.queue.try_enqueue(record) {
            Ok(()) => Ok(()),
            Err(e) => {
                inner.withdraw();
                Err(match e {
                    TrySendError::Full(_) => EmitError::Full,
                    TrySendError::Closed(_) => EmitError::Closed,
                })
            }
        }
    }

    /// Wait until every record whose `emit` returned before this call has
    /// been handed to the sink, then flush the sink.
    ///
    /// New emitters wait for the duration. Returns at once when nothing is
    /// pending.
    pub async fn flush(&self) {
        let inner = &*self.inner;
        let _exclusive = inner.barrier.drain().await;
        self.flush_sink().await;
    }

    /// Flush, stop the drain task and wait for it to exit.
    ///
    /// Later `emit` calls fail with [`EmitError::Closed`]. Calling this more
    /// than once is harmless.
    pub async fn shutdown(&self) {
        let inner = &*self.inner;
        {
            let _exclusive = inner.barrier.drain().await;
            if inner.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            self.flush_sink().await;
            let _ = inner.shutdown.send(true);
        }

        let worker = inner.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                eprintln!("log pipeline drain task failed: {}", e);
            }
        }
        tracing::debug!(target: "tracing_logstash::pipeline", "log pipeline shut down");
    }

    /// [`emit`](Self::emit) for plain threads.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn emit_blocking(&self, record: LogRecord) -> Result<(), EmitError> {
        self.inner.runtime.block_on(self.emit(record))
    }

    /// [`flush`](Self::flush) for plain threads.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn flush_blocking(&self) {
        self.inner.runtime.block_on(self.flush())
    }

    /// Emit from synchronous code that may or may not run on a Tokio
    /// runtime, such as a `tracing` layer callback.
    ///
    /// Off-runtime this blocks like [`emit_blocking`](Self::emit_blocking).
    /// On a multi-thread runtime the worker thread is handed over with
    /// `block_in_place` first. A current-thread runtime cannot block
    /// without stalling the drain task, so there the record is only
    /// queued if [`try_emit`](Self::try_emit) succeeds.
    pub fn emit_from_sync(&self, record: LogRecord) -> Result<(), EmitError> {
        match Handle::try_current() {
            Err(_) => self.emit_blocking(record),
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| self.emit_blocking(record))
            }
            Ok(_) => self.try_emit(record),
        }
    }

    pub fn stats(&self) -> PipelineStats {
        let inner = &*self.inner;
        PipelineStats {
            accepted: inner.accepted.load(Ordering::Relaxed),
            written: inner.counters.written.load(Ordering::Relaxed),
            format_failures: inner.counters.format_failures.load(Ordering::Relaxed),
            write_failures: inner.counters.write_failures.load(Ordering::Relaxed),
            pending: inner.barrier.pending(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    // Only called with exclusive admission held and nothing pending, so the
    // drain task is idle and not touching the sink. Runs in the drain scope:
    // an event the sink logs here must not wait on the admission we hold.
    async fn flush_sink(&self) {
        if let Err(e) = drain_scope(self.inner.sink.flush()).await {
            self.inner.observer.on_error(&PipelineError::Flush(e));
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("queue_capacity", &self.inner.queue.max_capacity())
            .field("closed", &self.is_closed())
            .field("stats", &self.stats())
            .finish()
    }
}
