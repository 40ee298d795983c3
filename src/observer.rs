use crate::error::PipelineError;

/// Side channel for failures the drain task swallows.
///
/// Called from the drain task after a record could not be formatted or
/// written, and from `flush`/`shutdown` when the sink's own flush fails.
/// Implementations must not block: the next record waits behind them.
pub trait ErrorObserver: Send + Sync {
    fn on_error(&self, error: &PipelineError);
}

impl<F> ErrorObserver for F
where
    F: Fn(&PipelineError) + Send + Sync,
{
    fn on_error(&self, error: &PipelineError) {
        self(error)
    }
}

/// Prints failures to stderr. The default observer.
#[derive(Clone, Copy, Debug, Default)]
pub struct StderrObserver;

impl ErrorObserver for StderrObserver {
    fn on_error(&self, error: &PipelineError) {
        eprintln!("log pipeline dropped record: {}", error);
    }
}

/// Reports failures as `tracing` warnings under this crate's target.
///
/// The layer ignores events from this target, so the warnings never loop
/// back into the pipeline that produced them.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl ErrorObserver for TracingObserver {
    fn on_error(&self, error: &PipelineError) {
        tracing::warn!(target: "tracing_logstash::observer", error = %error, "log pipeline dropped record");
    }
}
