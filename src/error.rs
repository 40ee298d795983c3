use std::error::Error;

/// A serializer could not turn a record into bytes.
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("failed to encode record as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Failure observed by the drain task while handling one record.
///
/// Neither kind ever reaches the producer that emitted the record; both are
/// reported to the configured [`ErrorObserver`](crate::observer::ErrorObserver)
/// and the record is dropped.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("formatting failure: {0}")]
    Format(#[from] FormatError),

    #[error("write failure: {0}")]
    Write(#[source] Box<dyn Error + Send + Sync>),

    #[error("sink flush failure: {0}")]
    Flush(#[source] Box<dyn Error + Send + Sync>),
}

/// Why a record was not admitted into the pipeline.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitError {
    #[error("pipeline has been shut down")]
    Closed,

    #[error("dispatch queue is full")]
    Full,

    #[error("admission is held by a flush")]
    FlushInProgress,
}

/// Error returned when installing the global subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("a global tracing subscriber is already installed")]
    SubscriberAlreadySet(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("init_tracing must be called from within a Tokio runtime")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}
