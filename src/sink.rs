use async_trait::async_trait;
use std::error::Error;

/// Asynchronous byte-stream destination for formatted log records.
///
/// Implementations are responsible for transporting payloads to a concrete
/// backend (Logstash TCP input, a file, ClickHouse, stdout, etc). The
/// pipeline only ever calls `write` from its single drain task, so writes
/// arrive one at a time and in emission order.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Append one formatted record to the underlying backend.
    ///
    /// **Parameters**
    /// - `payload`: bytes produced by the pipeline's formatter, usually one
    ///   newline-terminated JSON document.
    ///
    /// **Returns**
    /// - `Ok(())` if the backend accepted the payload.
    /// - `Err(..)` if the backend failed (I/O error, HTTP status, etc.). The
    ///   pipeline reports the failure to its error observer and drops the
    ///   record; there is no retry.
    async fn write(&self, payload: &[u8]) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush any buffered bytes, if the backend implements buffering.
    ///
    /// Called by `Pipeline::flush` once every accepted record has been
    /// written. Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
