use crate::sink::LogSink;
use async_trait::async_trait;
use std::error::Error;

/// Discards every payload. Selected with the `noop://` DSN.
///
/// Handy for load tests: what remains is the cost of admission, queueing
/// and formatting.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl LogSink for NoopSink {
    async fn write(&self, _payload: &[u8]) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
