use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use tracing_logstash::{
    init::init_tracing,
    sink::LogSink,
};

/// Example of integrating a completely custom backend by implementing
/// the `LogSink` trait directly. Imagine this talks to some
/// proprietary store for which this crate does not provide a built-in
/// sink.
struct MyCustomDbSink;

#[async_trait]
impl LogSink for MyCustomDbSink {
    async fn write(&self, payload: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // Here you would call your own client library for the target store.
        // For the sake of example we just print the JSON line.
        print!("[my-custom-db] {}", String::from_utf8_lossy(payload));
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink: Arc<dyn LogSink> = Arc::new(MyCustomDbSink);

    let pipeline = init_tracing(sink)?;

    info!(target: "example", "custom backend example started");
    error!(target: "example", db = "my-custom-db", "simulated error sent via custom backend");

    pipeline.shutdown().await;
    Ok(())
}
