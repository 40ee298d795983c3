use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use tracing_logstash::init::init_tracing;
use tracing_logstash::noop_sink::NoopSink;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = Arc::new(NoopSink::default());
    let pipeline = init_tracing(sink)?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(target: "load", iteration = i, "default load test error");
    }
    let emitted = start.elapsed();

    pipeline.flush().await;
    let drained = start.elapsed();

    println!("default config: emitted {} events in {:?} (~{:.0} ev/s), drained after {:?}",
        n,
        emitted,
        n as f64 / emitted.as_secs_f64(),
        drained
    );
    println!("{:?}", pipeline.stats());

    pipeline.shutdown().await;
    Ok(())
}
