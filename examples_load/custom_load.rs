use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use tracing_logstash::init::{init_tracing_with_config, LayerConfig};
use tracing_logstash::noop_sink::NoopSink;
use tracing_logstash::pipeline::PipelineConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = Arc::new(NoopSink::default());

    let layer_config = LayerConfig {
        pipeline: PipelineConfig {
            queue_capacity: 50_000,
            max_idle_records: 4_096,
        },
        enable_stdout: false,
        ..LayerConfig::default()
    };

    let pipeline = init_tracing_with_config(sink, layer_config)?;

    let n: u64 = 100_000;
    let threads = 4;
    let start = Instant::now();

    // Plain OS threads emitting concurrently, as a busy service would.
    let producers: Vec<_> = (0..threads)
        .map(|t| {
            std::thread::spawn(move || {
                for i in 0..n / threads {
                    error!(target: "load", thread = t, iteration = i, "custom load test error");
                }
            })
        })
        .collect();
    tokio::task::spawn_blocking(move || {
        for producer in producers {
            let _ = producer.join();
        }
    })
    .await?;

    pipeline.flush().await;
    let elapsed = start.elapsed();
    println!("custom config: sent {} events from {} threads in {:?} (~{:.0} ev/s)",
        n,
        threads,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
    println!("{:?}", pipeline.stats());

    pipeline.shutdown().await;
    Ok(())
}
