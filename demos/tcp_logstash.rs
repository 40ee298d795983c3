//! Ship events to a Logstash `tcp` input configured with `codec => json_lines`.
//!
//! ```text
//! LOGSTASH_SINK_DSN=tcp://127.0.0.1:5000 LOGSTASH_SERVICE_NAME=auth-service \
//!     cargo run --example tcp_logstash
//! ```

use tracing::{error, info, warn};
use tracing_logstash::init::init_tracing_from_env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let pipeline = init_tracing_from_env().await?;

    info!(target: "auth", "starting service");
    warn!(target: "auth", attempts = 3, "slow upstream");
    error!(
        target: "auth",
        user_id = 42,
        reason = "invalid password",
        "authentication failed"
    );

    // Everything above is on the wire once this returns.
    pipeline.shutdown().await;
    Ok(())
}
