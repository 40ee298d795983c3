use crate::backend::{make_sink_from_config, parse_dsn};
use crate::env::{env_or, LOGSTASH_SINK_DSN_ENV};
use crate::error::InitError;
use crate::formatter::{default_formatter_with_pool, JsonFormatter, LogstashFormatter};
use crate::layer::LogstashLayer;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::pool::RecordPool;
use crate::record::Fields;
use crate::sink::LogSink;
use std::error::Error;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the tracing entry point.
///
/// **Fields**
/// - `pipeline`: queue capacity and record pool size, see [`PipelineConfig`].
/// - `static_fields`: fields added to every record (record fields win on
///   collision). `@version` and `type` default to `"1"` and `"log"`.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   installed next to the [`LogstashLayer`] so events also reach the console.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub pipeline: PipelineConfig,
    pub static_fields: Fields,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            static_fields: Fields::new(),
            enable_stdout: true,
        }
    }
}

/// Build the Logstash formatter described by `config`.
pub fn formatter_for(config: &LayerConfig) -> LogstashFormatter<JsonFormatter> {
    default_formatter_with_pool(
        config.static_fields.clone(),
        RecordPool::new(config.pipeline.max_idle_records),
    )
}

/// Initialize global `tracing` subscriber using the provided sink and
/// [`LayerConfig`].
///
/// **Parameters**
/// - `sink`: implementation of [`LogSink`] that will receive formatted
///   Logstash JSON lines.
/// - `config`: [`LayerConfig`] controlling queueing and static fields.
///
/// **Returns**
///
/// The [`Pipeline`] behind the layer. Keep it to `flush` before exiting
/// and to `shutdown` gracefully.
///
/// Must be called from within a Tokio runtime; the drain task is spawned
/// on it.
pub fn init_tracing_with_config(sink: Arc<dyn LogSink>, config: LayerConfig) -> Result<Pipeline, InitError> {
    tokio::runtime::Handle::try_current()?;

    let formatter = Arc::new(formatter_for(&config));
    let pipeline = Pipeline::new(sink, formatter, config.pipeline.clone());
    let layer = LogstashLayer::new(pipeline.clone());

    // Two branches because the stdout variant has a different subscriber type.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(pipeline)
}

/// Initialize tracing with sensible defaults.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LayerConfig::default`].
pub fn init_tracing(sink: Arc<dyn LogSink>) -> Result<Pipeline, InitError> {
    init_tracing_with_config(sink, LayerConfig::default())
}

/// Initialize tracing entirely from `LOGSTASH_*` environment variables.
///
/// The sink comes from `LOGSTASH_SINK_DSN` (default `stdout://`).
pub async fn init_tracing_from_env() -> Result<Pipeline, Box<dyn Error + Send + Sync>> {
    let dsn = env_or(LOGSTASH_SINK_DSN_ENV, "stdout://");
    let backend = parse_dsn(&dsn)?;
    let sink = make_sink_from_config(&backend).await?;
    Ok(init_tracing_with_config(sink, LayerConfig::from_env())?)
}
