pub mod record;
pub mod pool;
pub mod formatter;
pub mod error;
pub mod observer;
pub mod sink;
pub mod queue;
pub mod barrier;
pub mod worker;
pub mod pipeline;
pub mod layer;

#[cfg(feature = "clickhouse")]
pub mod clickhouse;

pub mod backend;
pub mod env;
pub mod init;
pub mod noop_sink;
pub mod writer_sink;

pub use error::{EmitError, FormatError, PipelineError};
pub use formatter::{default_formatter, JsonFormatter, LogstashFormatter, RecordFormatter};
pub use pipeline::{Pipeline, PipelineConfig, PipelineStats};
pub use record::{Caller, Fields, Level, LogRecord};
pub use sink::LogSink;

/// Tracing target prefix used by this crate's own diagnostics.
pub(crate) const SELF_TARGET: &str = "tracing_logstash";
