use crate::pipeline::Pipeline;
use crate::record::{Caller, Fields, Level, LogRecord};
use crate::worker::in_drain_task;
use chrono::Utc;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tracing::level_filters::LevelFilter;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Targets whose events never enter the pipeline: this crate's own
/// diagnostics and the transport stack sinks are built on.
pub const DEFAULT_IGNORED_TARGETS: &[&str] = &[
    crate::SELF_TARGET,
    "hyper",
    "reqwest",
    "h2",
    "rustls",
    "tokio",
    "want",
    "mio",
];

/// `tracing_subscriber` layer that turns every event into a [`LogRecord`]
/// and emits it into a [`Pipeline`].
///
/// All levels are accepted; filtering, if any, belongs to other layers.
/// Emission happens on the application thread and may wait for queue space
/// (see [`Pipeline::emit_from_sync`]); formatting and network I/O happen on
/// the pipeline's drain task.
pub struct LogstashLayer {
    pipeline: Pipeline,
    ignored_targets: Vec<String>,
    /// Total events seen by the layer.
    pub total_events: Arc<AtomicU64>,
    /// Successfully emitted into the pipeline.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the pipeline could not take them without blocking,
    /// or had been shut down.
    pub dropped_events: Arc<AtomicU64>,
}

impl LogstashLayer {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            ignored_targets: DEFAULT_IGNORED_TARGETS.iter().map(|t| t.to_string()).collect(),
            total_events: Arc::new(AtomicU64::new(0)),
            enqueued_events: Arc::new(AtomicU64::new(0)),
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Also ignore events whose target starts with `target`.
    pub fn ignore_target(mut self, target: impl Into<String>) -> Self {
        self.ignored_targets.push(target.into());
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    fn is_ignored(&self, target: &str) -> bool {
        self.ignored_targets.iter().any(|ignored| {
            target
                .strip_prefix(ignored.as_str())
                .map_or(false, |rest| rest.is_empty() || rest.starts_with("::"))
        })
    }
}

// A closed or saturated pipeline drops every event; only the 1st, 2nd, 4th,
// 8th... drop is printed so stderr is not flooded.
fn reports_drop(dropped: u64) -> bool {
    dropped.is_power_of_two()
}

/// Build a [`LogRecord`] from a `tracing` event.
pub fn record_from_event(event: &Event<'_>) -> LogRecord {
    let mut fields = Fields::new();
    let mut message: Option<String> = None;

    let mut visitor = FieldVisitor { fields: &mut fields, message: &mut message };
    event.record(&mut visitor);

    let meta = event.metadata();
    let caller = match (meta.file(), meta.line()) {
        (Some(file), Some(line)) => Some(Caller {
            function: meta.module_path().unwrap_or_else(|| meta.target()).to_string(),
            file: file.to_string(),
            line,
        }),
        _ => None,
    };

    LogRecord {
        timestamp: Utc::now(),
        level: Level::from(meta.level()),
        message: message.unwrap_or_default(),
        fields,
        caller,
    }
}

impl<S> Layer<S> for LogstashLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if in_drain_task() || self.is_ignored(event.metadata().target()) {
            return;
        }

        let record = record_from_event(event);
        match self.pipeline.emit_from_sync(record) {
            Ok(()) => {
                self.enqueued_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                let dropped = self.dropped_events.fetch_add(1, Ordering::Relaxed) + 1;
                if reports_drop(dropped) {
                    eprintln!("dropping log records: {} ({} dropped so far)", e, dropped);
                }
            }
        }
    }

    fn max_level_hint(&self) -> Option<LevelFilter> {
        Some(LevelFilter::TRACE)
    }
}

use tracing::field::{Field, Visit};

pub struct FieldVisitor<'a> {
    pub fields: &'a mut Fields,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        // NaN and infinities have no JSON form.
        let value = serde_json::Number::from_f64(value)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(value.to_string()));
        self.fields.insert(field.name().to_string(), value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(format!("{:?}", value)));
        }
    }
}
