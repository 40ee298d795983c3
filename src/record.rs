use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Structured field values attached to a record, keyed by field name.
pub type Fields = BTreeMap<String, serde_json::Value>;

/// Severity of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    #[serde(rename = "warning")]
    Warn,
    Info,
    Debug,
    Trace,
}

impl Level {
    /// Every severity the pipeline accepts. No filtering happens inside the
    /// pipeline itself.
    pub const ALL: [Level; 5] = [Level::Error, Level::Warn, Level::Info, Level::Debug, Level::Trace];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Error => "error",
            Level::Warn => "warning",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::INFO => Level::Info,
            tracing::Level::DEBUG => Level::Debug,
            _ => Level::Trace,
        }
    }
}

/// Call-site information captured by the upstream logging API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Caller {
    pub function: String,
    pub file: String,
    pub line: u32,
}

/// Immutable snapshot of one log event as produced upstream.
///
/// The pipeline only ever reads a `LogRecord`; the merged, decorated view
/// handed to serializers is a pooled [`MergedRecord`].
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub fields: Fields,
    pub caller: Option<Caller>,
}

impl LogRecord {
    /// Start a record stamped with the current time and no fields.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            fields: Fields::new(),
            caller: None,
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_caller(mut self, caller: Caller) -> Self {
        self.caller = Some(caller);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Working copy of a [`LogRecord`] with static fields and caller info merged
/// into its field map. Instances live in a [`RecordPool`](crate::pool::RecordPool).
#[derive(Debug, Clone)]
pub struct MergedRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub fields: Fields,
}

impl MergedRecord {
    pub(crate) fn empty() -> Self {
        Self {
            timestamp: DateTime::<Utc>::default(),
            level: Level::Info,
            message: String::new(),
            fields: Fields::new(),
        }
    }

    /// Overwrite every part of this record from `record`.
    ///
    /// Fields are merged in increasing priority: caller info, then
    /// `static_fields`, then the record's own fields.
    pub(crate) fn fill(&mut self, record: &LogRecord, static_fields: &Fields) {
        self.timestamp = record.timestamp;
        self.level = record.level;
        self.message.clear();
        self.message.push_str(&record.message);
        self.fields.clear();

        if let Some(caller) = &record.caller {
            self.fields
                .insert("function".to_string(), serde_json::Value::String(caller.function.clone()));
            self.fields.insert(
                "file".to_string(),
                serde_json::Value::String(format!("{}:{}", caller.file, caller.line)),
            );
        }
        for (k, v) in static_fields {
            self.fields.insert(k.clone(), v.clone());
        }
        for (k, v) in &record.fields {
            self.fields.insert(k.clone(), v.clone());
        }
    }

    pub(crate) fn clear(&mut self) {
        self.message.clear();
        self.fields.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fill_applies_merge_priority() {
        let record = LogRecord::new(Level::Warn, "disk almost full")
            .field("a", 1)
            .field("function", "overridden")
            .with_caller(Caller {
                function: "app::disk::check".to_string(),
                file: "src/disk.rs".to_string(),
                line: 42,
            });
        let mut statics = Fields::new();
        statics.insert("a".to_string(), json!(2));
        statics.insert("b".to_string(), json!(3));
        statics.insert("file".to_string(), json!("static.rs"));

        let mut merged = MergedRecord::empty();
        merged.fill(&record, &statics);

        assert_eq!(merged.level, Level::Warn);
        assert_eq!(merged.message, "disk almost full");
        assert_eq!(merged.timestamp, record.timestamp);
        assert_eq!(merged.fields["a"], json!(1));
        assert_eq!(merged.fields["b"], json!(3));
        assert_eq!(merged.fields["function"], json!("overridden"));
        assert_eq!(merged.fields["file"], json!("static.rs"));
    }

    #[test]
    fn fill_discards_previous_fields() {
        let mut merged = MergedRecord::empty();
        merged.fill(&LogRecord::new(Level::Info, "first").field("stale", true), &Fields::new());
        merged.fill(&LogRecord::new(Level::Error, "second"), &Fields::new());

        assert!(merged.fields.is_empty());
        assert_eq!(merged.message, "second");
        assert_eq!(merged.level, Level::Error);
    }

    #[test]
    fn levels_render_lowercase() {
        let rendered: Vec<_> = Level::ALL.iter().map(Level::as_str).collect();
        assert_eq!(rendered, ["error", "warning", "info", "debug", "trace"]);
        assert_eq!(serde_json::to_value(Level::Warn).unwrap(), json!("warning"));
        assert_eq!(Level::from(&tracing::Level::DEBUG), Level::Debug);
    }
}
