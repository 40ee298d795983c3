use crate::error::FormatError;
use crate::pool::RecordPool;
use crate::record::{Fields, LogRecord, MergedRecord};
use chrono::SecondsFormat;
use serde_json::{Map, Value};
use std::fmt::Write;

/// Turns an upstream [`LogRecord`] into the bytes written to the sink.
///
/// This is what the drain task calls for every record. Implementations must
/// be safe to call from several threads at once.
pub trait RecordFormatter: Send + Sync {
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>, FormatError>;
}

/// Serializes an already merged record. Used as the inner encoder of
/// [`LogstashFormatter`].
pub trait Serializer: Send + Sync {
    fn serialize(&self, record: &MergedRecord) -> Result<Vec<u8>, FormatError>;
}

/// Output key names for the reserved parts of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap {
    pub time: String,
    pub message: String,
    pub level: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            time: "time".to_string(),
            message: "msg".to_string(),
            level: "level".to_string(),
        }
    }
}

impl FieldMap {
    /// Key names used by Logstash: `@timestamp` and `message`.
    pub fn logstash() -> Self {
        Self {
            time: "@timestamp".to_string(),
            message: "message".to_string(),
            ..Self::default()
        }
    }
}

/// Newline-delimited JSON encoder.
///
/// Every record becomes one JSON object. Record fields that collide with a
/// reserved key (time, message, level after renaming) are moved to
/// `fields.<key>` instead of being overwritten.
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    pub field_map: FieldMap,
    /// chrono strftime pattern; RFC 3339 with whole seconds when unset.
    pub timestamp_format: Option<String>,
    pub disable_timestamp: bool,
    /// Nest all record fields under this key instead of the top level.
    pub data_key: Option<String>,
    pub pretty_print: bool,
}

impl JsonFormatter {
    pub fn with_field_map(field_map: FieldMap) -> Self {
        Self {
            field_map,
            ..Self::default()
        }
    }

    fn prefix_field_clashes(&self, data: &mut Map<String, Value>) {
        for key in [&self.field_map.time, &self.field_map.message, &self.field_map.level] {
            if let Some(value) = data.remove(key.as_str()) {
                data.insert(format!("fields.{}", key), value);
            }
        }
    }
}

impl Serializer for JsonFormatter {
    fn serialize(&self, record: &MergedRecord) -> Result<Vec<u8>, FormatError> {
        let mut data: Map<String, Value> = record
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if let Some(data_key) = &self.data_key {
            let mut nested = Map::new();
            nested.insert(data_key.clone(), Value::Object(data));
            data = nested;
        }

        self.prefix_field_clashes(&mut data);

        if !self.disable_timestamp {
            let timestamp = match &self.timestamp_format {
                Some(pattern) => {
                    let mut rendered = String::new();
                    write!(rendered, "{}", record.timestamp.format(pattern)).map_err(|_| {
                        FormatError::Other(format!("invalid timestamp format `{}`", pattern))
                    })?;
                    rendered
                }
                None => record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            };
            data.insert(self.field_map.time.clone(), Value::String(timestamp));
        }
        data.insert(self.field_map.message.clone(), Value::String(record.message.clone()));
        data.insert(
            self.field_map.level.clone(),
            Value::String(record.level.as_str().to_string()),
        );

        let data = Value::Object(data);
        let mut bytes = if self.pretty_print {
            serde_json::to_vec_pretty(&data)?
        } else {
            serde_json::to_vec(&data)?
        };
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Decorates an inner [`Serializer`] with static fields and caller info.
///
/// Each call borrows a [`MergedRecord`] from the pool, merges caller info,
/// the static fields and the record's own fields (in that priority order),
/// delegates to the inner serializer and hands the record back.
pub struct LogstashFormatter<S = JsonFormatter> {
    inner: S,
    fields: Fields,
    pool: RecordPool,
}

impl<S: Serializer> LogstashFormatter<S> {
    pub fn new(inner: S, fields: Fields) -> Self {
        Self::with_pool(inner, fields, RecordPool::default())
    }

    pub fn with_pool(inner: S, fields: Fields, pool: RecordPool) -> Self {
        Self { inner, fields, pool }
    }

    pub fn static_fields(&self) -> &Fields {
        &self.fields
    }

    pub fn pool(&self) -> &RecordPool {
        &self.pool
    }
}

impl<S: Serializer> RecordFormatter for LogstashFormatter<S> {
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>, FormatError> {
        let merged = self.pool.acquire(record, &self.fields);
        self.inner.serialize(&merged)
    }
}

/// Static fields every Logstash event carries unless overridden.
pub fn logstash_fields() -> Fields {
    let mut fields = Fields::new();
    fields.insert("@version".to_string(), Value::String("1".to_string()));
    fields.insert("type".to_string(), Value::String("log".to_string()));
    fields
}

/// Build the standard Logstash formatter: JSON with `@timestamp`/`message`
/// keys and `@version`/`type` defaults added unless `fields` sets them.
pub fn default_formatter(fields: Fields) -> LogstashFormatter<JsonFormatter> {
    default_formatter_with_pool(fields, RecordPool::default())
}

/// [`default_formatter`] backed by the given record pool.
pub fn default_formatter_with_pool(mut fields: Fields, pool: RecordPool) -> LogstashFormatter<JsonFormatter> {
    for (k, v) in logstash_fields() {
        fields.entry(k).or_insert(v);
    }
    LogstashFormatter::with_pool(JsonFormatter::with_field_map(FieldMap::logstash()), fields, pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Caller, Level};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;

    fn parse(bytes: &[u8]) -> Value {
        assert_eq!(bytes.last(), Some(&b'\n'));
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn record_fields_win_over_static_fields() {
        let mut statics = Fields::new();
        statics.insert("a".to_string(), json!(2));
        statics.insert("b".to_string(), json!(3));
        let formatter = default_formatter(statics);

        let out = parse(&formatter.format(&LogRecord::new(Level::Info, "hi").field("a", 1)).unwrap());

        assert_eq!(out["a"], json!(1));
        assert_eq!(out["b"], json!(3));
        assert!(out.get("function").is_none());
        assert!(out.get("file").is_none());
    }

    #[test]
    fn logstash_layout() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let formatter = default_formatter(Fields::new());
        let record = LogRecord::new(Level::Warn, "cache miss")
            .at(ts)
            .with_caller(Caller {
                function: "app::cache::get".to_string(),
                file: "src/cache.rs".to_string(),
                line: 17,
            });

        let out = parse(&formatter.format(&record).unwrap());

        assert_eq!(out["@version"], json!("1"));
        assert_eq!(out["type"], json!("log"));
        assert_eq!(out["message"], json!("cache miss"));
        assert_eq!(out["level"], json!("warning"));
        assert_eq!(out["@timestamp"], json!("2024-03-01T12:30:00Z"));
        assert_eq!(out["function"], json!("app::cache::get"));
        assert_eq!(out["file"], json!("src/cache.rs:17"));
    }

    #[test]
    fn default_formatter_keeps_caller_overrides_of_defaults() {
        let mut statics = Fields::new();
        statics.insert("type".to_string(), json!("audit"));
        let formatter = default_formatter(statics);

        assert_eq!(formatter.static_fields()["type"], json!("audit"));
        assert_eq!(formatter.static_fields()["@version"], json!("1"));
    }

    #[test]
    fn clashing_fields_are_prefixed() {
        let formatter = default_formatter(Fields::new());
        let record = LogRecord::new(Level::Error, "real")
            .field("message", "from field")
            .field("level", "bogus");

        let out = parse(&formatter.format(&record).unwrap());

        assert_eq!(out["message"], json!("real"));
        assert_eq!(out["fields.message"], json!("from field"));
        assert_eq!(out["level"], json!("error"));
        assert_eq!(out["fields.level"], json!("bogus"));
    }

    #[test]
    fn json_options() {
        let formatter = JsonFormatter {
            timestamp_format: Some("%Y-%m-%d".to_string()),
            data_key: Some("data".to_string()),
            ..JsonFormatter::default()
        };
        let mut merged = MergedRecord::empty();
        let record = LogRecord::new(Level::Info, "nested")
            .at(Utc.with_ymd_and_hms(2023, 11, 5, 0, 0, 0).unwrap())
            .field("user", "bob");
        merged.fill(&record, &Fields::new());

        let out = parse(&formatter.serialize(&merged).unwrap());
        assert_eq!(out["time"], json!("2023-11-05"));
        assert_eq!(out["msg"], json!("nested"));
        assert_eq!(out["data"]["user"], json!("bob"));

        let quiet = JsonFormatter {
            disable_timestamp: true,
            ..JsonFormatter::default()
        };
        let out = parse(&quiet.serialize(&merged).unwrap());
        assert!(out.get("time").is_none());

        let broken = JsonFormatter {
            timestamp_format: Some("%Q".to_string()),
            ..JsonFormatter::default()
        };
        assert!(broken.serialize(&merged).is_err());
    }

    #[test]
    fn pool_is_returned_after_format() {
        let formatter = default_formatter(Fields::new());
        for i in 0..10 {
            formatter.format(&LogRecord::new(Level::Info, "x").field("i", i)).unwrap();
        }
        assert_eq!(formatter.pool().allocated(), 1);
        assert_eq!(formatter.pool().idle(), 1);
    }

    struct Failing;

    impl Serializer for Failing {
        fn serialize(&self, _record: &MergedRecord) -> Result<Vec<u8>, FormatError> {
            Err(FormatError::Other("nope".to_string()))
        }
    }

    #[test]
    fn inner_failure_propagates_and_releases_record() {
        let formatter = LogstashFormatter::new(Failing, Fields::new());
        let err = formatter.format(&LogRecord::new(Level::Info, "x")).unwrap_err();
        assert!(matches!(err, FormatError::Other(_)));
        assert_eq!(formatter.pool().idle(), 1);
    }

    #[test]
    fn concurrent_formats_do_not_share_fields() {
        let formatter = Arc::new(default_formatter(Fields::new()));
        let handles: Vec<_> = ["left", "right"]
            .into_iter()
            .map(|side| {
                let formatter = Arc::clone(&formatter);
                std::thread::spawn(move || {
                    for i in 0..1000 {
                        let record = LogRecord::new(Level::Info, side).field(side, i);
                        let out = parse(&formatter.format(&record).unwrap());
                        let other = if side == "left" { "right" } else { "left" };
                        assert_eq!(out[side], json!(i));
                        assert!(out.get(other).is_none());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
