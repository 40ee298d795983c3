use std::sync::Arc;

use crate::sink::LogSink;

/// Supported backend kinds that can be selected via DSN or config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Clickhouse,
    Tcp,
    File,
    Stdout,
    Noop,
}

/// High-level backend configuration built from a DSN.
///
/// Stores the target kind, the raw DSN and the scheme-less remainder
/// (`host:port`, a path, or a base URL depending on the kind).
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Selected backend implementation.
    pub kind: BackendKind,
    /// Raw DSN that was used to construct this config.
    pub dsn: String,
    /// DSN with the scheme stripped.
    pub target: String,
}

impl BackendConfig {
    pub fn new(kind: BackendKind, dsn: impl Into<String>, target: impl Into<String>) -> Self {
        BackendConfig { kind, dsn: dsn.into(), target: target.into() }
    }
}

/// Parse a DSN string and infer the backend kind from its scheme.
///
/// Examples:
/// - "tcp://logstash.internal:5000"
/// - "file:///var/log/app/events.json"
/// - "clickhouse://127.0.0.1:8123/default/logs"
/// - "stdout://"
/// - "noop://"
pub fn parse_dsn(dsn: &str) -> Result<BackendConfig, DsnError> {
    let (scheme, rest) = dsn.split_once("://").ok_or(DsnError::MissingScheme)?;

    let kind = match scheme.to_ascii_lowercase().as_str() {
        "clickhouse" => BackendKind::Clickhouse,
        "tcp" => BackendKind::Tcp,
        "file" => BackendKind::File,
        "stdout" => BackendKind::Stdout,
        "noop" => BackendKind::Noop,
        _ => return Err(DsnError::UnknownScheme(scheme.to_string())),
    };

    let needs_target = matches!(kind, BackendKind::Clickhouse | BackendKind::Tcp | BackendKind::File);
    if needs_target && rest.is_empty() {
        return Err(DsnError::MissingTarget(kind));
    }

    Ok(BackendConfig::new(kind, dsn, rest))
}

/// Error type returned when parsing a DSN.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DsnError {
    #[error("DSN has no `scheme://` prefix")]
    MissingScheme,

    #[error("unknown or unsupported DSN scheme `{0}`")]
    UnknownScheme(String),

    #[error("DSN for {0:?} backend has no address or path")]
    MissingTarget(BackendKind),
}

/// Error type returned when building a backend sink from configuration.
#[derive(thiserror::Error, Debug)]
pub enum BackendBuildError {
    #[error("clickhouse feature is not enabled")]
    ClickhouseFeatureDisabled,

    #[error("failed to open {kind:?} sink: {source}")]
    Io {
        kind: BackendKind,
        #[source]
        source: std::io::Error,
    },
}

/// Create a concrete `LogSink` implementation from a `BackendConfig`.
///
/// This is the main entry point for applications that want to select
/// a backend using a single DSN string instead of constructing sinks
/// manually.
pub async fn make_sink_from_config(cfg: &BackendConfig) -> Result<Arc<dyn LogSink>, BackendBuildError> {
    match cfg.kind {
        BackendKind::Clickhouse => {
            #[cfg(feature = "clickhouse")]
            {
                use crate::clickhouse::{ClickHouseConfig, ClickHouseSink};

                // Expect DSN format: clickhouse://host:port[/database[/table]]
                let mut parts = cfg.target.splitn(3, '/');
                let host = parts.next().unwrap_or("localhost:8123");
                let database = parts.next().filter(|s| !s.is_empty()).unwrap_or("default");
                let table = parts.next().filter(|s| !s.is_empty()).unwrap_or("logs");

                let config = ClickHouseConfig {
                    url: format!("http://{}", host),
                    database: database.to_string(),
                    table: table.to_string(),
                    user: None,
                    password: None,
                };

                Ok(Arc::new(ClickHouseSink::new(config)) as Arc<dyn LogSink>)
            }

            #[cfg(not(feature = "clickhouse"))]
            {
                let _ = cfg; // silence unused warning when feature is disabled
                Err(BackendBuildError::ClickhouseFeatureDisabled)
            }
        }
        BackendKind::Tcp => {
            use crate::writer_sink::WriterSink;

            let sink = WriterSink::tcp(cfg.target.as_str())
                .await
                .map_err(|source| BackendBuildError::Io { kind: cfg.kind, source })?;
            Ok(Arc::new(sink) as Arc<dyn LogSink>)
        }
        BackendKind::File => {
            use crate::writer_sink::WriterSink;

            let sink = WriterSink::append_file(&cfg.target)
                .await
                .map_err(|source| BackendBuildError::Io { kind: cfg.kind, source })?;
            Ok(Arc::new(sink) as Arc<dyn LogSink>)
        }
        BackendKind::Stdout => Ok(Arc::new(crate::writer_sink::WriterSink::stdout()) as Arc<dyn LogSink>),
        BackendKind::Noop => Ok(Arc::new(crate::noop_sink::NoopSink) as Arc<dyn LogSink>),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_schemes() {
        let cfg = parse_dsn("tcp://logstash.internal:5000").unwrap();
        assert_eq!(cfg.kind, BackendKind::Tcp);
        assert_eq!(cfg.target, "logstash.internal:5000");

        let cfg = parse_dsn("FILE:///var/log/app.json").unwrap();
        assert_eq!(cfg.kind, BackendKind::File);
        assert_eq!(cfg.target, "/var/log/app.json");

        assert_eq!(parse_dsn("clickhouse://ch:8123/db/t").unwrap().kind, BackendKind::Clickhouse);
        assert_eq!(parse_dsn("stdout://").unwrap().kind, BackendKind::Stdout);
        assert_eq!(parse_dsn("noop://").unwrap().kind, BackendKind::Noop);
    }

    #[test]
    fn rejects_bad_dsns() {
        assert_eq!(parse_dsn("localhost:5000").unwrap_err(), DsnError::MissingScheme);
        assert_eq!(
            parse_dsn("kafka://broker/topic").unwrap_err(),
            DsnError::UnknownScheme("kafka".to_string())
        );
        assert_eq!(parse_dsn("tcp://").unwrap_err(), DsnError::MissingTarget(BackendKind::Tcp));
    }

    #[tokio::test]
    async fn builds_file_sink() {
        let path = std::env::temp_dir().join(format!("tracing-logstash-backend-{}.log", std::process::id()));
        let cfg = parse_dsn(&format!("file://{}", path.display())).unwrap();

        let sink = make_sink_from_config(&cfg).await.unwrap();
        sink.write(b"{\"message\":\"hi\"}\n").await.unwrap();
        sink.flush().await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let _ = tokio::fs::remove_file(&path).await;
        assert_eq!(content, "{\"message\":\"hi\"}\n");
    }

    #[tokio::test]
    async fn tcp_sink_reports_connection_failure() {
        // Port 1 on localhost is essentially never listening.
        let cfg = parse_dsn("tcp://127.0.0.1:1").unwrap();
        let err = make_sink_from_config(&cfg).await.err().unwrap();
        assert!(matches!(err, BackendBuildError::Io { kind: BackendKind::Tcp, .. }));
    }
}
