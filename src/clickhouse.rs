use crate::sink::LogSink;
use async_trait::async_trait;
use reqwest::Client;
use std::error::Error;
use urlencoding;

/// Configuration for [`ClickHouseSink`].
///
/// The sink talks to ClickHouse over HTTP using the `JSONEachRow` format,
/// which accepts the newline-delimited JSON produced by the Logstash
/// formatter as-is.
#[derive(Clone, Debug)]
pub struct ClickHouseConfig {
    /// Base URL without query, e.g. "http://127.0.0.1:8123"
    pub url: String,
    pub database: String,
    pub table: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// ClickHouse implementation of [`LogSink`] using the HTTP interface.
#[derive(Clone)]
pub struct ClickHouseSink {
    client: Client,
    config: ClickHouseConfig,
    endpoint: String,
}

impl ClickHouseSink {
    /// Construct a new sink instance using the provided configuration.
    ///
    /// **Parameters**
    /// - `config`: [`ClickHouseConfig`] describing target URL, database,
    ///   table and optional authentication settings.
    ///
    /// **Returns**
    /// - A ready-to-use [`ClickHouseSink`] that can be passed into
    ///   [`Pipeline::new`](crate::pipeline::Pipeline::new) or
    ///   [`init_tracing`](crate::init::init_tracing).
    pub fn new(config: ClickHouseConfig) -> Self {
        let client = Client::new();
        let endpoint = endpoint(&config);
        Self { client, config, endpoint }
    }

    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }
}

fn endpoint(config: &ClickHouseConfig) -> String {
    // Rows carry keys such as `@version` that a table may not have columns for.
    let mut query = format!(
        "database={}&query=INSERT%20INTO%20{}%20FORMAT%20JSONEachRow&input_format_skip_unknown_fields=1",
        urlencoding::encode(&config.database),
        urlencoding::encode(&config.table)
    );

    if let Some(user) = &config.user {
        query.push_str(&format!("&user={}", urlencoding::encode(user)));
    }
    if let Some(password) = &config.password {
        query.push_str(&format!("&password={}", urlencoding::encode(password)));
    }

    format!("{}/?{}", config.url.trim_end_matches('/'), query)
}

#[async_trait]
impl LogSink for ClickHouseSink {
    async fn write(&self, payload: &[u8]) -> Result<(), Box<dyn Error + Send + Sync>> {
        let resp = self
            .client
            .post(&self.endpoint)
            .body(payload.to_vec())
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(format!("ClickHouse insert failed with status {}: {}", status, text).into())
        }
    }
}
