//! Neo4j HTTP source
//!
//! Talks to the transactional HTTP endpoint (`POST {uri}/db/{database}/tx/commit`).
//! Each call runs one auto-committed statement, so there is no session state to
//! keep; [`close`](SourceConnector::close) only stops further use of the client.

use super::cypher::{Query, LIMIT_PARAM, SKIP_PARAM};
use super::traits::{RawRow, SourceConnector, SourceResult};
use crate::config::SourceConfig;
use crate::domain::SourceError;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, ClientBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Serialize)]
struct TxRequest<'a> {
    statements: [&'a Query; 1],
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<DataRow>,
}

#[derive(Debug, Deserialize)]
struct DataRow {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

/// Neo4j source over HTTP
///
/// # Example
///
/// ```no_run
/// use cartograph::adapters::source::{Neo4jSource, Query, SourceConnector};
/// use cartograph::config::SourceConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let source = Neo4jSource::new(SourceConfig::default())?;
/// let rows = source.rows(&Query::label_combinations()).await?;
/// source.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Neo4jSource {
    /// Full commit URL
    endpoint: String,

    client: Client,

    /// Precomputed `Authorization` header
    auth_header: Option<String>,

    config: SourceConfig,

    closed: AtomicBool,
}

impl Neo4jSource {
    /// Build the HTTP client for the configured endpoint
    pub fn new(config: SourceConfig) -> SourceResult<Self> {
        let endpoint = format!(
            "{}/db/{}/tx/commit",
            config.uri.trim_end_matches('/'),
            config.database
        );

        let mut client_builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .connect_timeout(Duration::from_secs(30));

        if !config.tls_verify {
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder
            .build()
            .map_err(|e| SourceError::ConnectionFailed(format!("Failed to build HTTP client: {e}")))?;

        let auth_header = Self::auth_header_value(&config);
        if auth_header.is_none() {
            tracing::warn!("No source password configured, attempting anonymous access");
        }

        Ok(Self {
            endpoint,
            client,
            auth_header,
            config,
            closed: AtomicBool::new(false),
        })
    }

    /// Basic auth header from the configured credentials
    fn auth_header_value(config: &SourceConfig) -> Option<String> {
        let password = config.password.as_ref()?;
        let credentials = format!(
            "{}:{}",
            config.username,
            password.expose_secret().as_ref()
        );
        let encoded = general_purpose::STANDARD.encode(credentials.as_bytes());
        Some(format!("Basic {encoded}"))
    }

    /// Runs a statement, retrying transient failures within the transaction retry budget
    async fn run(&self, query: &Query) -> SourceResult<Vec<RawRow>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SourceError::Closed);
        }

        let budget = Duration::from_millis(self.config.max_transaction_retry_ms);
        let max_attempts = self.config.retry.max_retries;
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.execute(query).await {
                Ok(rows) => return Ok(rows),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = Duration::from_millis(self.config.retry.delay_ms(attempt));
                    if started.elapsed() + delay > budget {
                        return Err(e);
                    }
                    crate::log_retry_attempt!(attempt, max_attempts, &e);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Single request against the commit endpoint
    async fn execute(&self, query: &Query) -> SourceResult<Vec<RawRow>> {
        tracing::trace!(statement = %query.text, "Executing statement");

        let body = TxRequest { statements: [query] };
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&body);

        if let Some(ref auth) = self.auth_header {
            request = request.header("Authorization", auth);
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout(e.to_string())
            } else {
                SourceError::ConnectionFailed(e.to_string())
            }
        })?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SourceError::AuthenticationFailed(format!(
                "{} rejected credentials with status {status}",
                self.endpoint
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::QueryFailed {
                code: format!("HTTP {}", status.as_u16()),
                message: body,
            });
        }

        let parsed: TxResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

        if let Some(error) = parsed.errors.into_iter().next() {
            return Err(SourceError::QueryFailed {
                code: error.code,
                message: error.message,
            });
        }

        let result = parsed
            .results
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::InvalidResponse("response carried no results".into()))?;

        Ok(result
            .data
            .into_iter()
            .map(|data| result.columns.iter().cloned().zip(data.row).collect())
            .collect())
    }
}

#[async_trait]
impl SourceConnector for Neo4jSource {
    async fn count(&self, query: &Query) -> SourceResult<u64> {
        let rows = self.run(query).await?;
        let row = rows
            .first()
            .ok_or_else(|| SourceError::InvalidResponse("count query returned no rows".into()))?;

        row.get("count")
            .or_else(|| row.values().next())
            .and_then(Value::as_u64)
            .ok_or_else(|| SourceError::InvalidResponse("count column is not an integer".into()))
    }

    async fn page(&self, query: &Query, skip: u64, limit: u64) -> SourceResult<Vec<RawRow>> {
        let bound = query
            .clone()
            .with_param(SKIP_PARAM, skip)
            .with_param(LIMIT_PARAM, limit);
        self.run(&bound).await
    }

    async fn rows(&self, query: &Query) -> SourceResult<Vec<RawRow>> {
        self.run(query).await
    }

    async fn close(&self) -> SourceResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::info!(endpoint = %self.endpoint, "Source connection closed");
        }
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
