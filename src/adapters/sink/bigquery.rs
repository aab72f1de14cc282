//! BigQuery REST sink
//!
//! Datasets and tables are created through the v2 REST API; tables are created
//! without a schema and take the one detected on their first load. Each staged
//! file is sent as a `multipart/related` upload that starts a load job, which is
//! then polled until it reaches `DONE`.
//!
//! A job id is uploaded at most once. When a caller retries a job id this sink
//! already submitted, or the insert answers 409, the existing job is polled
//! instead of appending the file a second time.

use super::traits::{DatasetHandle, LoadResult, SinkConnector, SinkResult, TableHandle};
use crate::config::SinkConfig;
use crate::core::staging::StagedBatch;
use crate::domain::{DatasetId, SinkError, TableId};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    #[serde(default)]
    status: JobStatus,
    #[serde(default)]
    statistics: Option<JobStatistics>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    #[serde(default)]
    state: String,
    #[serde(default)]
    error_result: Option<ErrorProto>,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct JobStatistics {
    load: Option<LoadStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadStatistics {
    output_rows: Option<String>,
}

/// BigQuery sink
///
/// # Example
///
/// ```no_run
/// use cartograph::adapters::sink::{BigQuerySink, SinkConnector};
/// use cartograph::config::{secret_string, SinkConfig};
/// use cartograph::domain::DatasetId;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SinkConfig {
///     project_id: "analytics-prod".to_string(),
///     access_token: Some(secret_string("ya29.token".to_string())),
///     ..SinkConfig::default()
/// };
/// let sink = BigQuerySink::new(config)?;
/// let dataset = sink.create_dataset(&DatasetId::new("graph_export")?).await?;
/// # Ok(())
/// # }
/// ```
pub struct BigQuerySink {
    client: Client,
    auth_header: String,
    config: SinkConfig,
    /// Jobs accepted by BigQuery that have not reached `DONE` yet
    submitted: Mutex<HashSet<String>>,
}

impl BigQuerySink {
    pub fn new(config: SinkConfig) -> SinkResult<Self> {
        let token = config.access_token.as_ref().ok_or_else(|| {
            SinkError::AuthenticationFailed("sink.access_token is not configured".to_string())
        })?;
        let auth_header = format!("Bearer {}", token.expose_secret().as_ref());

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SinkError::ConnectionFailed(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            auth_header,
            config,
            submitted: Mutex::new(HashSet::new()),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/projects/{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.project_id,
            path
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Authorization", &self.auth_header)
    }

    async fn send(request: RequestBuilder) -> SinkResult<Response> {
        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SinkError::Timeout(e.to_string())
            } else {
                SinkError::ConnectionFailed(e.to_string())
            }
        })?;

        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let body = resp.text().await.unwrap_or_default();
                Err(SinkError::AuthenticationFailed(body))
            }
            _ => Ok(resp),
        }
    }

    fn table_handle(dataset: &DatasetHandle, table: &TableId) -> TableHandle {
        TableHandle {
            project: dataset.project.clone(),
            dataset: dataset.dataset.clone(),
            table: table.clone(),
        }
    }

    /// Load job configuration for one staged file
    fn load_job_body(&self, table: &TableHandle, job_id: &str, is_first: bool) -> Value {
        let mut job_reference = json!({
            "projectId": self.config.project_id,
            "jobId": job_id,
        });
        if let Some(ref location) = self.config.location {
            job_reference["location"] = json!(location);
        }

        json!({
            "jobReference": job_reference,
            "configuration": {
                "load": {
                    "destinationTable": {
                        "projectId": table.project,
                        "datasetId": table.dataset.as_str(),
                        "tableId": table.table.as_str(),
                    },
                    "sourceFormat": "CSV",
                    "skipLeadingRows": 1,
                    "allowJaggedRows": true,
                    "allowQuotedNewlines": true,
                    "writeDisposition": "WRITE_APPEND",
                    "createDisposition": "CREATE_IF_NEEDED",
                    "autodetect": is_first,
                }
            }
        })
    }

    fn is_submitted(&self, job_id: &str) -> bool {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(job_id)
    }

    fn mark_submitted(&self, job_id: &str, submitted: bool) {
        let mut jobs = self.submitted.lock().unwrap_or_else(PoisonError::into_inner);
        if submitted {
            jobs.insert(job_id.to_string());
        } else {
            jobs.remove(job_id);
        }
    }

    /// Upload the file and start its load job
    async fn submit(
        &self,
        table: &TableHandle,
        staged: &StagedBatch,
        job_id: &str,
        is_first: bool,
    ) -> SinkResult<Job> {
        let metadata = self.load_job_body(table, job_id, is_first);

        let media = tokio::fs::read(&staged.path).await.map_err(|e| SinkError::LoadFailed {
            table: table.to_string(),
            job_id: job_id.to_string(),
            detail: format!("cannot read {}: {e}", staged.path.display()),
        })?;

        let boundary = format!("cartograph-{}", Uuid::new_v4().simple());
        let body = multipart_related(&boundary, &metadata, &media);
        let url = format!(
            "{}/projects/{}/jobs?uploadType=multipart",
            self.config.upload_base_url.trim_end_matches('/'),
            self.config.project_id
        );

        let request = self
            .client
            .post(url)
            .header(
                "Content-Type",
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body);
        let resp = Self::send(self.authorized(request)).await?;

        if resp.status() == StatusCode::CONFLICT {
            tracing::info!(table = %table, job_id, "Load job already submitted, polling it");
            self.mark_submitted(job_id, true);
            return self.fetch_job(table, job_id).await;
        }

        let job = self.parse_job(table, job_id, resp).await?;
        self.mark_submitted(job_id, true);
        Ok(job)
    }

    async fn fetch_job(&self, table: &TableHandle, job_id: &str) -> SinkResult<Job> {
        let mut url = self.api_url(&format!("jobs/{job_id}"));
        if let Some(ref location) = self.config.location {
            url = format!("{url}?location={location}");
        }
        let resp = Self::send(self.authorized(self.client.get(&url))).await?;
        self.parse_job(table, job_id, resp).await
    }

    /// Wait for a job to reach `DONE`
    ///
    /// Polls at least once before giving up on `load_timeout_seconds`.
    async fn await_job(&self, table: &TableHandle, job_id: &str, mut job: Job) -> SinkResult<Job> {
        let deadline = Instant::now() + Duration::from_secs(self.config.load_timeout_seconds);
        let poll = Duration::from_millis(self.config.poll_interval_ms);

        while job.status.state != "DONE" {
            tokio::time::sleep(poll).await;
            job = self.fetch_job(table, job_id).await?;
            tracing::trace!(job_id, state = %job.status.state, "Polled load job");

            if job.status.state != "DONE" && Instant::now() >= deadline {
                return Err(SinkError::Timeout(format!(
                    "load job {job_id} into {table} not done after {}s",
                    self.config.load_timeout_seconds
                )));
            }
        }

        Ok(job)
    }

    async fn parse_job(&self, table: &TableHandle, job_id: &str, resp: Response) -> SinkResult<Job> {
        let status = resp.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            let body = resp.text().await.unwrap_or_default();
            return Err(SinkError::ConnectionFailed(format!("HTTP {status}: {body}")));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SinkError::LoadFailed {
                table: table.to_string(),
                job_id: job_id.to_string(),
                detail: format!("HTTP {status}: {body}"),
            });
        }
        resp.json()
            .await
            .map_err(|e| SinkError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl SinkConnector for BigQuerySink {
    async fn create_dataset(&self, name: &DatasetId) -> SinkResult<DatasetHandle> {
        let mut body = json!({
            "datasetReference": {
                "projectId": self.config.project_id,
                "datasetId": name.as_str(),
            }
        });
        if let Some(ref location) = self.config.location {
            body["location"] = json!(location);
        }

        let resp = Self::send(self.authorized(self.client.post(self.api_url("datasets")).json(&body))).await?;
        let status = resp.status();

        if status == StatusCode::CONFLICT {
            tracing::info!(dataset = %name, "Dataset already exists");
        } else if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SinkError::DatasetCreationFailed {
                dataset: name.to_string(),
                message: format!("HTTP {status}: {message}"),
            });
        } else {
            tracing::info!(dataset = %name, project = %self.config.project_id, "Dataset created");
        }

        Ok(DatasetHandle {
            project: self.config.project_id.clone(),
            dataset: name.clone(),
        })
    }

    async fn create_table(&self, dataset: &DatasetHandle, table: &TableId) -> SinkResult<TableHandle> {
        let body = json!({
            "tableReference": {
                "projectId": dataset.project,
                "datasetId": dataset.dataset.as_str(),
                "tableId": table.as_str(),
            }
        });
        let url = self.api_url(&format!("datasets/{}/tables", dataset.dataset));

        let resp = Self::send(self.authorized(self.client.post(url).json(&body))).await?;
        let status = resp.status();

        if status == StatusCode::CONFLICT {
            tracing::debug!(table = %table, "Table already exists");
        } else if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SinkError::TableCreationFailed {
                table: table.to_string(),
                message: format!("HTTP {status}: {message}"),
            });
        }

        Ok(Self::table_handle(dataset, table))
    }

    async fn load(
        &self,
        table: &TableHandle,
        staged: &StagedBatch,
        job_id: &str,
        is_first: bool,
    ) -> SinkResult<LoadResult> {
        let job = if self.is_submitted(job_id) {
            tracing::debug!(table = %table, job_id, "Resuming submitted load job");
            self.fetch_job(table, job_id).await?
        } else {
            self.submit(table, staged, job_id, is_first).await?
        };
        let job = self.await_job(table, job_id, job).await?;
        self.mark_submitted(job_id, false);

        if let Some(error) = job.status.error_result {
            let mut detail = format!("{}: {}", error.reason, error.message);
            for extra in &job.status.errors {
                detail.push_str(&format!("; {}", extra.message));
            }
            return Err(SinkError::LoadFailed {
                table: table.to_string(),
                job_id: job_id.to_string(),
                detail,
            });
        }

        let rows_loaded = job
            .statistics
            .and_then(|s| s.load)
            .and_then(|l| l.output_rows)
            .and_then(|rows| rows.parse().ok())
            .unwrap_or(staged.rows as u64);

        tracing::debug!(table = %table, job_id = %job_id, rows_loaded, "Load job done");

        Ok(LoadResult {
            job_id: job_id.to_string(),
            rows_loaded,
        })
    }

    fn describe(&self) -> String {
        format!("bigquery:{}", self.config.project_id)
    }
}

/// Assembles a two-part `multipart/related` body: JSON metadata, then CSV media
fn multipart_related(boundary: &str, metadata: &Value, media: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(media.len() + 1024);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n--{boundary}\r\nContent-Type: text/csv\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{secret_string, RetryConfig};
    use mockito::Matcher;
    use std::io::Write;

    fn config(url: &str) -> SinkConfig {
        SinkConfig {
            project_id: "proj".into(),
            access_token: Some(secret_string("tok".into())),
            api_base_url: url.to_string(),
            upload_base_url: format!("{url}/upload"),
            poll_interval_ms: 1,
            load_timeout_seconds: 5,
            retry: RetryConfig::default(),
            ..SinkConfig::default()
        }
    }

    fn dataset() -> DatasetHandle {
        DatasetHandle {
            project: "proj".into(),
            dataset: DatasetId::new("ds").unwrap(),
        }
    }

    fn staged(dir: &tempfile::TempDir) -> StagedBatch {
        let path = dir.path().join("Person-batch-0.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"__id,name\n1,Ada\n").unwrap();
        StagedBatch {
            path,
            batch_index: 0,
            rows: 1,
            columns: vec!["__id".into(), "name".into()],
        }
    }

    #[test]
    fn test_requires_token() {
        let config = SinkConfig {
            access_token: None,
            ..config("http://localhost")
        };
        assert!(matches!(
            BigQuerySink::new(config),
            Err(SinkError::AuthenticationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_create_dataset_conflict_is_ok() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/projects/proj/datasets")
            .match_header("authorization", "Bearer tok")
            .with_status(409)
            .create_async()
            .await;

        let sink = BigQuerySink::new(config(&server.url())).unwrap();
        let handle = sink
            .create_dataset(&DatasetId::new("ds").unwrap())
            .await
            .unwrap();

        assert_eq!(handle.dataset.as_str(), "ds");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_table_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/projects/proj/datasets/ds/tables")
            .with_status(400)
            .with_body("invalid")
            .create_async()
            .await;

        let sink = BigQuerySink::new(config(&server.url())).unwrap();
        let err = sink
            .create_table(&dataset(), &TableId::new("Person").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::TableCreationFailed { .. }));
    }

    #[tokio::test]
    async fn test_load_polls_until_done() {
        let mut server = mockito::Server::new_async().await;
        let insert = server
            .mock("POST", "/upload/projects/proj/jobs")
            .match_query(Matcher::UrlEncoded("uploadType".into(), "multipart".into()))
            .match_body(Matcher::Regex("\"autodetect\":true".into()))
            .with_status(200)
            .with_body(r#"{"status":{"state":"RUNNING"}}"#)
            .create_async()
            .await;
        let poll = server
            .mock("GET", Matcher::Regex(r"^/projects/proj/jobs/cartograph_".into()))
            .with_status(200)
            .with_body(r#"{"status":{"state":"DONE"},"statistics":{"load":{"outputRows":"1"}}}"#)
            .create_async()
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let sink = BigQuerySink::new(config(&server.url())).unwrap();
        let table = BigQuerySink::table_handle(&dataset(), &TableId::new("Person").unwrap());
        let result = sink
            .load(&table, &staged(&dir), "cartograph_Person_0_a1", true)
            .await
            .unwrap();

        assert_eq!(result.rows_loaded, 1);
        assert_eq!(result.job_id, "cartograph_Person_0_a1");
        insert.assert_async().await;
        poll.assert_async().await;
    }

    #[tokio::test]
    async fn test_load_error_result_carries_job_id() {
        let mut server = mockito::Server::new_async().await;
        let _insert = server
            .mock("POST", "/upload/projects/proj/jobs")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"status":{"state":"DONE","errorResult":{"reason":"invalid","message":"Too many errors"}}}"#,
            )
            .create_async()
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let sink = BigQuerySink::new(config(&server.url())).unwrap();
        let table = BigQuerySink::table_handle(&dataset(), &TableId::new("Person").unwrap());
        let err = sink
            .load(&table, &staged(&dir), "cartograph_Person_0_b2", false)
            .await
            .unwrap_err();

        assert!(!err.is_transient());
        match err {
            SinkError::LoadFailed { job_id, detail, .. } => {
                assert_eq!(job_id, "cartograph_Person_0_b2");
                assert!(detail.contains("Too many errors"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_retry_after_timeout_polls_instead_of_uploading() {
        let mut server = mockito::Server::new_async().await;
        let insert = server
            .mock("POST", "/upload/projects/proj/jobs")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":{"state":"RUNNING"}}"#)
            .expect(1)
            .create_async()
            .await;
        let running = server
            .mock("GET", "/projects/proj/jobs/job_slow")
            .with_status(200)
            .with_body(r#"{"status":{"state":"RUNNING"}}"#)
            .create_async()
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let sink = BigQuerySink::new(SinkConfig {
            load_timeout_seconds: 0,
            ..config(&server.url())
        })
        .unwrap();
        let table = BigQuerySink::table_handle(&dataset(), &TableId::new("Person").unwrap());
        let batch = staged(&dir);

        let err = sink.load(&table, &batch, "job_slow", true).await.unwrap_err();
        assert!(matches!(err, SinkError::Timeout(_)));
        assert!(err.is_transient());

        running.remove_async().await;
        let done = server
            .mock("GET", "/projects/proj/jobs/job_slow")
            .with_status(200)
            .with_body(r#"{"status":{"state":"DONE"},"statistics":{"load":{"outputRows":"1"}}}"#)
            .create_async()
            .await;

        let result = sink.load(&table, &batch, "job_slow", true).await.unwrap();
        assert_eq!(result.rows_loaded, 1);
        insert.assert_async().await;
        done.assert_async().await;
    }

    #[tokio::test]
    async fn test_poll_server_error_is_transient_and_resumable() {
        let mut server = mockito::Server::new_async().await;
        let insert = server
            .mock("POST", "/upload/projects/proj/jobs")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":{"state":"PENDING"}}"#)
            .expect(1)
            .create_async()
            .await;
        let unavailable = server
            .mock("GET", "/projects/proj/jobs/job_flaky")
            .with_status(503)
            .create_async()
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let sink = BigQuerySink::new(config(&server.url())).unwrap();
        let table = BigQuerySink::table_handle(&dataset(), &TableId::new("Person").unwrap());
        let batch = staged(&dir);

        let err = sink.load(&table, &batch, "job_flaky", false).await.unwrap_err();
        assert!(matches!(err, SinkError::ConnectionFailed(_)));

        unavailable.remove_async().await;
        let _done = server
            .mock("GET", "/projects/proj/jobs/job_flaky")
            .with_status(200)
            .with_body(r#"{"status":{"state":"DONE"}}"#)
            .create_async()
            .await;

        let result = sink.load(&table, &batch, "job_flaky", false).await.unwrap();
        assert_eq!(result.rows_loaded, 1);
        insert.assert_async().await;
    }

    #[tokio::test]
    async fn test_insert_conflict_polls_existing_job() {
        let mut server = mockito::Server::new_async().await;
        let insert = server
            .mock("POST", "/upload/projects/proj/jobs")
            .match_query(Matcher::Any)
            .with_status(409)
            .with_body(r#"{"error":{"message":"Already Exists: Job proj:job_dup"}}"#)
            .expect(1)
            .create_async()
            .await;
        let existing = server
            .mock("GET", "/projects/proj/jobs/job_dup")
            .with_status(200)
            .with_body(r#"{"status":{"state":"DONE"},"statistics":{"load":{"outputRows":"1"}}}"#)
            .create_async()
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let sink = BigQuerySink::new(config(&server.url())).unwrap();
        let table = BigQuerySink::table_handle(&dataset(), &TableId::new("Person").unwrap());

        let result = sink.load(&table, &staged(&dir), "job_dup", false).await.unwrap();

        assert_eq!(result.job_id, "job_dup");
        assert_eq!(result.rows_loaded, 1);
        insert.assert_async().await;
        existing.assert_async().await;
    }

    #[test]
    fn test_load_job_body_flags() {
        let sink = BigQuerySink::new(config("http://localhost")).unwrap();
        let table = BigQuerySink::table_handle(&dataset(), &TableId::new("Person").unwrap());
        let body = sink.load_job_body(&table, "job-1", false);
        let load = &body["configuration"]["load"];

        assert_eq!(load["autodetect"], false);
        assert_eq!(load["skipLeadingRows"], 1);
        assert_eq!(load["writeDisposition"], "WRITE_APPEND");
        assert_eq!(load["createDisposition"], "CREATE_IF_NEEDED");
        assert_eq!(load["destinationTable"]["tableId"], "Person");
    }

    #[test]
    fn test_multipart_related_layout() {
        let body = multipart_related("b", &json!({"a": 1}), b"x,y\n");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("--b\r\nContent-Type: application/json"));
        assert!(text.contains("{\"a\":1}"));
        assert!(text.contains("text/csv\r\n\r\nx,y\n"));
        assert!(text.ends_with("--b--\r\n"));
    }
}
