//! Elasticsearch sink over HTTP.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::model::MovieDocument;

use super::schema::IndexSchema;
use super::SearchSink;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Elasticsearch sink.
pub struct ElasticsearchSink {
    client: reqwest::Client,
    base_url: String,
}

impl ElasticsearchSink {
    /// Create a sink talking to the cluster at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

/// Map a transport failure to the sink taxonomy.
fn request_error(err: &reqwest::Error) -> Error {
    if err.is_connect() || err.is_timeout() || err.is_request() {
        Error::SinkUnavailable(err.to_string())
    } else {
        Error::Sink(err.to_string())
    }
}

/// Map a non-success HTTP status to the sink taxonomy.
fn status_error(status: StatusCode, body: &str) -> Error {
    match status {
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => Error::SinkUnavailable(format!("HTTP {status}: {body}")),
        _ => Error::Sink(format!("HTTP {status}: {body}")),
    }
}

/// Build the NDJSON body for a bulk upsert.
///
/// # Errors
///
/// Returns an error if a document fails to serialize.
pub fn bulk_body(index: &str, docs: &[MovieDocument]) -> Result<String> {
    let mut body = String::new();
    for doc in docs {
        let action = json!({ "index": { "_index": index, "_id": doc.id } });
        body.push_str(&action.to_string());
        body.push('\n');
        body.push_str(&serde_json::to_string(doc)?);
        body.push('\n');
    }
    Ok(body)
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    errors: bool,
    #[serde(default)]
    items: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// Interpret a bulk response body.
///
/// The engine answers 200 even when individual items fail, so the per-item
/// status must be inspected. A rejected item is reported with its id and
/// reason; an item rejected with 429 is transient.
fn check_bulk_response(index: &str, body: &str, expected: usize) -> Result<usize> {
    let response: BulkResponse = serde_json::from_str(body)
        .map_err(|e| Error::Sink(format!("Unreadable bulk response: {e}")))?;

    if !response.errors {
        return Ok(expected);
    }

    let failed = response
        .items
        .iter()
        .filter_map(|item| item.values().next())
        .find(|result| result.get("error").is_some());

    let Some(result) = failed else {
        return Err(Error::Sink("Bulk request reported errors without details".to_string()));
    };

    let id = result["_id"].as_str().unwrap_or_default().to_string();
    let status = result["status"].as_u64().unwrap_or_default();
    let reason = match (result["error"]["type"].as_str(), result["error"]["reason"].as_str()) {
        (Some(kind), Some(reason)) => format!("{kind}: {reason}"),
        (Some(kind), None) => kind.to_string(),
        _ => result["error"].to_string(),
    };

    if status == 429 {
        return Err(Error::SinkUnavailable(format!("document {id} rejected: {reason}")));
    }
    Err(Error::SinkSchema {
        index: index.to_string(),
        id,
        reason,
    })
}

impl SearchSink for ElasticsearchSink {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        let response = self
            .client
            .head(self.url(index))
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(status_error(status, "")),
        }
    }

    async fn create_index(&self, index: &str, schema: &IndexSchema) -> Result<()> {
        let response = self
            .client
            .put(self.url(index))
            .json(&schema.body())
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(index, "created index");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && body.contains("resource_already_exists_exception") {
            tracing::debug!(index, "index created concurrently");
            return Ok(());
        }
        Err(status_error(status, &body))
    }

    async fn bulk_index(&self, index: &str, docs: &[MovieDocument]) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }

        let response = self
            .client
            .post(self.url("_bulk"))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(bulk_body(index, docs)?)
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| request_error(&e))?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        check_bulk_response(index, &body, docs.len())
    }
}
