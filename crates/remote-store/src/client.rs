//! Client for the remote expense table.
//!
//! Speaks the PostgREST dialect used by hosted Postgres backends:
//! `GET/POST/PATCH/DELETE {base}/rest/v1/{table}` with filters in the query string.

use async_trait::async_trait;
use log::{debug, error};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

use pocketledger_core::errors::Result as CoreResult;
use pocketledger_core::transactions::{
    NewTransaction, RemoteStoreTrait, Transaction, TransactionUpdate,
};

use crate::error::{RemoteStoreError, Result};
use crate::types::{TransactionPatch, TransactionRow, TransactionRowInsert};

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TABLE: &str = "expenses";
const MAX_LOG_BODY_CHARS: usize = 512;
const PREFER: &str = "prefer";

#[derive(Debug, Clone)]
pub struct RemoteStoreConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub table: String,
    /// Column holding the client-generated id. When set, inserts become
    /// upserts on that column so a replayed entry cannot create a second row.
    pub idempotency_column: Option<String>,
    pub timeout: Duration,
}

impl RemoteStoreConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            table: DEFAULT_TABLE.to_string(),
            idempotency_column: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteStoreClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    table: String,
    idempotency_column: Option<String>,
}

impl RemoteStoreClient {
    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("[RemoteStore] Response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("[RemoteStore] Response error ({}): {}", status, preview);
    }

    pub fn new(config: RemoteStoreConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(RemoteStoreError::invalid_request("Remote store URL is empty"));
        }
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            api_key: config.api_key.filter(|k| !k.is_empty()),
            table: config.table,
            idempotency_column: config.idempotency_column.filter(|c| !c.is_empty()),
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    pub fn origin(&self) -> &str {
        &self.base_url
    }

    /// Path and query of the full listing, relative to [`Self::origin`].
    pub fn list_path(&self) -> String {
        format!("/rest/v1/{}?select=*&order=date.desc", self.table)
    }

    /// Credentials every request carries.
    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(key) = &self.api_key {
            let api_key = HeaderValue::from_str(key)
                .map_err(|_| RemoteStoreError::auth("Invalid API key format"))?;
            let bearer = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|_| RemoteStoreError::auth("Invalid API key format"))?;
            headers.insert("apikey", api_key);
            headers.insert(AUTHORIZATION, bearer);
        }
        Ok(headers)
    }

    /// Reads the body and turns a non-success status into an API error.
    async fn read_body(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }
        Ok(body)
    }

    /// Parses a listing answered by someone else, e.g. a caching layer.
    pub fn rows_from_response(status: u16, body: &[u8]) -> Result<Vec<TransactionRow>> {
        let body = String::from_utf8_lossy(body);
        if !(200..300).contains(&status) {
            return Err(api_error(status, &body));
        }
        serde_json::from_str(&body).map_err(RemoteStoreError::from)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let body = Self::read_body(response).await?;
        serde_json::from_str(&body).map_err(|e| {
            error!(
                "[RemoteStore] Failed to deserialize response. Body: {}, Error: {}",
                body, e
            );
            RemoteStoreError::from(e)
        })
    }

    /// All rows, newest date first.
    ///
    /// GET /rest/v1/{table}?select=*&order=date.desc
    pub async fn list_rows(&self) -> Result<Vec<TransactionRow>> {
        let response = self
            .client
            .get(self.table_url())
            .headers(self.headers()?)
            .query(&[("select", "*"), ("order", "date.desc")])
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Inserts one row and returns it as stored.
    ///
    /// POST /rest/v1/{table} (`Prefer: return=representation`)
    pub async fn insert_row(&self, client_id: &str, draft: &NewTransaction) -> Result<TransactionRow> {
        let mut body = serde_json::to_value(TransactionRowInsert::from(draft))?;
        let mut request = self.client.post(self.table_url()).headers(self.headers()?);

        match &self.idempotency_column {
            Some(column) => {
                if let Some(fields) = body.as_object_mut() {
                    fields.insert(column.clone(), serde_json::Value::from(client_id));
                }
                request = request
                    .query(&[("on_conflict", column.as_str())])
                    .header(PREFER, "return=representation,resolution=merge-duplicates");
            }
            None => {
                request = request.header(PREFER, "return=representation");
            }
        }

        debug!("[RemoteStore] Inserting transaction {}", client_id);
        let response = request.json(&[body]).send().await?;
        let mut rows: Vec<TransactionRow> = Self::parse_response(response).await?;
        if rows.is_empty() {
            return Err(RemoteStoreError::invalid_request(
                "Insert returned no representation",
            ));
        }
        Ok(rows.swap_remove(0))
    }

    /// PATCH /rest/v1/{table}?id=eq.{id}
    pub async fn update_row(&self, id: &str, patch: &TransactionPatch) -> Result<()> {
        let filter = format!("eq.{}", id);
        let response = self
            .client
            .patch(self.table_url())
            .headers(self.headers()?)
            .header(PREFER, "return=minimal")
            .query(&[("id", filter.as_str())])
            .json(patch)
            .send()
            .await?;

        Self::read_body(response).await?;
        Ok(())
    }

    /// DELETE /rest/v1/{table}?id=eq.{id}
    pub async fn delete_row(&self, id: &str) -> Result<()> {
        let filter = format!("eq.{}", id);
        let response = self
            .client
            .delete(self.table_url())
            .headers(self.headers()?)
            .query(&[("id", filter.as_str())])
            .send()
            .await?;

        Self::read_body(response).await?;
        Ok(())
    }

    /// Cheapest possible round trip. Any HTTP answer counts as reachable.
    pub async fn probe(&self) -> Result<()> {
        let response = self
            .client
            .get(self.table_url())
            .headers(self.headers()?)
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await?;
        debug!("[RemoteStore] Probe answered with {}", response.status());
        Ok(())
    }
}

/// PostgREST errors carry `message` (and often `details`/`hint`).
fn api_error(status: u16, body: &str) -> RemoteStoreError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| format!("Request failed: {}", body));
    RemoteStoreError::api(status, message)
}

#[async_trait]
impl RemoteStoreTrait for RemoteStoreClient {
    async fn insert(&self, client_id: &str, draft: &NewTransaction) -> CoreResult<Transaction> {
        Ok(self.insert_row(client_id, draft).await?.into())
    }

    async fn update(&self, id: &str, fields: &TransactionUpdate) -> CoreResult<()> {
        self.update_row(id, &TransactionPatch::from(fields))
            .await
            .map_err(Into::into)
    }

    async fn delete(&self, id: &str) -> CoreResult<()> {
        self.delete_row(id).await.map_err(Into::into)
    }

    async fn list_all(&self) -> CoreResult<Vec<Transaction>> {
        let rows = self.list_rows().await?;
        Ok(rows.into_iter().map(Transaction::from).collect())
    }

    async fn ping(&self) -> CoreResult<()> {
        self.probe().await.map_err(Into::into)
    }
}
