// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote session backend.
//!
//! The backend speaks PostgREST-style HTTP: `POST /<table>` with a JSON
//! array body. Summary rows are upserted on `client_id` and sample rows on
//! `(session_id, seq)`, so replaying an interrupted upload is harmless.

use crate::error::AppError;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// Where finished sessions are uploaded.
pub trait RemoteBackend: Send + Sync {
    /// Insert (or merge) one session summary row and return its backend id.
    fn insert_session(
        &self,
        table: &str,
        row: &Value,
    ) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Insert a batch of child rows. Rows already present are ignored.
    fn insert_rows(
        &self,
        table: &str,
        rows: &[Value],
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the REST backend.
#[derive(Clone)]
pub struct RestBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct InsertedRow {
    id: Value,
}

impl RestBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn post(&self, table: &str, on_conflict: &str, prefer: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}/{}", self.base_url, table))
            .query(&[("on_conflict", on_conflict)])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", prefer)
    }

    async fn check_response(&self, response: reqwest::Response) -> Result<reqwest::Response, AppError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!("Sync backend rate limit hit (429)");
            return Err(AppError::Backend(AppError::BACKEND_RATE_LIMIT.to_string()));
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(AppError::Backend(AppError::BACKEND_AUTH_ERROR.to_string()));
        }

        Err(AppError::Backend(format!("HTTP {}: {}", status, body)))
    }
}

impl RemoteBackend for RestBackend {
    async fn insert_session(&self, table: &str, row: &Value) -> Result<String, AppError> {
        let response = self
            .post(table, "client_id", "return=representation,resolution=merge-duplicates")
            .json(&[row])
            .send()
            .await
            .map_err(|e| AppError::Backend(format!("Request failed: {}", e)))?;

        let inserted: Vec<InsertedRow> = self
            .check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Backend(format!("JSON parse error: {}", e)))?;

        // Ids may be numeric or uuid strings depending on the table
        match inserted.into_iter().next().map(|r| r.id) {
            Some(Value::String(id)) => Ok(id),
            Some(Value::Number(id)) => Ok(id.to_string()),
            _ => Err(AppError::Backend(format!("No id returned for {} insert", table))),
        }
    }

    async fn insert_rows(&self, table: &str, rows: &[Value]) -> Result<(), AppError> {
        let response = self
            .post(table, "session_id,seq", "return=minimal,resolution=ignore-duplicates")
            .json(rows)
            .send()
            .await
            .map_err(|e| AppError::Backend(format!("Request failed: {}", e)))?;

        self.check_response(response).await?;
        Ok(())
    }
}
