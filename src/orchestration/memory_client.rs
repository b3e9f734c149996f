//! Client for the episodic-memory backend: recall, retain, reflect.

use crate::domain::MemoryItem;
use crate::errors::AppError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
struct RecallRequest<'a> {
    banks: &'a [&'a str],
    symbol: &'a str,
    limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct RecallResponse {
    items: Vec<MemoryItem>,
}

#[derive(Debug, Clone, Serialize)]
struct RetainRequest<'a> {
    bank: &'a str,
    item: &'a MemoryItem,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReflectRequest {
    pub from: chrono::DateTime<chrono::Utc>,
    pub to: chrono::DateTime<chrono::Utc>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReflectResponse {
    pub beliefs: Vec<MemoryItem>,
}

pub struct MemoryClient {
    client: Client,
    base_url: String,
}

impl MemoryClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AppError::Fatal(format!("failed to build memory http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn classify(status: reqwest::StatusCode) -> AppError {
        if status.as_u16() == 429 || status.is_server_error() {
            AppError::Transient(format!("memory service returned {status}"))
        } else {
            AppError::Fatal(format!("memory service returned {status}"))
        }
    }

    /// Queries `banks` filtered by symbol and recency, capped at `limit`,
    /// deduped by id.
    pub async fn recall(&self, banks: &[&str], symbol: &str, limit: u32) -> Result<Vec<MemoryItem>, AppError> {
        let url = format!("{}/memory/recall", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&RecallRequest { banks, symbol, limit })
            .send()
            .await
            .map_err(|e| AppError::Transient(format!("recall request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::classify(response.status()));
        }

        let parsed: RecallResponse = response
            .json()
            .await
            .map_err(|e| AppError::Fatal(format!("malformed recall payload: {e}")))?;

        let mut seen = std::collections::HashSet::new();
        let mut deduped = Vec::with_capacity(parsed.items.len());
        for item in parsed.items {
            if let Some(id) = &item.id {
                if !seen.insert(id.clone()) {
                    continue;
                }
            }
            deduped.push(item);
            if deduped.len() as u32 == limit {
                break;
            }
        }
        Ok(deduped)
    }

    pub async fn retain(&self, bank: &str, item: &MemoryItem) -> Result<(), AppError> {
        let url = format!("{}/memory/retain", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&RetainRequest { bank, item })
            .send()
            .await
            .map_err(|e| AppError::Transient(format!("retain request failed: {e}")))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::classify(response.status()))
        }
    }

    pub async fn reflect(
        &self,
        from: chrono::DateTime<chrono::Utc>,
        to: chrono::DateTime<chrono::Utc>,
        dry_run: bool,
    ) -> Result<ReflectResponse, AppError> {
        let url = format!("{}/memory/reflect", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&ReflectRequest { from, to, dry_run })
            .send()
            .await
            .map_err(|e| AppError::Transient(format!("reflect request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::classify(response.status()));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Fatal(format!("malformed reflect payload: {e}")))
    }
}
