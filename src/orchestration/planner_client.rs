//! Client for the planner service (Agent0/Dexter): `POST /suggest`.

use crate::errors::AppError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlannerAction {
    Buy,
    Sell,
    Hold,
    Skip,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanRequest<'a> {
    pub symbol: &'a str,
    pub context: &'a str,
    pub recalled_memories: &'a [crate::domain::MemoryItem],
    pub constraints: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanStep {
    pub name: String,
    pub requires_tool: Option<String>,
    pub input: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanResponse {
    pub action: PlannerAction,
    pub confidence: f64,
    pub summary: String,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
    pub reasoning_notes: String,
}

pub struct PlannerClient {
    client: Client,
    base_url: String,
}

impl PlannerClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AppError::Fatal(format!("failed to build planner http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn classify(status: reqwest::StatusCode) -> AppError {
        if status.as_u16() == 429 || status.is_server_error() {
            AppError::Transient(format!("planner returned {status}"))
        } else {
            AppError::Fatal(format!("planner returned {status}"))
        }
    }

    pub async fn suggest(&self, request: &PlanRequest<'_>) -> Result<PlanResponse, AppError> {
        let url = format!("{}/suggest", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Transient(format!("planner request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::classify(response.status()));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Fatal(format!("malformed planner payload: {e}")))
    }
}
