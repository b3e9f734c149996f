//! Tool execution for orchestration plan steps.

use crate::domain::ToolRun;
use crate::errors::AppError;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn invoke(&self, name: &str, input: &serde_json::Value) -> Result<serde_json::Value, AppError>;
}

fn classify(status: StatusCode) -> Option<AppError> {
    if status.is_success() {
        return None;
    }
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Some(AppError::Transient(format!("tool call returned {status}")))
    } else {
        Some(AppError::Fatal(format!("tool call returned {status}")))
    }
}

#[derive(Serialize)]
struct ToolRequest<'a> {
    tool: &'a str,
    input: &'a serde_json::Value,
}

#[derive(serde::Deserialize)]
struct ToolResponse {
    output: serde_json::Value,
}

/// Calls the research-tools service's `POST /tools` endpoint.
pub struct HttpToolRunner {
    client: Client,
    base_url: String,
}

impl HttpToolRunner {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AppError::Fatal(format!("failed to build tool http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl ToolRunner for HttpToolRunner {
    async fn invoke(&self, name: &str, input: &serde_json::Value) -> Result<serde_json::Value, AppError> {
        let response = self
            .client
            .post(format!("{}/tools", self.base_url))
            .json(&ToolRequest { tool: name, input })
            .send()
            .await
            .map_err(|e| AppError::Transient(e.to_string()))?;

        if let Some(err) = classify(response.status()) {
            return Err(err);
        }

        let body: ToolResponse = response
            .json()
            .await
            .map_err(|e| AppError::Fatal(format!("invalid tool response: {e}")))?;
        Ok(body.output)
    }
}

/// Runs each requested step's tool and collects a `ToolRun` record whether it
/// succeeds or fails; a failing tool does not abort the remaining steps.
pub async fn run_steps(
    runner: &dyn ToolRunner,
    steps: &[crate::orchestration::planner_client::PlanStep],
) -> Vec<ToolRun> {
    let mut runs = Vec::new();
    for step in steps {
        let Some(tool_name) = &step.requires_tool else {
            continue;
        };
        let input = step.input.clone().unwrap_or(serde_json::Value::Null);
        let started_at = Utc::now();
        let result = runner.invoke(tool_name, &input).await;
        let completed_at = Some(Utc::now());
        runs.push(match result {
            Ok(output) => ToolRun {
                name: tool_name.clone(),
                input,
                output: Some(output),
                started_at,
                completed_at,
                error: None,
            },
            Err(err) => ToolRun {
                name: tool_name.clone(),
                input,
                output: None,
                started_at,
                completed_at,
                error: Some(err.to_string()),
            },
        });
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::planner_client::PlanStep;

    struct EchoTool;

    #[async_trait]
    impl ToolRunner for EchoTool {
        async fn invoke(&self, _name: &str, input: &serde_json::Value) -> Result<serde_json::Value, AppError> {
            Ok(input.clone())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl ToolRunner for FailingTool {
        async fn invoke(&self, _name: &str, _input: &serde_json::Value) -> Result<serde_json::Value, AppError> {
            Err(AppError::Transient("boom".into()))
        }
    }

    #[tokio::test]
    async fn steps_without_tools_are_skipped() {
        let steps = vec![PlanStep {
            name: "reason".into(),
            requires_tool: None,
            input: None,
        }];
        let runs = run_steps(&EchoTool, &steps).await;
        assert!(runs.is_empty());
    }

    #[tokio::test]
    async fn a_failing_tool_is_recorded_but_does_not_panic() {
        let steps = vec![PlanStep {
            name: "compare".into(),
            requires_tool: Some("comparator".into()),
            input: Some(serde_json::json!({"a": 1})),
        }];
        let runs = run_steps(&FailingTool, &steps).await;
        assert_eq!(runs.len(), 1);
        assert!(runs[0].error.is_some());
        assert!(runs[0].output.is_none());
    }
}
