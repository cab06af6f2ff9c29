//! # Cromwell Client
//!
//! HTTP implementation of [`ExecutionEngine`] against the Cromwell workflows API.
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | batch submit | `POST /api/workflows/v1/batch` (multipart) |
//! | run summary | `GET /api/workflows/v1/query?id=...` |
//! | outputs | `GET /api/workflows/v1/{id}/outputs` |
//! | failures | `GET /api/workflows/v1/{id}/metadata?includeKey=failures` |
//! | abort | `POST /api/workflows/v1/{id}/abort` |

use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::{multipart::Form, Client, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::auth::BearerToken;
use super::engine::{
    compose_failure_message, EngineError, EngineRunSummary, ExecutionEngine, FailureMessage,
    WorkflowIdAndStatus,
};
use crate::config::EngineConfig;
use crate::constants::system;

const WORKFLOWS_API: &str = "api/workflows/v1/";

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<EngineRunSummary>,
}

#[derive(Debug, Deserialize)]
struct OutputsResponse {
    #[serde(default)]
    outputs: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct FailuresMetadata {
    #[serde(default)]
    failures: Vec<FailureMessage>,
}

#[derive(Clone)]
pub struct CromwellClient {
    client: Client,
    base_url: Url,
}

impl std::fmt::Debug for CromwellClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CromwellClient")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl CromwellClient {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| EngineError::Configuration(format!("Invalid base URL: {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(system::USER_AGENT)
            .build()
            .map_err(|e| EngineError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        info!(base_url = %base_url, timeout_ms = config.timeout_ms, "Created Cromwell client");

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, EngineError> {
        self.base_url
            .join(WORKFLOWS_API)
            .and_then(|api| api.join(path))
            .map_err(|e| EngineError::Configuration(format!("Failed to construct URL: {e}")))
    }

    async fn handle_response<T>(
        response: reqwest::Response,
        operation: &str,
    ) -> Result<T, EngineError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = Self::check_status(response, operation).await?;
        response.json::<T>().await.map_err(|e| {
            EngineError::InvalidResponse(format!("Failed to parse {operation} response: {e}"))
        })
    }

    async fn check_status(
        response: reqwest::Response,
        operation: &str,
    ) -> Result<reqwest::Response, EngineError> {
        if response.status().is_success() {
            debug!("Successfully completed engine operation: {}", operation);
            return Ok(response);
        }
        let status = response.status();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        error!(status = %status, error = %message, "Failed engine operation: {}", operation);
        Err(EngineError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

fn transport(e: reqwest::Error) -> EngineError {
    EngineError::Transport(e.to_string())
}

#[async_trait]
impl ExecutionEngine for CromwellClient {
    async fn submit_batch(
        &self,
        workflow_url: &str,
        inputs: &IndexMap<Uuid, String>,
        workflow_options: &str,
        token: &BearerToken,
    ) -> Result<Vec<WorkflowIdAndStatus>, EngineError> {
        let url = self.endpoint("batch")?;

        let input_documents = inputs
            .values()
            .map(|doc| serde_json::from_str::<Value>(doc))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| EngineError::InvalidResponse(format!("Invalid workflow inputs: {e}")))?;
        let requested_ids: Vec<String> = inputs.keys().map(Uuid::to_string).collect();

        let form = Form::new()
            .text("workflowUrl", workflow_url.to_string())
            .text("workflowInputs", Value::Array(input_documents).to_string())
            .text("workflowOptions", workflow_options.to_string())
            .text(
                "requestedWorkflowId",
                serde_json::to_string(&requested_ids)
                    .map_err(|e| EngineError::InvalidResponse(e.to_string()))?,
            );

        debug!(url = %url, batch_size = inputs.len(), "Submitting workflow batch");

        let response = self
            .client
            .post(url)
            .header(reqwest::header::AUTHORIZATION, token.header_value())
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;

        Self::handle_response(response, "batch submit").await
    }

    async fn run_summary(&self, engine_id: Uuid) -> Result<Option<EngineRunSummary>, EngineError> {
        let mut url = self.endpoint("query")?;
        url.query_pairs_mut().append_pair("id", &engine_id.to_string());

        let response = self.client.get(url).send().await.map_err(transport)?;
        let query: QueryResponse = Self::handle_response(response, "query").await?;
        Ok(query.results.into_iter().find(|summary| summary.id == engine_id))
    }

    async fn outputs(&self, engine_id: Uuid) -> Result<Map<String, Value>, EngineError> {
        let url = self.endpoint(&format!("{engine_id}/outputs"))?;
        let response = self.client.get(url).send().await.map_err(transport)?;
        let outputs: OutputsResponse = Self::handle_response(response, "outputs").await?;
        Ok(outputs.outputs)
    }

    async fn failure_message(&self, engine_id: Uuid) -> Result<String, EngineError> {
        let mut url = self.endpoint(&format!("{engine_id}/metadata"))?;
        url.query_pairs_mut().append_pair("includeKey", "failures");

        let response = self.client.get(url).send().await.map_err(transport)?;
        let metadata: FailuresMetadata = Self::handle_response(response, "metadata").await?;
        Ok(compose_failure_message(&metadata.failures))
    }

    async fn cancel(&self, engine_id: Uuid, token: &BearerToken) -> Result<(), EngineError> {
        let url = self.endpoint(&format!("{engine_id}/abort"))?;
        let response = self
            .client
            .post(url)
            .header(reqwest::header::AUTHORIZATION, token.header_value())
            .send()
            .await
            .map_err(transport)?;
        Self::check_status(response, "abort").await.map(|_| ())
    }
}
