//! Record service client: reads run inputs from and writes outputs back to data
//! table records (`/{instance}/records/v0.2/{type}/{id}`).

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::auth::BearerToken;
use super::records::{RecordSink, RecordSource, RecordSourceError};
use crate::config::RecordsConfig;
use crate::constants::system;
use crate::models::{RecordAttributes, RecordResponse};

const RECORDS_API_VERSION: &str = "v0.2";

#[derive(Clone)]
pub struct WdsClient {
    client: Client,
    base_url: Url,
    instance_id: String,
    /// Credential for writes made outside a user request (output write-back)
    service_token: Option<BearerToken>,
}

impl std::fmt::Debug for WdsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WdsClient")
            .field("base_url", &self.base_url.as_str())
            .field("instance_id", &self.instance_id)
            .finish()
    }
}

impl WdsClient {
    pub fn new(config: &RecordsConfig) -> Result<Self, RecordSourceError> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| RecordSourceError::Configuration(format!("Invalid base URL: {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(system::USER_AGENT)
            .build()
            .map_err(|e| {
                RecordSourceError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        info!(
            base_url = %base_url,
            instance_id = %config.instance_id,
            "Created record service client"
        );

        Ok(Self {
            client,
            base_url,
            instance_id: config.instance_id.clone(),
            service_token: None,
        })
    }

    pub fn with_service_token(mut self, token: BearerToken) -> Self {
        self.service_token = Some(token);
        self
    }

    fn record_url(&self, record_type: &str, record_id: &str) -> Result<Url, RecordSourceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RecordSourceError::Configuration("Base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend([
                self.instance_id.as_str(),
                "records",
                RECORDS_API_VERSION,
                record_type,
                record_id,
            ]);
        Ok(url)
    }

    async fn error_for(
        response: reqwest::Response,
        record_type: &str,
        record_id: &str,
    ) -> RecordSourceError {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return RecordSourceError::NotFound {
                record_type: record_type.to_string(),
                record_id: record_id.to_string(),
            };
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        warn!(
            status = %status,
            error = %message,
            record_id = %record_id,
            "Record service request failed"
        );
        RecordSourceError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl RecordSource for WdsClient {
    async fn get_record(
        &self,
        record_type: &str,
        record_id: &str,
        token: &BearerToken,
    ) -> Result<RecordResponse, RecordSourceError> {
        let url = self.record_url(record_type, record_id)?;
        debug!(url = %url, "Fetching record");

        let response = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, token.header_value())
            .send()
            .await
            .map_err(|e| RecordSourceError::Transient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, record_type, record_id).await);
        }

        response
            .json::<RecordResponse>()
            .await
            .map_err(|e| RecordSourceError::Transient(format!("Invalid record response: {e}")))
    }
}

#[async_trait]
impl RecordSink for WdsClient {
    async fn update_record(
        &self,
        record_type: &str,
        record_id: &str,
        attributes: RecordAttributes,
    ) -> Result<(), RecordSourceError> {
        let url = self.record_url(record_type, record_id)?;
        let body = json!({ "id": record_id, "type": record_type, "attributes": attributes });

        let mut request = self.client.patch(url).json(&body);
        if let Some(token) = &self.service_token {
            request = request.header(reqwest::header::AUTHORIZATION, token.header_value());
        }

        let response = request
            .send()
            .await
            .map_err(|e| RecordSourceError::Transient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, record_type, record_id).await);
        }
        Ok(())
    }
}
