use crate::errors::GatewayError;
use crate::models::{RemoteProgress, ResponseRecord, SubmitResponse};
use async_trait::async_trait;
use std::{collections::BTreeMap, time::Duration};
use tracing::{debug, info};

/// The backend's view of a finished check-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub config_id: u64,
    pub responses: BTreeMap<String, ResponseRecord>,
}

#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmitResponse, GatewayError>;

    /// Progress the backend still holds, used when nothing is stored locally.
    async fn load_progress(&self, config_id: u64) -> Result<RemoteProgress, GatewayError>;
}

/// Talks to `{base_url}/api/checkin.php` with form-encoded actions.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpGateway {
    /// Every call gives up after `timeout`, so a hung backend surfaces as a
    /// failed submission instead of a stuck one.
    pub fn new(base_url: &str, auth_token: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: format!("{}/api/checkin.php", base_url.trim_end_matches('/')),
            auth_token,
        }
    }

    async fn post<T>(&self, params: &[(&str, String)]) -> Result<T, GatewayError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut request = self.client.post(&self.endpoint).form(params);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SubmissionGateway for HttpGateway {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmitResponse, GatewayError> {
        let responses = serde_json::to_string(&request.responses)?;
        info!(
            config_id = request.config_id,
            answers = request.responses.len(),
            "submitting check-in"
        );
        self.post(&[
            ("action", "submit_checkin".to_string()),
            ("config_id", request.config_id.to_string()),
            ("responses", responses),
        ])
        .await
    }

    async fn load_progress(&self, config_id: u64) -> Result<RemoteProgress, GatewayError> {
        debug!(config_id, "loading check-in progress from backend");
        self.post(&[
            ("action", "load_progress".to_string()),
            ("config_id", config_id.to_string()),
        ])
        .await
    }
}
