//! Network seam between the controller and the inference endpoint.

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use shared::{
    error::{ErrorBody, InferenceError},
    protocol::{InferenceReply, InferenceRequest},
};
use tracing::debug;

use crate::config::ChatConfig;

#[async_trait]
pub trait InferenceTransport: Send + Sync {
    /// Sends one request and decodes the reply. Dropping the future aborts the call.
    async fn send(&self, request: &InferenceRequest) -> Result<InferenceReply, InferenceError>;
}

pub struct HttpTransport {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(config.endpoint.clone(), config.api_key.clone())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl InferenceTransport for HttpTransport {
    async fn send(&self, request: &InferenceRequest) -> Result<InferenceReply, InferenceError> {
        let mut builder = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let res = builder
            .send()
            .await
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                detail: ErrorBody::detail_from(&body),
            });
        }

        let body = res
            .bytes()
            .await
            .map_err(|e| InferenceError::Transport(e.to_string()))?;
        debug!(endpoint = %self.endpoint, bytes = body.len(), "received inference reply");
        InferenceReply::decode(&body).map_err(|e| InferenceError::Decode(e.to_string()))
    }
}
