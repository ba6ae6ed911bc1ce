//! Cloud Pub/Sub v1 REST: topic check, publish, and push-envelope decoding.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::constants::USER_AGENT;
use crate::models::PubSubEvent;

#[derive(Debug, Error)]
pub enum PubSubError {
    #[error("pub/sub request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("pub/sub API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("malformed push message: {0}")]
    MalformedPush(String),
}

#[derive(Debug, Serialize)]
struct PublishRequest {
    messages: Vec<OutgoingMessage>,
}

#[derive(Debug, Serialize)]
struct OutgoingMessage {
    data: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PublishResponse {
    message_ids: Vec<String>,
}

/// Envelope Pub/Sub POSTs to a push subscription endpoint.
#[derive(Debug, Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
    #[serde(default)]
    pub subscription: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    pub data: String,
    #[serde(default)]
    pub message_id: String,
}

impl PushEnvelope {
    /// Decode the pipeline event carried in a push request body.
    ///
    /// # Errors
    ///
    /// Returns an error if the envelope, its base64 data, or the event JSON
    /// is malformed.
    pub fn decode_event(body: &[u8]) -> Result<PubSubEvent, PubSubError> {
        let envelope: PushEnvelope = serde_json::from_slice(body)
            .map_err(|e| PubSubError::MalformedPush(format!("envelope: {e}")))?;
        let data = STANDARD
            .decode(envelope.message.data.as_bytes())
            .map_err(|e| PubSubError::MalformedPush(format!("data is not base64: {e}")))?;
        serde_json::from_slice(&data).map_err(|e| PubSubError::MalformedPush(format!("event: {e}")))
    }
}

/// Publisher bound to a single topic.
#[derive(Debug, Clone)]
pub struct Publisher {
    http: Client,
    base_url: String,
    topic_path: String,
    access_token: Option<String>,
}

impl Publisher {
    /// Create a publisher for the configured project and topic.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.pubsub_api_url.trim_end_matches('/').to_string(),
            topic_path: format!(
                "projects/{}/topics/{}",
                config.gcp_project_id, config.pubsub_topic
            ),
            access_token: config.google_access_token.clone(),
        })
    }

    /// Fully qualified topic name, `projects/{project}/topics/{topic}`.
    #[must_use]
    pub fn topic_path(&self) -> &str {
        &self.topic_path
    }

    /// Check whether the topic exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API answers with
    /// anything other than success or not-found.
    pub async fn topic_exists(&self) -> Result<bool, PubSubError> {
        let url = format!("{}/v1/{}", self.base_url, self.topic_path);
        let response = self.authorize(self.http.get(&url)).send().await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(PubSubError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Publish an event and return the server-assigned message id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API rejects it.
    pub async fn publish(&self, event: &PubSubEvent) -> Result<String, PubSubError> {
        let payload = serde_json::to_vec(event)?;
        let body = PublishRequest {
            messages: vec![OutgoingMessage {
                data: STANDARD.encode(payload),
            }],
        };

        let url = format!("{}/v1/{}:publish", self.base_url, self.topic_path);
        debug!(topic = %self.topic_path, event_type = %event.event_type, "Publishing event");

        let response = self.authorize(self.http.post(&url).json(&body)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PubSubError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let published: PublishResponse = response.json().await?;
        Ok(published.message_ids.into_iter().next().unwrap_or_default())
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.access_token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }
}
