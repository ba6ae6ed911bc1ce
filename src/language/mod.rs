//! Client for the Cloud Natural Language v1 REST API.

mod rate_limiter;

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use rate_limiter::RequestRateLimiter;

use crate::config::Config;
use crate::constants::USER_AGENT;

#[derive(Debug, Error)]
pub enum LanguageError {
    #[error("language API request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("language API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("failed to decode language API response: {0}")]
    Decode(#[source] reqwest::Error),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    document: Document<'a>,
    encoding_type: &'static str,
}

#[derive(Debug, Serialize)]
struct Document<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    content: &'a str,
}

impl<'a> AnalyzeRequest<'a> {
    fn plain_text(content: &'a str) -> Self {
        Self {
            document: Document {
                kind: "PLAIN_TEXT",
                content,
            },
            encoding_type: "UTF8",
        }
    }
}

/// Sentiment of a document, sentence or entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Sentiment {
    pub score: f32,
    pub magnitude: f32,
}

/// A named entity found in the document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub salience: f32,
    pub sentiment: Option<Sentiment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EntitySentimentResponse {
    pub entities: Vec<Entity>,
    pub language: String,
}

impl EntitySentimentResponse {
    /// Entity names in the order the API returned them.
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|e| e.name.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SentimentResponse {
    pub document_sentiment: Sentiment,
    pub language: String,
}

/// Rate-limited language API client. Clones share the limiter.
#[derive(Debug, Clone)]
pub struct LanguageClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    access_token: Option<String>,
    limiter: Arc<RequestRateLimiter>,
}

impl LanguageClient {
    /// Create a client from configuration.
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
            base_url: config.language_api_url.trim_end_matches('/').to_string(),
            api_key: config.language_api_key.clone(),
            access_token: config.google_access_token.clone(),
            limiter: Arc::new(RequestRateLimiter::per_minute(
                config.language_rate_limit_per_min,
            )),
        })
    }

    /// Entities in `text`, with per-entity sentiment.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API rejects it.
    pub async fn analyze_entity_sentiment(
        &self,
        text: &str,
    ) -> Result<EntitySentimentResponse, LanguageError> {
        self.call("analyzeEntitySentiment", text).await
    }

    /// Overall sentiment of `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API rejects it.
    pub async fn analyze_sentiment(&self, text: &str) -> Result<SentimentResponse, LanguageError> {
        self.call("analyzeSentiment", text).await
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, text: &str) -> Result<T, LanguageError> {
        self.limiter.acquire().await;

        let url = format!("{}/v1/documents:{method}", self.base_url);
        debug!(method, chars = text.len(), "Calling language API");

        let mut request = self.http.post(&url).json(&AnalyzeRequest::plain_text(text));
        if let Some(ref key) = self.api_key {
            request = request.query(&[("key", key)]);
        }
        if let Some(ref token) = self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(LanguageError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LanguageError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(LanguageError::Decode)
    }
}
