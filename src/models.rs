//! Post records as scraped into storage, and the analysis records written back.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::analysis::SentimentLabel;

/// A scraped Reddit post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditPost {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    pub score: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(rename = "comms_num")]
    pub comment_count: i64,
    pub created: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub body: String,
    /// Same value as `created` in the scraper's output.
    pub timestamp: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub comments: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub analysis: Analysis,
    #[serde(rename = "commentsAnalysis", deserialize_with = "null_as_default")]
    pub comments_analysis: Analysis,
}

/// Results from the language API attached to a post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Analysis {
    #[serde(deserialize_with = "null_as_default")]
    pub sentiment: SentimentSummary,
    #[serde(deserialize_with = "null_as_default")]
    pub entity: EntitySummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SentimentSummary {
    pub score: f32,
    pub parsed_sentiment: SentimentLabel,
}

impl Default for SentimentSummary {
    fn default() -> Self {
        Self {
            score: 0.0,
            parsed_sentiment: SentimentLabel::Unknown,
        }
    }
}

impl SentimentSummary {
    #[must_use]
    pub fn from_score(score: f32) -> Self {
        Self {
            score,
            parsed_sentiment: SentimentLabel::from_score(score),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitySummary {
    #[serde(deserialize_with = "null_as_default")]
    pub count: BTreeMap<String, u32>,
}

/// One entity and how often it was mentioned, for the flattened output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCount {
    pub name: String,
    pub count: u32,
}

/// Output record: the post id plus its analysis, without the post content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub entity: Vec<EntityCount>,
    #[serde(deserialize_with = "null_as_default")]
    pub sentiment: SentimentSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments_sentiment: Option<SentimentSummary>,
}

impl AnalysisRecord {
    /// Flatten a post's analysis into an output record.
    #[must_use]
    pub fn from_post(post: &RedditPost) -> Self {
        Self {
            id: post.id.clone(),
            entity: entity_list(&post.analysis.entity),
            sentiment: post.analysis.sentiment.clone(),
            comments_sentiment: comments_sentiment(post),
        }
    }
}

/// Decode an explicit `null` the same way as a missing field.
///
/// The scraper writes empty lists and maps as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

pub(crate) fn entity_list(summary: &EntitySummary) -> Vec<EntityCount> {
    summary
        .count
        .iter()
        .map(|(name, count)| EntityCount {
            name: name.clone(),
            count: *count,
        })
        .collect()
}

pub(crate) fn comments_sentiment(post: &RedditPost) -> Option<SentimentSummary> {
    let sentiment = &post.comments_analysis.sentiment;
    (sentiment.parsed_sentiment != SentimentLabel::Unknown).then(|| sentiment.clone())
}

/// Message published to chain one analysis stage into the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubSubEvent {
    pub event_type: String,
    pub payload: String,
}
