//! Pure helpers for turning language API results into post analysis.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{comments_sentiment, entity_list, AnalysisRecord, RedditPost, SentimentSummary};

/// Score at which a post reads as neutral rather than mixed or positive.
const NEUTRAL_SCORE: f32 = 0.1;

/// Coarse sentiment classification of a score in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Mixed,
    Negative,
    #[serde(other)]
    Unknown,
}

impl SentimentLabel {
    /// Classify a score.
    ///
    /// | score          | label    |
    /// |----------------|----------|
    /// | `== 0.1`       | neutral  |
    /// | `> 0.1`        | positive |
    /// | `[0.0, 0.1)`   | mixed    |
    /// | `< 0.0`        | negative |
    /// | NaN            | unknown  |
    #[must_use]
    pub fn from_score(score: f32) -> Self {
        if score.is_nan() {
            Self::Unknown
        } else if (score - NEUTRAL_SCORE).abs() < f32::EPSILON {
            Self::Neutral
        } else if score > NEUTRAL_SCORE {
            Self::Positive
        } else if score >= 0.0 {
            Self::Mixed
        } else {
            Self::Negative
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Mixed => "mixed",
            Self::Negative => "negative",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Count how many times each entity name appears in one document.
pub fn tally_entities<'a, I>(names: I) -> BTreeMap<String, u32>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts = BTreeMap::new();
    for name in names {
        *counts.entry(name.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Keep only posts whose submitter wrote body text.
#[must_use]
pub fn prune_empty_posts(posts: Vec<RedditPost>) -> Vec<RedditPost> {
    posts.into_iter().filter(|p| !p.body.is_empty()).collect()
}

/// Whether a post has comments worth analyzing.
#[must_use]
pub fn has_comments(post: &RedditPost) -> bool {
    post.comment_count >= 1 && post.comments.iter().any(|c| !c.is_empty())
}

/// Add a document score onto a post's running sentiment.
///
/// The label follows the latest document score, not the running total.
pub fn accumulate_sentiment(summary: &mut SentimentSummary, score: f32) {
    summary.score += score;
    summary.parsed_sentiment = SentimentLabel::from_score(score);
}

/// Mean of a set of scores, `None` when empty.
#[must_use]
pub fn mean_score(scores: &[f32]) -> Option<f32> {
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f32>() / scores.len() as f32)
}

/// Flatten analyzed posts into output records.
#[must_use]
pub fn to_records(posts: &[RedditPost]) -> Vec<AnalysisRecord> {
    posts.iter().map(AnalysisRecord::from_post).collect()
}

/// Copy freshly computed entity counts onto existing records with the same id.
///
/// Returns how many records were updated.
pub fn merge_entities(posts: &[RedditPost], records: &mut [AnalysisRecord]) -> usize {
    merge_by_id(posts, records, |post, record| {
        record.entity = entity_list(&post.analysis.entity);
    })
}

/// Add freshly computed sentiment onto existing records with the same id.
///
/// The stored score is a running total across runs; the label follows the
/// fresh score. Returns how many records were updated.
pub fn merge_sentiment(posts: &[RedditPost], records: &mut [AnalysisRecord]) -> usize {
    merge_by_id(posts, records, |post, record| {
        accumulate_sentiment(&mut record.sentiment, post.analysis.sentiment.score);
        if let Some(comments) = comments_sentiment(post) {
            record.comments_sentiment = Some(comments);
        }
    })
}

fn merge_by_id<F>(posts: &[RedditPost], records: &mut [AnalysisRecord], mut apply: F) -> usize
where
    F: FnMut(&RedditPost, &mut AnalysisRecord),
{
    let by_id: HashMap<&str, &RedditPost> = posts.iter().map(|p| (p.id.as_str(), p)).collect();
    let mut updated = 0;
    for record in records.iter_mut() {
        if let Some(post) = by_id.get(record.id.as_str()) {
            apply(post, record);
            updated += 1;
        }
    }
    updated
}
