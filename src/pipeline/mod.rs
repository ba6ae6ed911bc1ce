//! Analysis stages: fetch a post batch, run it through the language API,
//! and upload the merged results.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::analysis::{
    accumulate_sentiment, has_comments, mean_score, merge_entities, merge_sentiment,
    prune_empty_posts, tally_entities, to_records,
};
use crate::config::Config;
use crate::constants::UPDATE_SENTIMENT_EVENT;
use crate::filename::{is_analysis_filename, output_filename, source_filename};
use crate::language::LanguageClient;
use crate::models::{AnalysisRecord, PubSubEvent, RedditPost, SentimentSummary};
use crate::pubsub::Publisher;
use crate::storage::{fetch_json, save_json, ObjectStore};

#[derive(Debug, Error)]
pub enum StageError {
    #[error("found 0 posts in \"{0}\"")]
    NoPosts(String),
    #[error("found 0 analyzed posts in \"{0}\"")]
    NoAnalyzedPosts(String),
    #[error("analyzed 0 posts from \"{0}\"")]
    NothingAnalyzed(String),
}

/// Which analysis a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Entity counts, then publish an event to start the sentiment stage.
    Entity,
    /// Document sentiment (and comment sentiment when enabled).
    Sentiment,
    /// Entities and sentiment in a single pass.
    Full,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Sentiment => "sentiment",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a completed stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub output_filename: String,
    pub analyzed: usize,
    /// Message id of the chaining event, if one was published.
    pub published: Option<String>,
}

/// Holds the external service handles a stage needs.
pub struct Analyzer {
    store: Arc<dyn ObjectStore>,
    language: LanguageClient,
    publisher: Option<Publisher>,
    prefix: String,
    storage_timeout: Duration,
    analyze_comments: bool,
}

impl Analyzer {
    #[must_use]
    pub fn new(
        config: &Config,
        store: Arc<dyn ObjectStore>,
        language: LanguageClient,
        publisher: Option<Publisher>,
    ) -> Self {
        Self {
            store,
            language,
            publisher,
            prefix: config.s3_prefix.clone(),
            storage_timeout: config.storage_timeout,
            analyze_comments: config.analyze_comments,
        }
    }

    /// Run `stage` for `filename` on a background task.
    ///
    /// Failures are logged; nothing is reported back to the caller.
    pub fn spawn(self: &Arc<Self>, stage: Stage, filename: String) -> JoinHandle<()> {
        let analyzer = Arc::clone(self);
        tokio::spawn(async move {
            match analyzer.run(stage, &filename).await {
                Ok(report) => info!(
                    stage = %stage,
                    output = %report.output_filename,
                    analyzed = report.analyzed,
                    "Stage complete"
                ),
                Err(e) => error!(stage = %stage, filename = %filename, "Stage failed: {e:#}"),
            }
        })
    }

    /// Fetch, analyze, merge and upload one file.
    ///
    /// When `filename` is an analyzed file the existing records are updated
    /// in place from a fresh analysis of the source posts. Otherwise new
    /// records are written next to the source with an `_analyzed` suffix.
    ///
    /// # Errors
    ///
    /// Returns the first storage, decode, language API or publish failure,
    /// or a [`StageError`] when there is nothing to analyze.
    pub async fn run(&self, stage: Stage, filename: &str) -> Result<StageReport> {
        let output = output_filename(filename);

        let (records, analyzed) = if is_analysis_filename(filename) {
            info!(filename, "Downloading analyzed posts");
            let mut records = self.fetch_records(filename).await?;
            if records.is_empty() {
                return Err(StageError::NoAnalyzedPosts(filename.to_string()).into());
            }
            info!(count = records.len(), "Found analyzed posts");

            let source = source_filename(filename);
            let posts = self.fetch_posts(&source).await?;

            info!(count = posts.len(), stage = %stage, "Starting analysis");
            let posts = self.analyze(stage, posts).await?;
            if posts.is_empty() {
                return Err(StageError::NothingAnalyzed(filename.to_string()).into());
            }

            let updated = match stage {
                Stage::Entity => merge_entities(&posts, &mut records),
                Stage::Sentiment => merge_sentiment(&posts, &mut records),
                Stage::Full => {
                    merge_entities(&posts, &mut records);
                    merge_sentiment(&posts, &mut records)
                }
            };
            if updated < posts.len() {
                warn!(
                    updated,
                    analyzed = posts.len(),
                    "Some analyzed posts have no existing record"
                );
            }
            (records, posts.len())
        } else {
            let posts = self.fetch_posts(filename).await?;

            info!(count = posts.len(), stage = %stage, "Starting analysis");
            let posts = self.analyze(stage, posts).await?;
            (to_records(&posts), posts.len())
        };

        info!(analyzed, "Analyzed posts after pruning posts with empty body");

        self.save_records(&output, &records).await?;
        info!(key = %self.key(&output), "Uploaded analyzed posts");

        let published = self.on_analyzed(stage, &output).await?;

        Ok(StageReport {
            output_filename: output,
            analyzed,
            published,
        })
    }

    async fn analyze(&self, stage: Stage, posts: Vec<RedditPost>) -> Result<Vec<RedditPost>> {
        match stage {
            Stage::Entity => self.analyze_entities(posts).await,
            Stage::Sentiment => self.analyze_sentiment(posts).await,
            Stage::Full => {
                let posts = self.analyze_entities(posts).await?;
                self.analyze_sentiment(posts).await
            }
        }
    }

    /// Tally entities in every post with body text.
    ///
    /// # Errors
    ///
    /// Returns the first language API failure.
    pub async fn analyze_entities(&self, posts: Vec<RedditPost>) -> Result<Vec<RedditPost>> {
        let mut posts = prune_empty_posts(posts);

        for post in &mut posts {
            let response = self
                .language
                .analyze_entity_sentiment(&post.body)
                .await
                .with_context(|| format!("Entity analysis failed for post {}", post.id))?;
            post.analysis.entity.count = tally_entities(response.entity_names());
        }

        Ok(posts)
    }

    /// Score the sentiment of every post with body text.
    ///
    /// # Errors
    ///
    /// Returns the first language API failure.
    pub async fn analyze_sentiment(&self, posts: Vec<RedditPost>) -> Result<Vec<RedditPost>> {
        let mut posts = prune_empty_posts(posts);

        for post in &mut posts {
            let response = self
                .language
                .analyze_sentiment(&post.body)
                .await
                .with_context(|| format!("Sentiment analysis failed for post {}", post.id))?;
            accumulate_sentiment(
                &mut post.analysis.sentiment,
                response.document_sentiment.score,
            );

            if self.analyze_comments && has_comments(post) {
                self.analyze_post_comments(post).await?;
            }
        }

        Ok(posts)
    }

    async fn analyze_post_comments(&self, post: &mut RedditPost) -> Result<()> {
        let mut scores = Vec::with_capacity(post.comments.len());
        for comment in post.comments.iter().filter(|c| !c.is_empty()) {
            let response = self
                .language
                .analyze_sentiment(comment)
                .await
                .with_context(|| format!("Comment analysis failed for post {}", post.id))?;
            scores.push(response.document_sentiment.score);
        }

        if let Some(mean) = mean_score(&scores) {
            post.comments_analysis.sentiment = SentimentSummary::from_score(mean);
        }
        Ok(())
    }

    async fn on_analyzed(&self, stage: Stage, output: &str) -> Result<Option<String>> {
        match stage {
            Stage::Entity => {
                let Some(ref publisher) = self.publisher else {
                    info!("Pub/sub disabled, not starting sentiment stage");
                    return Ok(None);
                };
                let event = PubSubEvent {
                    event_type: UPDATE_SENTIMENT_EVENT.to_string(),
                    payload: output.to_string(),
                };
                let message_id = publisher
                    .publish(&event)
                    .await
                    .context("Failed to publish sentiment trigger")?;
                info!(message_id = %message_id, payload = %output, "Published sentiment trigger");
                Ok(Some(message_id))
            }
            Stage::Sentiment => {
                info!("Finished analyzing sentiment");
                Ok(None)
            }
            Stage::Full => Ok(None),
        }
    }

    fn key(&self, filename: &str) -> String {
        format!("{}{filename}", self.prefix)
    }

    async fn fetch_posts(&self, filename: &str) -> Result<Vec<RedditPost>> {
        info!(filename, "Downloading posts");
        let key = self.key(filename);
        let posts: Vec<RedditPost> = fetch_json(self.store.as_ref(), &key, self.storage_timeout)
            .await
            .with_context(|| format!("Failed to fetch reddit posts from \"{filename}\""))?;
        if posts.is_empty() {
            return Err(StageError::NoPosts(filename.to_string()).into());
        }
        Ok(posts)
    }

    async fn fetch_records(&self, filename: &str) -> Result<Vec<AnalysisRecord>> {
        fetch_json(self.store.as_ref(), &self.key(filename), self.storage_timeout)
            .await
            .with_context(|| format!("Failed to fetch analyzed posts from \"{filename}\""))
    }

    async fn save_records(&self, filename: &str, records: &[AnalysisRecord]) -> Result<()> {
        save_json(self.store.as_ref(), &self.key(filename), records, self.storage_timeout)
            .await
            .context("Failed to upload analyzed posts")
    }
}

impl fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyzer")
            .field("prefix", &self.prefix)
            .field("publisher", &self.publisher.as_ref().map(Publisher::topic_path))
            .field("analyze_comments", &self.analyze_comments)
            .finish_non_exhaustive()
    }
}
