//! Shared constants used across the application.

/// User agent sent to the language and pub/sub APIs.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Event published after entity analysis to start the sentiment stage.
pub const UPDATE_SENTIMENT_EVENT: &str = "update-post-sentiment";
