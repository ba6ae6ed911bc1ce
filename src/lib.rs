//! Post analyzer library.
//!
//! A service that pulls scraped Reddit post batches from object storage,
//! runs each post through the Cloud Natural Language API for entity and
//! sentiment analysis, and writes the results back to storage. Entity
//! analysis can chain into sentiment analysis over Pub/Sub.

pub mod analysis;
pub mod config;
pub mod constants;
pub mod filename;
pub mod language;
pub mod models;
pub mod pipeline;
pub mod pubsub;
pub mod storage;
pub mod web;
