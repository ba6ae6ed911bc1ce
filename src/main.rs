use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use post_analyzer::config::Config;
use post_analyzer::language::LanguageClient;
use post_analyzer::pipeline::Analyzer;
use post_analyzer::pubsub::Publisher;
use post_analyzer::storage::{ObjectStore, S3Client};
use post_analyzer::web;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    info!("Starting post-analyzer");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let s3_client = S3Client::new(&config).context("Failed to initialize S3 client")?;
    info!(bucket = %s3_client.bucket_name(), prefix = %config.s3_prefix, "Storage configured");
    let store: Arc<dyn ObjectStore> = Arc::new(s3_client);

    let language = LanguageClient::new(&config).context("Failed to create language client")?;
    info!(
        rate_limit_per_min = config.language_rate_limit_per_min,
        "Language client configured"
    );
    if config.language_api_key.is_none() && config.google_access_token.is_none() {
        warn!("Neither LANGUAGE_API_KEY nor GOOGLE_ACCESS_TOKEN is set; language API calls will be unauthenticated");
    }

    // The entity stage chains into sentiment through the topic, so it must exist
    let publisher = if config.pubsub_enabled {
        let publisher = Publisher::new(&config).context("Failed to create pubsub client")?;
        let exists = publisher
            .topic_exists()
            .await
            .context("Checking if the pubsub topic exists failed")?;
        if !exists {
            anyhow::bail!("\"{}\" does not exist as a topic", publisher.topic_path());
        }
        info!(topic = %publisher.topic_path(), "Pub/sub topic found");
        Some(publisher)
    } else {
        info!("Pub/sub disabled; entity analysis will not trigger sentiment analysis");
        None
    };

    let analyzer = Arc::new(Analyzer::new(&config, store, language, publisher));

    let mut web_handle = tokio::spawn(web::serve(config, analyzer));

    tokio::select! {
        () = shutdown_signal() => {
            info!("Shutting down...");
            web_handle.abort();
        }
        result = &mut web_handle => {
            result.context("Web server task panicked")??;
        }
    }

    info!("Shutdown complete");

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,post_analyzer=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
