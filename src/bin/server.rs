//! Query engine service binary
//!
//! Run with: cargo run --bin corpus-rag-server

use corpus_rag::{config::AppConfig, server::QueryServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "corpus_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;

    tracing::info!("configuration loaded");
    tracing::info!("  - database: {}", config.storage.database_path.display());
    tracing::info!("  - retrieval backend: {}", config.retrieval.base_url);
    tracing::info!("  - generation backend: {}", config.llm.base_url);
    tracing::info!("  - sentence padding: {}", config.chunking.sentence_padding);

    // probe backends so a misconfigured deployment is visible at startup
    let probe = reqwest::Client::new();
    match probe
        .get(format!("{}/api/tags", config.llm.base_url))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            tracing::info!("generation backend is reachable");
        }
        _ => {
            tracing::warn!(
                "generation backend not reachable at {}; queries will fail until it is up",
                config.llm.base_url
            );
        }
    }

    let server = QueryServer::new(config).await?;
    tracing::info!("api: http://{}/api", server.address());

    server.start().await?;
    Ok(())
}
