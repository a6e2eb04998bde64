//! RAG Server binary
//!
//! Run with: cargo run -p anime-rag --bin anime-rag-server

use anime_rag::{config::RagConfig, generation::OllamaClient, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // API keys and ANIME_RAG_* overrides may live in .env
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "anime_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RagConfig::load()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Data directory: {}", config.pipeline.data_dir.display());
    tracing::info!("  - Vector store: {}", config.pipeline.db_dir.display());
    tracing::info!("  - Embedding model: {}", config.pipeline.embedding_model);
    tracing::info!("  - LLM model: {}", config.pipeline.llm_model);
    tracing::info!("  - Retrieval depth: {}", config.pipeline.k_docs);

    let pipeline = &config.pipeline;
    if pipeline.llm_model.starts_with("ollama:") || pipeline.embedding_model.starts_with("ollama:") {
        let ollama = OllamaClient::new(&config.llm.ollama_url, config.llm.timeout_secs)?;
        if ollama.health_check().await {
            tracing::info!("  - Ollama: reachable at {}", config.llm.ollama_url);
        } else {
            tracing::warn!(
                "Ollama is not reachable at {}; pipeline builds will fail until it is running",
                config.llm.ollama_url
            );
        }
    }

    let server = RagServer::new(config);

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST /initialize    - Rebuild the pipeline");
    println!("  POST /query         - Ask for recommendations");
    println!("  POST /query/stream  - Same, as server-sent events");
    println!("  GET  /config        - Active configuration");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
