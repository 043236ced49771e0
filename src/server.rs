//! MCP server initialization for stdio and streamable HTTP transports.
//!
//! Provides [`serve_stdio`] and [`serve_http`] entry points that wire up the database,
//! embedding provider, and MCP tool handler into a running server.

use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::{Arc, Mutex};

use crate::tools::SlpTools;
use slp::config::SlpConfig;
use slp::db;
use slp::embedding;

type SharedState = (
    Arc<Mutex<rusqlite::Connection>>,
    Arc<dyn embedding::EmbeddingProvider>,
    Arc<SlpConfig>,
);

/// Shared setup: open DB, create embedding provider, check model identity.
fn setup_shared_state(config: SlpConfig) -> Result<SharedState> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    let provider = embedding::create_provider(&config.embedding)?;
    let embedding: Arc<dyn embedding::EmbeddingProvider> = Arc::from(provider);
    tracing::info!(model = embedding.model_id(), "embedding provider ready");

    // Vectors from another model aren't comparable with fresh query embeddings
    match db::migrations::get_embedding_model(&conn)? {
        Some(stored) if stored != embedding.model_id() => {
            let programs: i64 =
                conn.query_row("SELECT COUNT(*) FROM latent_programs", [], |row| row.get(0))?;
            if programs == 0 {
                db::migrations::set_embedding_model(&conn, embedding.model_id())?;
            } else {
                tracing::warn!(
                    stored = %stored,
                    configured = embedding.model_id(),
                    "embedding model changed, run `slp re-embed` to update all vectors"
                );
            }
        }
        Some(_) => {}
        None => db::migrations::set_embedding_model(&conn, embedding.model_id())?,
    }

    Ok((Arc::new(Mutex::new(conn)), embedding, Arc::new(config)))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: SlpConfig) -> Result<()> {
    tracing::info!("starting SLP MCP server on stdio");

    let (db, embedding, config) = setup_shared_state(config)?;

    let tools = SlpTools::new(db, embedding, config);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP transport.
pub async fn serve_http(config: SlpConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    tracing::info!(addr = %bind_addr, "starting SLP MCP server on HTTP");

    let (db, embedding, config) = setup_shared_state(config)?;

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(SlpTools::new(db.clone(), embedding.clone(), config.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
