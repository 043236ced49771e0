pub mod capture_program;
pub mod find_program;
pub mod program_inspect;
pub mod program_stats;
pub mod record_execution;
pub mod record_feedback;
pub mod retire_program;

use capture_program::CaptureProgramParams;
use find_program::FindProgramParams;
use program_inspect::ProgramInspectParams;
use program_stats::ProgramStatsParams;
use record_execution::RecordExecutionParams;
use record_feedback::RecordFeedbackParams;
use retire_program::RetireProgramParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use slp::config::SlpConfig;
use slp::embedding::EmbeddingProvider;
use slp::manager::{self, CompletionReport, QueryRequest};
use slp::program::{forget, search, stats, usage};

/// The SLP MCP tool handler. Holds shared state (db connection, embedding provider,
/// config) and exposes all MCP tools via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct SlpTools {
    tool_router: ToolRouter<Self>,
    db: Arc<Mutex<Connection>>,
    embedding: Arc<dyn EmbeddingProvider>,
    config: Arc<SlpConfig>,
}

/// Run a closure against the locked connection on the blocking pool.
async fn with_db<T, F>(db: &Arc<Mutex<Connection>>, label: &str, f: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> anyhow::Result<T> + Send + 'static,
{
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || {
        let mut conn = db
            .lock()
            .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
        f(&mut conn)
    })
    .await
    .map_err(|e| format!("db task failed: {e}"))?
    .map_err(|e| format!("{label} failed: {e:#}"))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("serialization failed: {e}"))
}

#[tool_router]
impl SlpTools {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        embedding: Arc<dyn EmbeddingProvider>,
        config: Arc<SlpConfig>,
    ) -> Self {
        Self {
            tool_router: Self::tool_router(),
            db,
            embedding,
            config,
        }
    }

    /// Look up a cached latent program for an incoming query.
    #[tool(description = "Find a cached execution configuration (latent program) for a query. Returns the best match above the similarity and confidence thresholds, or null on a miss. Reuse the returned config, then call record_execution.")]
    async fn find_program(
        &self,
        Parameters(params): Parameters<FindProgramParams>,
    ) -> Result<String, String> {
        if params.query.trim().is_empty() {
            return Err("query must not be empty".into());
        }
        tracing::info!(query_len = params.query.len(), "find_program called");

        let request = QueryRequest {
            query: params.query,
            context: params.context.unwrap_or_default(),
            user_profile: params.user_profile,
        };
        let include_candidates = params.include_candidates.unwrap_or(false);
        let embedding = Arc::clone(&self.embedding);
        let config = Arc::clone(&self.config);

        let mut lookup = with_db(&self.db, "lookup", move |conn| {
            manager::find_matching_program(conn, embedding.as_ref(), &config.matching, &request)
        })
        .await?;
        if !include_candidates {
            lookup.candidates.clear();
        }
        to_json(&lookup)
    }

    /// Capture the configuration of a request handled without a cached program.
    #[tool(description = "Offer a just-executed configuration for caching. Captured only if the outcome succeeded with enough quality, acceptable latency, and a substantive response. Returns captured/skipped with reasons.")]
    async fn capture_program(
        &self,
        Parameters(params): Parameters<CaptureProgramParams>,
    ) -> Result<String, String> {
        if params.query.trim().is_empty() {
            return Err("query must not be empty".into());
        }
        tracing::info!(
            success = params.outcome.success,
            supersedes = ?params.supersedes,
            "capture_program called"
        );

        let embedding = Arc::clone(&self.embedding);
        let config = Arc::clone(&self.config);
        let outcome = with_db(&self.db, "capture", move |conn| {
            let request = QueryRequest {
                query: params.query,
                context: params.context.unwrap_or_default(),
                user_profile: params.user_profile,
            };
            manager::complete_interaction(
                conn,
                embedding.as_ref(),
                &config,
                &CompletionReport {
                    request: &request,
                    program_id: None,
                    outcome: &params.outcome,
                    response_text: &params.response_text,
                    program_config: Some(&params.config),
                    supersedes: params.supersedes.as_deref(),
                },
            )
        })
        .await?;
        to_json(&outcome)
    }

    /// Report the outcome of reusing a program.
    #[tool(description = "Report how executing a program returned by find_program went. Updates usage statistics and confidence; may promote or retire the program.")]
    async fn record_execution(
        &self,
        Parameters(params): Parameters<RecordExecutionParams>,
    ) -> Result<String, String> {
        tracing::info!(
            program_id = %params.program_id,
            success = params.outcome.success,
            "record_execution called"
        );
        let config = Arc::clone(&self.config);
        let outcome = with_db(&self.db, "record", move |conn| {
            manager::record_reuse(conn, &config, &params.program_id, &params.outcome)
        })
        .await?;
        to_json(&outcome)
    }

    /// Blend user feedback into a program's confidence.
    #[tool(description = "Record user feedback (0.0-1.0) about a response produced with a cached program.")]
    async fn record_feedback(
        &self,
        Parameters(params): Parameters<RecordFeedbackParams>,
    ) -> Result<String, String> {
        if !(0.0..=1.0).contains(&params.score) {
            return Err("score must be between 0.0 and 1.0".into());
        }
        tracing::info!(program_id = %params.program_id, score = params.score, "record_feedback called");
        let config = Arc::clone(&self.config);
        let update = with_db(&self.db, "feedback", move |conn| {
            usage::record_feedback(conn, &params.program_id, params.score, &config.learning)
        })
        .await?;
        to_json(&update)
    }

    /// Inspect a specific program by ID.
    #[tool(description = "Inspect a program by ID. Returns signature, configuration, statistics, and optionally execution history and audit log.")]
    async fn program_inspect(
        &self,
        Parameters(params): Parameters<ProgramInspectParams>,
    ) -> Result<String, String> {
        tracing::info!(id = %params.id, "program_inspect called");
        let include_executions = params.include_executions.unwrap_or(false);
        let include_log = params.include_log.unwrap_or(false);
        let response = with_db(&self.db, "inspect", move |conn| {
            search::inspect_program(conn, &params.id, include_executions, include_log)
        })
        .await?;
        to_json(&response)
    }

    /// Get statistics about the program store.
    #[tool(description = "Get program store statistics: counts by status and intent, execution success rate, lookup hit rate, most-used programs, storage size.")]
    async fn program_stats(
        &self,
        Parameters(params): Parameters<ProgramStatsParams>,
    ) -> Result<String, String> {
        tracing::info!("program_stats called");
        let db_path: PathBuf = self.config.resolved_db_path();
        let top = params.top.unwrap_or(stats::DEFAULT_TOP_PROGRAMS);
        let response = with_db(&self.db, "stats", move |conn| {
            stats::program_stats(conn, Some(&db_path), top)
        })
        .await?;
        to_json(&response)
    }

    /// Retire or delete a program.
    #[tool(description = "Retire a program so it no longer matches (or permanently delete it with hard_delete=true).")]
    async fn retire_program(
        &self,
        Parameters(params): Parameters<RetireProgramParams>,
    ) -> Result<String, String> {
        let hard_delete = params.hard_delete.unwrap_or(false);
        tracing::info!(id = %params.id, hard_delete, "retire_program called");
        let result = with_db(&self.db, "retire", move |conn| {
            forget::forget_program(conn, &params.id, params.reason.as_deref(), hard_delete)
        })
        .await?;
        to_json(&result)
    }
}

#[tool_handler]
impl ServerHandler for SlpTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "SLP caches execution configurations of successful requests. Call find_program \
                 before handling a query; on a hit reuse its config and call record_execution, \
                 on a miss handle the query normally and call capture_program."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
