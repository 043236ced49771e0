//! Latent program cache for LLM hosts, served over MCP.
//!
//! SLP fingerprints each incoming request with a [`signature::ProgramSignature`]
//! (intent, document types, content domains, length, complexity, user profile,
//! TPV flag) and caches the execution configuration of requests that went well
//! as a **latent program**. When a later request has a similar signature, the
//! host gets the cached configuration back and can skip planning from scratch.
//!
//! | Status | Meaning | Matched |
//! |--------|---------|---------|
//! | **experimental** | Freshly captured | Yes, if `allow_experimental` |
//! | **active** | Proven by repeated successful use | Yes |
//! | **retired** | Underperforming, superseded, or removed by hand | Never |
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   holding one query embedding per program
//! - **Matching**: weighted structural signature similarity blended with
//!   query-embedding cosine similarity, ranked by `similarity × confidence`
//! - **Learning**: running usage statistics and confidence updates from reported
//!   outcomes and feedback; promotion, retirement, decay, and eviction
//! - **Transport**: MCP over stdio (primary) or Streamable HTTP
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite database initialization, schema, migrations, and health checks
//! - [`embedding`]: Text-to-vector embedding (ONNX all-MiniLM-L6-v2 or feature hashing)
//! - [`signature`]: Signature generation and structural similarity
//! - [`program`]: Program store: write path, search, usage, lifecycle, validation
//! - [`manager`]: Lookup, capture gating, and the post-execution flow

pub mod config;
pub mod db;
pub mod embedding;
pub mod manager;
pub mod program;
pub mod signature;
