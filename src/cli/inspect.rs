//! CLI `inspect` command: display full details for a single program.

use anyhow::Result;

use slp::config::SlpConfig;

/// Inspect a single program by ID and display full details.
pub fn inspect(config: &SlpConfig, id: &str) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = slp::db::open_database(&db_path)?;

    let response = slp::program::search::inspect_program(&conn, id, true, true)?;

    let p = &response.program;
    let sig = &p.signature;
    println!("Program: {}", p.id);
    println!("{}", "=".repeat(50));
    println!("  Status:         {} (v{})", p.status, p.version);
    if let Some(ref parent) = p.parent_id {
        println!("  Supersedes:     {parent}");
    }
    println!("  Intent:         {}", sig.primary_intent);
    println!("  Complexity:     {}", sig.complexity);
    println!("  Length:         {}", sig.length_category);
    if let Some(ref profile) = sig.user_profile {
        println!("  User profile:   {profile}");
    }
    println!("  Signature:      {}", sig.signature_hash);
    println!("  Confidence:     {:.2}", p.confidence);
    println!(
        "  Usage:          {} ({} succeeded, {:.0}%)",
        p.usage_count,
        p.success_count,
        p.success_rate * 100.0
    );
    println!("  Avg latency:    {:.0} ms", p.avg_latency_ms);
    println!("  Avg quality:    {:.2}", p.avg_quality);
    if let Some(score) = p.feedback_score {
        println!("  Feedback:       {score:.2} ({} reports)", p.feedback_count);
    }
    if let Some(ref lu) = p.last_used {
        println!("  Last used:      {lu}");
    }
    println!("  Created:        {}", p.created_at);
    println!("  Updated:        {}", p.updated_at);
    println!();
    println!("Query:");
    println!("  {}", p.query_text);
    println!();
    println!("Configuration:");
    println!("{}", serde_json::to_string_pretty(&p.config)?);

    if let Some(ref executions) = response.executions {
        if !executions.is_empty() {
            println!();
            println!("Executions:");
            for e in executions {
                let quality = e
                    .quality_score
                    .map(|q| format!(" quality {q:.2}"))
                    .unwrap_or_default();
                println!(
                    "  {} {} {} ms {} tokens{}",
                    e.created_at,
                    if e.success { "ok  " } else { "FAIL" },
                    e.latency_ms,
                    e.token_count,
                    quality
                );
            }
        }
    }

    if let Some(ref log) = response.log {
        if !log.is_empty() {
            println!();
            println!("Audit Log:");
            for entry in log {
                let details = entry
                    .details
                    .as_ref()
                    .map(|d| d.to_string())
                    .unwrap_or_default();
                println!("  {} [{}] {}", entry.created_at, entry.operation, details);
            }
        }
    }

    Ok(())
}
