use anyhow::Result;

use slp::config::SlpConfig;
use slp::program::stats::{program_stats, DEFAULT_TOP_PROGRAMS};

/// Display program statistics in the terminal.
pub fn stats(config: &SlpConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = slp::db::open_database(&db_path)?;

    let response = program_stats(&conn, Some(&db_path), DEFAULT_TOP_PROGRAMS)?;

    println!("Program Statistics");
    println!("{}", "=".repeat(40));
    println!("  Total programs:      {}", response.total_programs);
    for (status, count) in &response.by_status {
        println!("  {:<20} {}", format!("{status}:"), count);
    }
    println!();

    if !response.by_intent.is_empty() {
        println!("By Intent:");
        for (intent, count) in &response.by_intent {
            println!("  {:<18} {}", intent, count);
        }
        println!();
    }

    println!("Executions:            {}", response.total_executions);
    println!(
        "Execution success:     {:.1}%",
        response.execution_success_rate * 100.0
    );
    println!(
        "Lookups:               {} ({} hits, {:.1}% hit rate)",
        response.lookups,
        response.hits,
        response.hit_rate * 100.0
    );
    if let Some(sim) = response.avg_hit_similarity {
        println!("Avg hit similarity:    {sim:.3}");
    }
    println!("Database size:         {} bytes", response.db_size_bytes);

    if let Some(ref oldest) = response.oldest_program {
        println!("Oldest program:        {oldest}");
    }
    if let Some(ref newest) = response.newest_program {
        println!("Newest program:        {newest}");
    }

    if !response.top_programs.is_empty() {
        println!();
        println!("Most used:");
        for p in &response.top_programs {
            println!(
                "  {} {:<18} {:<12} uses {:<5} success {:.0}% confidence {:.2}",
                p.id,
                p.intent,
                p.status,
                p.usage_count,
                p.success_rate * 100.0,
                p.confidence
            );
        }
    }

    Ok(())
}
