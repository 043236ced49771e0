//! CLI `maintain` command: promotion, retirement, decay, and eviction.

use anyhow::Result;

use slp::config::SlpConfig;
use slp::program::lifecycle;

/// Run a full maintenance cycle. `dry_run` reports eviction candidates without deleting.
pub fn maintain(config: &SlpConfig, dry_run: bool) -> Result<()> {
    let db_path = config.resolved_db_path();
    let mut conn = slp::db::open_database(&db_path)?;

    let report = lifecycle::run_maintenance(&mut conn, &config.lifecycle, dry_run)?;

    println!("Promoted {} program(s) to active.", report.promoted.len());
    for id in &report.promoted {
        println!("  + {id}");
    }
    println!("Retired {} program(s).", report.retired.len());
    for id in &report.retired {
        println!("  - {id}");
    }
    println!("Decayed confidence of {} idle program(s).", report.decayed);

    let eviction = &report.eviction;
    if eviction.candidates.is_empty() {
        println!("Nothing to evict.");
        return Ok(());
    }

    if dry_run {
        println!(
            "Found {} candidate(s) for eviction (dry run: nothing deleted):\n",
            eviction.candidates.len()
        );
        println!(
            "{:<38} {:<16} {:<10} {}",
            "ID", "Reason", "Confidence", "Query"
        );
        println!("{}", "-".repeat(90));
        for c in &eviction.candidates {
            println!(
                "{:<38} {:<16} {:<10.4} {}",
                c.id, c.reason, c.confidence, c.query_preview
            );
        }
    } else {
        println!("Evicted {} program(s).", eviction.deleted);
    }

    Ok(())
}
