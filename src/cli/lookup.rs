use anyhow::Result;

use slp::config::SlpConfig;
use slp::manager::{self, QueryRequest};
use slp::program::truncate_preview;

/// Run a lookup from the terminal and show what a host would get back.
pub fn lookup(config: &SlpConfig, query: &str, user_profile: Option<String>) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = slp::db::open_database(&db_path)?;

    let provider = slp::embedding::create_provider(&config.embedding)?;

    let request = QueryRequest {
        query: query.to_string(),
        context: Default::default(),
        user_profile,
    };

    let result = manager::preview_matching_program(&conn, provider.as_ref(), &config.matching, &request)?;

    let sig = &result.signature;
    let short_hash = sig.signature_hash.get(..16).unwrap_or(&sig.signature_hash);
    println!("Signature {short_hash}");
    println!("  Intent:       {}", sig.primary_intent);
    if !sig.secondary_intents.is_empty() {
        let secondary: Vec<&str> = sig.secondary_intents.iter().map(|i| i.as_str()).collect();
        println!("  Secondary:    {}", secondary.join(", "));
    }
    if !sig.content_domains.is_empty() {
        let domains: Vec<&str> = sig.content_domains.iter().map(|d| d.as_str()).collect();
        println!("  Domains:      {}", domains.join(", "));
    }
    println!("  Length:       {}", sig.length_category);
    println!("  Complexity:   {}", sig.complexity);
    println!();

    let Some(best) = result.best.as_ref() else {
        println!("No matching program (miss).");
        return Ok(());
    };

    for (i, m) in std::iter::once(best).chain(result.candidates.iter()).enumerate() {
        println!(
            "  {}. {} [{}] similarity {:.3} (structural {:.3}, semantic {:.3}) confidence {:.2} uses {}",
            i + 1,
            m.program.id,
            m.program.status,
            m.similarity,
            m.structural_similarity,
            m.semantic_similarity,
            m.program.confidence,
            m.program.usage_count,
        );
        println!("     {}", truncate_preview(&m.program.query_text, 100));
    }

    Ok(())
}
