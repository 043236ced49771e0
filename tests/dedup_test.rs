mod helpers;

use helpers::{insert_program, program_config, signature, similar_embedding, test_db, test_embedding};
use slp::program::store::store_program;
use slp::program::types::NewProgram;

#[test]
fn same_signature_lands_on_owner() {
    let mut conn = test_db();
    let query = "Summarize the quarterly revenue report";
    let first = insert_program(&mut conn, query, 0.6, &test_embedding(0));

    // Different wording and vector, same signature
    let config = program_config("Give a short summary");
    let result = store_program(
        &mut conn,
        &NewProgram {
            signature: &signature(query),
            query_text: "Summarize the quarterly revenue report please",
            config: &config,
            confidence: 0.6,
            supersedes: None,
        },
        &test_embedding(200),
        helpers::DEDUP_SIMILARITY,
        helpers::SEMANTIC_WEIGHT,
    )
    .unwrap();

    assert!(result.deduplicated);
    assert_eq!(result.id, first, "should return the owning program's ID");

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM latent_programs", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);

    // The owner's confidence was bumped
    let confidence: f64 = conn
        .query_row(
            "SELECT confidence FROM latent_programs WHERE id = ?1",
            [&first],
            |row| row.get(0),
        )
        .unwrap();
    assert!(confidence > 0.6);
}

#[test]
fn near_duplicate_signature_merges() {
    let mut conn = test_db();
    let query = "Summarize the quarterly revenue report";
    let base = signature(query);
    let emb = test_embedding(0);
    let first = insert_program(&mut conn, query, 0.6, &emb);

    // Only the user profile differs: structural 0.95, semantic ~1
    let mut variant = base.clone();
    variant.user_profile = Some("analyst".into());
    variant.rehash();
    assert_ne!(variant.signature_hash, base.signature_hash);

    let config = program_config("Summarize for an analyst");
    let result = store_program(
        &mut conn,
        &NewProgram {
            signature: &variant,
            query_text: query,
            config: &config,
            confidence: 0.6,
            supersedes: None,
        },
        &similar_embedding(&emb),
        0.95,
        helpers::SEMANTIC_WEIGHT,
    )
    .unwrap();

    assert!(result.deduplicated);
    assert_eq!(result.id, first);
}

#[test]
fn different_signatures_do_not_merge() {
    let mut conn = test_db();
    let emb = test_embedding(0);

    let a = insert_program(&mut conn, "Summarize the quarterly revenue report", 0.6, &emb);
    let b = insert_program(&mut conn, "Compare these two lease agreements", 0.6, &emb);

    assert_ne!(a, b);
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM latent_programs", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 2);
}

#[test]
fn one_live_owner_per_signature_is_enforced_by_the_schema() {
    let mut conn = test_db();
    let query = "Compare these two lease agreements";
    let id = insert_program(&mut conn, query, 0.6, &test_embedding(4));
    let hash = signature(query).signature_hash;

    let result = conn.execute(
        "INSERT INTO latent_programs (id, signature_hash, primary_intent, signature, query_text, \
         config, created_at, updated_at) \
         SELECT 'dup', signature_hash, primary_intent, signature, query_text, config, created_at, \
         updated_at FROM latent_programs WHERE id = ?1",
        [&id],
    );
    assert!(result.is_err(), "second live owner of {hash} should be rejected");
}
