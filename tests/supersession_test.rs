mod helpers;

use helpers::{insert_program, insert_with, signature, status_of, test_db, test_embedding};
use slp::config::MatchingConfig;
use slp::program::search::{find_similar_programs, SearchParams};
use slp::program::store::get_program;

#[test]
fn superseded_program_excluded_from_search() {
    let mut conn = test_db();
    let query = "Compare these two lease agreements";
    let sig = signature(query);
    let emb = test_embedding(0);

    let old = insert_program(&mut conn, query, 0.8, &emb);
    let new = insert_with(&mut conn, &sig, query, 0.8, &emb, Some(&old));
    assert_ne!(old, new);

    assert_eq!(status_of(&conn, &old), "retired");
    assert_eq!(status_of(&conn, &new), "experimental");

    let old_vectors: i64 = conn
        .query_row("SELECT COUNT(*) FROM programs_vec WHERE id = ?1", [&old], |row| row.get(0))
        .unwrap();
    assert_eq!(old_vectors, 0, "retired parent keeps no vector");

    let matches =
        find_similar_programs(&conn, &sig, &emb, &SearchParams::from(&MatchingConfig::default()))
            .unwrap();
    let ids: Vec<&str> = matches.iter().map(|m| m.program.id.as_str()).collect();
    assert_eq!(ids, vec![new.as_str()]);
}

#[test]
fn supersession_links_versions() {
    let mut conn = test_db();
    let query = "Explain how the database server handles deploys";
    let sig = signature(query);

    let v1 = insert_program(&mut conn, query, 0.7, &test_embedding(10));
    let v2 = insert_with(&mut conn, &sig, query, 0.7, &test_embedding(10), Some(&v1));
    let v3 = insert_with(&mut conn, &sig, query, 0.7, &test_embedding(10), Some(&v2));

    let p2 = get_program(&conn, &v2).unwrap().unwrap();
    let p3 = get_program(&conn, &v3).unwrap().unwrap();
    assert_eq!(p2.version, 2);
    assert_eq!(p2.parent_id.as_deref(), Some(v1.as_str()));
    assert_eq!(p3.version, 3);
    assert_eq!(p3.parent_id.as_deref(), Some(v2.as_str()));

    let supersede_entries: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM program_log WHERE operation = 'supersede'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(supersede_entries, 2);
}

#[test]
fn superseding_unknown_program_fails_without_writing() {
    let mut conn = test_db();
    let query = "Write a poem about my family vacation";
    let config = helpers::program_config("Write a poem");

    let result = slp::program::store::store_program(
        &mut conn,
        &slp::program::types::NewProgram {
            signature: &signature(query),
            query_text: query,
            config: &config,
            confidence: 0.6,
            supersedes: Some("no-such-program"),
        },
        &test_embedding(3),
        helpers::DEDUP_SIMILARITY,
        helpers::SEMANTIC_WEIGHT,
    );
    assert!(result.is_err());

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM latent_programs", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}
