mod helpers;

use helpers::{insert_program, outcome, signature, status_of, test_db, test_embedding};
use slp::config::{LearningConfig, MatchingConfig};
use slp::program::forget::forget_program;
use slp::program::search::{find_similar_programs, SearchParams};
use slp::program::usage::record_execution;

#[test]
fn retired_program_no_longer_matches() {
    let mut conn = test_db();
    let query = "Compare these two lease agreements";
    let id = insert_program(&mut conn, query, 0.8, &test_embedding(0));

    let result = forget_program(&mut conn, &id, Some("wrong format"), false).unwrap();
    assert!(!result.hard_deleted);
    assert_eq!(status_of(&conn, &id), "retired");
    let vectors: i64 = conn
        .query_row("SELECT COUNT(*) FROM programs_vec WHERE id = ?1", [&id], |row| row.get(0))
        .unwrap();
    assert_eq!(vectors, 0);

    let matches = find_similar_programs(
        &conn,
        &signature(query),
        &test_embedding(0),
        &SearchParams::from(&MatchingConfig::default()),
    )
    .unwrap();
    assert!(matches.is_empty());
}

#[test]
fn retiring_frees_the_signature() {
    let mut conn = test_db();
    let query = "Compare these two lease agreements";
    let first = insert_program(&mut conn, query, 0.8, &test_embedding(0));
    forget_program(&mut conn, &first, None, false).unwrap();

    let second = insert_program(&mut conn, query, 0.8, &test_embedding(0));
    assert_ne!(first, second);
    assert_eq!(status_of(&conn, &second), "experimental");
}

#[test]
fn retire_is_idempotent() {
    let mut conn = test_db();
    let id = insert_program(&mut conn, "Compare these two lease agreements", 0.8, &test_embedding(0));
    forget_program(&mut conn, &id, None, false).unwrap();
    forget_program(&mut conn, &id, None, false).unwrap();

    let retire_entries: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM program_log WHERE operation = 'retire' AND program_id = ?1",
            [&id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(retire_entries, 1);
}

#[test]
fn hard_delete_cascades_and_keeps_audit() {
    let mut conn = test_db();
    let id = insert_program(&mut conn, "Compare these two lease agreements", 0.8, &test_embedding(0));
    record_execution(&mut conn, &id, &outcome(true), &LearningConfig::default()).unwrap();

    let result = forget_program(&mut conn, &id, Some("obsolete"), true).unwrap();
    assert!(result.hard_deleted);

    let count = |sql: &str| -> i64 { conn.query_row(sql, [&id], |row| row.get(0)).unwrap() };
    assert_eq!(count("SELECT COUNT(*) FROM latent_programs WHERE id = ?1"), 0);
    assert_eq!(count("SELECT COUNT(*) FROM programs_vec WHERE id = ?1"), 0);
    assert_eq!(count("SELECT COUNT(*) FROM program_executions WHERE program_id = ?1"), 0);
    assert_eq!(
        count("SELECT COUNT(*) FROM program_log WHERE operation = 'delete' AND program_id = ?1"),
        1
    );
}

#[test]
fn forgetting_unknown_program_errors() {
    let mut conn = test_db();
    assert!(forget_program(&mut conn, "missing", None, false).is_err());
    assert!(forget_program(&mut conn, "missing", None, true).is_err());
}
