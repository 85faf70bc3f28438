/// Integration tests for the CLI's wiring against a real sqlite database.
use scheduler_cli::context::Context;
use scheduler_core::{Difficulty, NewAttempt, Problem};
use std::path::PathBuf;
use tempfile::TempDir;
use uuid::Uuid;

async fn setup_test_db() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("scheduler.db");
    (temp_dir, db_path)
}

fn sample_problem(leetcode_id: i64, tag: &str) -> Problem {
    Problem {
        problem_id: Uuid::new_v4(),
        leetcode_id,
        title: format!("Problem {leetcode_id}"),
        slug: format!("problem-{leetcode_id}"),
        difficulty: Difficulty::Easy,
        tags: [tag.to_string()].into_iter().collect(),
        box_level: 1,
        review_schedule: chrono::Utc::now(),
        last_attempt_date: None,
        attempt_stats: scheduler_core::AttemptStats::new(),
    }
}

#[tokio::test]
async fn context_connects_and_runs_migrations() {
    let (_temp_dir, db_path) = setup_test_db().await;
    let ctx = Context::connect(db_path.to_str().unwrap()).await.unwrap();

    let problem = sample_problem(1, "array");
    ctx.store.put_problem(&problem).await.unwrap();

    let fetched = ctx.catalogue.by_leetcode_id(1).await.unwrap();
    assert!(fetched.is_some());
}

#[tokio::test]
async fn attempt_engine_records_against_seeded_problem() {
    let (_temp_dir, db_path) = setup_test_db().await;
    let ctx = Context::connect(db_path.to_str().unwrap()).await.unwrap();

    let problem = sample_problem(42, "hash-table");
    let problem_id = problem.problem_id;
    ctx.store.put_problem(&problem).await.unwrap();

    let outcome = ctx
        .attempt_engine
        .add_attempt(
            NewAttempt {
                problem_id: Some(problem_id),
                leetcode_id: None,
                success: true,
                time_spent: 180,
                hints_used: 0,
                comments: None,
            },
            None,
        )
        .await
        .unwrap();

    let outcome = outcome.expect("problem exists");
    assert_eq!(outcome.attempt.problem_id, problem_id);
    assert!(outcome.attempt.success);

    let updated = ctx.catalogue.get(problem_id).await.unwrap().unwrap();
    assert_eq!(updated.box_level, 2);
}

#[tokio::test]
async fn lifecycle_creates_session_from_seeded_problems() {
    let (_temp_dir, db_path) = setup_test_db().await;
    let ctx = Context::connect(db_path.to_str().unwrap()).await.unwrap();

    for i in 0..5 {
        ctx.store.put_problem(&sample_problem(i, "array")).await.unwrap();
    }

    let session = ctx
        .lifecycle
        .get_or_create_session(scheduler_core::SessionType::Standard)
        .await
        .unwrap();

    assert!(session.is_some());
    assert!(!session.unwrap().problems.is_empty());
}
