use crate::store::SqliteStore;
use chrono::Utc;
use scheduler_core::{
    Attempt, AttemptStats, Difficulty, PerformanceLevel, Problem, Session, SessionOrigin,
    SessionProblem, SessionState, SessionStatus, SessionType, Store, TagMastery,
};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use uuid::Uuid;

async fn test_store() -> SqliteStore {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    SqliteStore::new(pool)
}

fn problem(leetcode_id: i64, tags: &[&str]) -> Problem {
    Problem {
        problem_id: Uuid::new_v4(),
        leetcode_id,
        title: format!("Problem {leetcode_id}"),
        slug: format!("problem-{leetcode_id}"),
        difficulty: Difficulty::Easy,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        box_level: 1,
        review_schedule: Utc::now(),
        last_attempt_date: None,
        attempt_stats: AttemptStats::new(),
    }
}

#[tokio::test]
async fn put_and_get_problem_round_trips_tags() {
    let store = test_store().await;
    let p = problem(1, &["array", "hash-table"]);

    store.put_problem(&p).await.unwrap();

    let fetched = store.get_problem(p.problem_id).await.unwrap().unwrap();
    assert_eq!(fetched.leetcode_id, 1);
    assert_eq!(
        fetched.tags,
        BTreeSet::from(["array".to_string(), "hash-table".to_string()])
    );

    let by_leetcode = store.get_problem_by_leetcode_id(1).await.unwrap().unwrap();
    assert_eq!(by_leetcode.problem_id, p.problem_id);
}

#[tokio::test]
async fn problems_by_tag_filters_correctly() {
    let store = test_store().await;
    store.put_problem(&problem(1, &["array"])).await.unwrap();
    store.put_problem(&problem(2, &["graph"])).await.unwrap();
    store
        .put_problem(&problem(3, &["array", "graph"]))
        .await
        .unwrap();

    let array_problems = store.problems_by_tag("array").await.unwrap();
    let ids: BTreeSet<i64> = array_problems.iter().map(|p| p.leetcode_id).collect();
    assert_eq!(ids, BTreeSet::from([1, 3]));
}

#[tokio::test]
async fn record_attempt_atomic_writes_attempt_and_problem_together() {
    let store = test_store().await;
    let p = problem(10, &["dp"]);
    store.put_problem(&p).await.unwrap();

    let mut updated = p.clone();
    updated.box_level = 2;
    updated.attempt_stats.record(true);

    let attempt = Attempt {
        attempt_id: Uuid::new_v4(),
        problem_id: p.problem_id,
        leetcode_id: p.leetcode_id,
        session_id: None,
        attempt_date: Utc::now(),
        success: true,
        time_spent: 600,
        hints_used: 0,
        box_level_at_attempt: 1,
        comments: None,
    };

    store
        .record_attempt_atomic(&attempt, &updated)
        .await
        .unwrap();

    let stored_problem = store.get_problem(p.problem_id).await.unwrap().unwrap();
    assert_eq!(stored_problem.box_level, 2);
    assert_eq!(stored_problem.attempt_stats.successful, 1);

    let attempts = store.attempts_by_problem(p.problem_id).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].attempt_id, attempt.attempt_id);
}

#[tokio::test]
async fn seal_and_create_session_seals_sibling_and_inserts_new() {
    let store = test_store().await;
    let now = Utc::now();

    let existing = Session::new(SessionType::Standard, SessionOrigin::Generator, now);
    store.put_session(&existing).await.unwrap();

    let mut sealed = existing.clone();
    sealed.status = SessionStatus::Completed;

    let mut created = Session::new(SessionType::Standard, SessionOrigin::Generator, now);
    created.problems.push(SessionProblem {
        problem_id: Uuid::new_v4(),
        leetcode_id: 5,
        selection_reason: scheduler_core::SelectionReason::Review,
    });

    store
        .seal_and_create_session(Some(&sealed), &created)
        .await
        .unwrap();

    let sealed_in_store = store.get_session(existing.session_id).await.unwrap().unwrap();
    assert_eq!(sealed_in_store.status, SessionStatus::Completed);

    let in_progress = store
        .get_in_progress_session(SessionType::Standard)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(in_progress.session_id, created.session_id);
    assert_eq!(in_progress.problems.len(), 1);
}

#[tokio::test]
async fn session_state_and_tag_mastery_round_trip() {
    let store = test_store().await;

    let state = SessionState {
        num_sessions_completed: 2,
        current_focus_tags: vec!["array".to_string()],
        performance_level: PerformanceLevel::Steady,
        last_performance: Some(scheduler_core::LastPerformance {
            accuracy: 0.9,
            efficiency_score: 0.3,
        }),
        previous_performance: Some(scheduler_core::LastPerformance {
            accuracy: 0.7,
            efficiency_score: 0.2,
        }),
        last_progress_date: None,
        current_difficulty_cap: Difficulty::Medium,
        session_length: 6,
        number_of_new_problems: 2,
        current_allowed_tags: BTreeSet::from(["array".to_string(), "graph".to_string()]),
    };
    store.put_session_state(&state).await.unwrap();

    let fetched = store.get_session_state().await.unwrap().unwrap();
    assert_eq!(fetched.num_sessions_completed, 2);
    assert_eq!(fetched.current_focus_tags, vec!["array".to_string()]);
    assert_eq!(fetched.last_performance.unwrap().accuracy, 0.9);
    assert_eq!(fetched.previous_performance.unwrap().accuracy, 0.7);

    let mastery = TagMastery {
        tag: "array".to_string(),
        total_attempts: 12,
        successful_attempts: 11,
        success_rate: 11.0 / 12.0,
        mastered: true,
        decay_score: 0.9,
        last_recomputed_at: Utc::now(),
    };
    store.put_tag_mastery(&mastery).await.unwrap();

    let fetched_mastery = store.get_tag_mastery("array").await.unwrap().unwrap();
    assert!(fetched_mastery.mastered);
    assert_eq!(fetched_mastery.total_attempts, 12);
}
