use std::collections::BTreeSet;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use scheduler_core::{
    AttemptEngine, Difficulty, ProblemCatalogue, ReviewScheduler, SessionAssembler,
    SessionLifecycleManager, Settings, Store, SystemClock, TagMasteryEngine,
};
use scheduler_server::{build_router, AppState};
use scheduler_storage::{init_store_db, SqliteStore};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

async fn test_app() -> (Arc<AppState>, Arc<dyn Store>) {
    let pool = init_store_db("sqlite::memory:").await.unwrap();
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
    let clock = Arc::new(SystemClock);

    let catalogue = Arc::new(ProblemCatalogue::new(store.clone()));
    let review_scheduler = Arc::new(ReviewScheduler::new(store.clone(), clock.clone()));
    let assembler = Arc::new(SessionAssembler::new(
        catalogue.clone(),
        review_scheduler.clone(),
        store.clone(),
        clock.clone(),
    ));
    let tag_mastery = Arc::new(TagMasteryEngine::new(store.clone(), clock.clone()));
    let attempt_engine = Arc::new(AttemptEngine::new(store.clone(), clock.clone()));
    let default_tags: BTreeSet<String> = ["array".to_string()].into_iter().collect();

    let lifecycle = Arc::new(SessionLifecycleManager::new(
        store.clone(),
        clock,
        assembler,
        tag_mastery.clone(),
        Settings::default().normalized(),
        default_tags,
    ));

    let state = Arc::new(AppState {
        store: store.clone(),
        attempt_engine,
        tag_mastery,
        review_scheduler,
        catalogue,
        lifecycle,
    });

    (state, store)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check_returns_ok() {
    let (state, _store) = test_app().await;
    let app = build_router(state);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn add_attempt_for_unknown_problem_returns_404() {
    let (state, _store) = test_app().await;
    let app = build_router(state);

    let payload = json!({
        "leetcode_id": 9999,
        "success": true,
        "time_spent": 120,
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/attempts")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "not_found");
}

#[tokio::test]
async fn add_attempt_records_against_existing_problem() {
    let (state, store) = test_app().await;
    let problem_id = Uuid::new_v4();
    let problem = scheduler_core::Problem {
        problem_id,
        leetcode_id: 1,
        title: "Two Sum".to_string(),
        slug: "two-sum".to_string(),
        difficulty: Difficulty::Easy,
        tags: ["array".to_string()].into_iter().collect(),
        box_level: 0,
        review_schedule: chrono::Utc::now(),
        last_attempt_date: None,
        attempt_stats: scheduler_core::AttemptStats::new(),
    };
    store.put_problem(&problem).await.unwrap();

    let app = build_router(state);
    let payload = json!({
        "problem_id": problem_id,
        "success": true,
        "time_spent": 300,
        "hints_used": 1,
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/attempts")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["attempt"]["problem_id"], problem_id.to_string());
    assert_eq!(body["attempt"]["success"], true);
}

#[tokio::test]
async fn create_and_fetch_session_round_trips() {
    let (state, store) = test_app().await;
    for i in 0..5 {
        let problem = scheduler_core::Problem {
            problem_id: Uuid::new_v4(),
            leetcode_id: i,
            title: format!("Problem {i}"),
            slug: format!("problem-{i}"),
            difficulty: Difficulty::Easy,
            tags: ["array".to_string()].into_iter().collect(),
            box_level: 0,
            review_schedule: chrono::Utc::now(),
            last_attempt_date: None,
            attempt_stats: scheduler_core::AttemptStats::new(),
        };
        store.put_problem(&problem).await.unwrap();
    }
    let app = build_router(state);

    let payload = json!({ "session_type": "standard" });
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sessions")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = body_json(response).await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    let session_id = body["session"]["session_id"]
        .as_str()
        .expect("session should have been created")
        .to_string();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/sessions/{session_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["session"]["session_id"], session_id);
}

#[tokio::test]
async fn get_session_for_unknown_id_is_404() {
    let (state, _store) = test_app().await;
    let app = build_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/sessions/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn review_schedule_returns_problems_array() {
    let (state, _store) = test_app().await;
    let app = build_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/review-schedule?n=5")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["problems"].is_array());
}
