use scheduler_core::{
    AttemptEngine, ProblemCatalogue, ReviewScheduler, SessionAssembler, SessionLifecycleManager,
    Settings, Store, SystemClock, TagMasteryEngine,
};
use scheduler_server::AppState;
use scheduler_storage::{init_store_db, SqliteStore};
use std::collections::BTreeSet;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).compact().init();

    tracing::info!("Starting scheduler server...");

    let db_path = std::env::var("SCHEDULER_DB_PATH").unwrap_or_else(|_| "data/scheduler.db".to_string());
    tracing::info!("Scheduler DB: {}", db_path);

    let pool = init_store_db(&db_path).await?;
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

    let default_tier_tags: BTreeSet<String> = std::env::var("SCHEDULER_DEFAULT_TAGS")
        .unwrap_or_else(|_| "array,hash-table".to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let lifecycle = Arc::new(SessionLifecycleManager::new(
        store.clone(),
        clock.clone(),
        assembler,
        tag_mastery.clone(),
        Settings::default().normalized(),
        default_tier_tags,
    ));

    let app_state = Arc::new(AppState {
        store,
        attempt_engine,
        tag_mastery,
        review_scheduler,
        catalogue,
        lifecycle,
    });

    let app = scheduler_server::build_router(app_state);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
