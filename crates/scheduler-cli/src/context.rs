use scheduler_core::{
    AttemptEngine, ProblemCatalogue, ReviewScheduler, SessionAssembler, SessionLifecycleManager,
    Settings, Store, SystemClock, TagMasteryEngine,
};
use scheduler_storage::{init_store_db, SqliteStore};
use std::collections::BTreeSet;
use std::sync::Arc;

/// The service graph a CLI command operates against, wired the same way the
/// server wires it but without an HTTP layer in front.
pub struct Context {
    pub store: Arc<dyn Store>,
    pub attempt_engine: Arc<AttemptEngine>,
    pub tag_mastery: Arc<TagMasteryEngine>,
    pub review_scheduler: Arc<ReviewScheduler>,
    pub catalogue: Arc<ProblemCatalogue>,
    pub lifecycle: Arc<SessionLifecycleManager>,
}

impl Context {
    pub async fn connect(db_path: &str) -> anyhow::Result<Self> {
        let pool = init_store_db(db_path).await?;
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
            clock,
            assembler,
            tag_mastery.clone(),
            Settings::default().normalized(),
            default_tier_tags,
        ));

        Ok(Self {
            store,
            attempt_engine,
            tag_mastery,
            review_scheduler,
            catalogue,
            lifecycle,
        })
    }
}
