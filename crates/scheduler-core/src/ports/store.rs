use crate::domain::{Attempt, Problem, Session, SessionState, SessionType, TagMastery};
use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

/// Narrow, transactional contract over the persistent entities of spec.md §6.
///
/// `Store` is a typed port rather than a single generic `get`/`put` pair:
/// Rust's trait objects can't express "any entity, any index" without
/// boxing every value as JSON, and the narrow per-entity methods below are
/// the same shape as `byIndex`/`scan` in spec.md §4.A applied to each of
/// `problems`, `attempts`, `sessions`, `tag_mastery`, and `session_state`.
/// Where the spec calls for cross-entity atomicity (the attempt write +
/// problem learning-state update; sealing a sibling session + inserting the
/// new one) the port exposes one atomic method for that unit of work,
/// mirroring how the teacher's `UserRepository::save_review_atomic` wraps a
/// transaction rather than exposing a generic `withTransaction` callback.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    // ---- problems -----------------------------------------------------
    async fn get_problem(&self, problem_id: Uuid) -> anyhow::Result<Option<Problem>>;
    async fn get_problem_by_leetcode_id(&self, leetcode_id: i64) -> anyhow::Result<Option<Problem>>;
    async fn scan_problems(&self) -> anyhow::Result<Vec<Problem>>;
    async fn problems_by_tag(&self, tag: &str) -> anyhow::Result<Vec<Problem>>;
    async fn put_problem(&self, problem: &Problem) -> anyhow::Result<()>;

    // ---- attempts -------------------------------------------------------
    async fn get_attempt(&self, attempt_id: Uuid) -> anyhow::Result<Option<Attempt>>;
    async fn attempts_by_problem(&self, problem_id: Uuid) -> anyhow::Result<Vec<Attempt>>;
    async fn attempts_by_session(&self, session_id: Uuid) -> anyhow::Result<Vec<Attempt>>;
    async fn scan_attempts(&self) -> anyhow::Result<Vec<Attempt>>;

    /// Atomically write a new attempt and the problem's updated learning
    /// state (new `box_level`, `review_schedule`, `attempt_stats`). This is
    /// the only place `attempts` and `problems.learning_state` are written
    /// together, satisfying spec.md §5's non-overlapping write-set rule.
    async fn record_attempt_atomic(
        &self,
        attempt: &Attempt,
        updated_problem: &Problem,
    ) -> anyhow::Result<()>;

    // ---- sessions ---------------------------------------------------------
    async fn get_session(&self, session_id: Uuid) -> anyhow::Result<Option<Session>>;
    async fn get_in_progress_session(
        &self,
        session_type: SessionType,
    ) -> anyhow::Result<Option<Session>>;
    async fn most_recent_in_progress_session(&self) -> anyhow::Result<Option<Session>>;
    async fn put_session(&self, session: &Session) -> anyhow::Result<()>;
    async fn delete_session(&self, session_id: Uuid) -> anyhow::Result<()>;

    /// Atomically seal any `in_progress` session of `sealed.session_type`
    /// (writing `sealed` as-is) and insert `created`. Used by
    /// `createNewSession` per spec.md §4.H.
    async fn seal_and_create_session<'a>(
        &self,
        sealed: Option<&'a Session>,
        created: &'a Session,
    ) -> anyhow::Result<()>;

    // ---- tag mastery -------------------------------------------------------
    async fn get_tag_mastery(&self, tag: &str) -> anyhow::Result<Option<TagMastery>>;
    async fn scan_tag_mastery(&self) -> anyhow::Result<Vec<TagMastery>>;
    async fn put_tag_mastery(&self, mastery: &TagMastery) -> anyhow::Result<()>;

    // ---- session state (singleton) -----------------------------------------
    async fn get_session_state(&self) -> anyhow::Result<Option<SessionState>>;
    async fn put_session_state(&self, state: &SessionState) -> anyhow::Result<()>;

    // ---- telemetry sink (write-only, not read by core logic) --------------
    async fn record_user_action(&self, action: &str, detail: &str) -> anyhow::Result<()>;
}

/// Per-problem counts by box level, for catalogue reporting.
pub type BoxLevelCounts = HashMap<u8, u32>;
