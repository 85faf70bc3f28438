use crate::concurrency::{self, COMPLETION_DEADLINE, DB_DEADLINE};
use crate::config::Settings;
use crate::domain::{
    Attempt, CoreError, LastPerformance, Problem, Session, SessionOrigin, SessionProblem,
    SessionState, SessionStatus, SessionType,
};
use crate::ports::{Clock, Store};
use crate::services::assembler::SessionAssembler;
use crate::services::focus::FocusCoordinator;
use crate::services::tag_mastery::TagMasteryEngine;
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{instrument, warn};
use uuid::Uuid;

const ALL_SESSION_TYPES: [SessionType; 4] = [
    SessionType::Standard,
    SessionType::Tracking,
    SessionType::InterviewLike,
    SessionType::FullInterview,
];

fn type_index(session_type: SessionType) -> usize {
    match session_type {
        SessionType::Standard => 0,
        SessionType::Tracking => 1,
        SessionType::InterviewLike => 2,
        SessionType::FullInterview => 3,
    }
}

/// Outcome of `checkAndCompleteSession` (spec.md §4.H): a session can be
/// missing, already/newly completed, or still have unattempted problems.
#[derive(Debug)]
pub enum CompletionStatus {
    NotFound,
    Completed,
    Remaining(Vec<Problem>),
}

/// Creates, resumes, refreshes, skips-within, and completes sessions. The
/// only mutator of `Session`, and the sole authority on session identity and
/// type (spec.md §4.H). Internally serializes creation/refresh per session
/// type via keyed latches so concurrent callers never double-create.
pub struct SessionLifecycleManager {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    assembler: Arc<SessionAssembler>,
    tag_mastery: Arc<TagMasteryEngine>,
    focus: FocusCoordinator,
    base_settings: Settings,
    default_tier_tags: BTreeSet<String>,
    creation_locks: [Mutex<()>; 4],
    refresh_locks: [Mutex<()>; 4],
    /// Keyed dedup latches for the completion pipeline (spec.md §5): two
    /// concurrent `check_and_complete_session` calls for the same session
    /// share one in-flight completion rather than racing each other.
    completion_locks: Mutex<BTreeMap<Uuid, Arc<Mutex<()>>>>,
}

impl SessionLifecycleManager {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        assembler: Arc<SessionAssembler>,
        tag_mastery: Arc<TagMasteryEngine>,
        base_settings: Settings,
        default_tier_tags: BTreeSet<String>,
    ) -> Self {
        Self {
            store,
            clock,
            assembler,
            tag_mastery,
            focus: FocusCoordinator::new(),
            base_settings,
            default_tier_tags,
            creation_locks: Default::default(),
            refresh_locks: Default::default(),
            completion_locks: Mutex::new(BTreeMap::new()),
        }
    }

    async fn completion_lock_for(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        self.completion_locks
            .lock()
            .await
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Canonical entry point: returns an existing compatible `in_progress`
    /// session of `session_type`, or atomically creates a fresh one.
    #[instrument(skip(self))]
    pub async fn get_or_create_session(&self, session_type: SessionType) -> Result<Option<Session>> {
        concurrency::with_deadline(DB_DEADLINE, async {
            let _guard = self.creation_locks[type_index(session_type)].lock().await;
            if let Some(existing) = self.find_compatible_in_progress(session_type).await? {
                return Ok(Some(existing));
            }
            self.build_and_persist_new_session(session_type).await
        })
        .await
    }

    /// Most recent `in_progress` session compatible with `session_type`; the
    /// most recent one overall if `session_type` is `None`.
    #[instrument(skip(self))]
    pub async fn resume_session(&self, session_type: Option<SessionType>) -> Result<Option<Session>> {
        concurrency::with_deadline(DB_DEADLINE, async {
            match session_type {
                Some(t) => self.find_compatible_in_progress(t).await,
                None => self.store.most_recent_in_progress_session().await,
            }
        })
        .await
    }

    /// Unconditionally builds a new session, sealing (without recomputing
    /// accuracy) any existing `in_progress` session of the same type first.
    #[instrument(skip(self))]
    pub async fn create_new_session(&self, session_type: SessionType) -> Result<Option<Session>> {
        concurrency::with_deadline(DB_DEADLINE, async {
            let _guard = self.creation_locks[type_index(session_type)].lock().await;
            self.build_and_persist_new_session(session_type).await
        })
        .await
    }

    /// `force_new = true` with no existing `in_progress` session of `type`
    /// is a hard guard: returns `None` rather than materializing a session
    /// of the wrong type. Otherwise deletes any existing session of `type`
    /// and creates a fresh one.
    #[instrument(skip(self))]
    pub async fn refresh_session(
        &self,
        session_type: SessionType,
        force_new: bool,
    ) -> Result<Option<Session>> {
        concurrency::with_deadline(DB_DEADLINE, async {
            let _guard = self.refresh_locks[type_index(session_type)].lock().await;
            let existing = self.store.get_in_progress_session(session_type).await?;
            if force_new && existing.is_none() {
                return Ok(None);
            }
            if let Some(existing) = &existing {
                self.store.delete_session(existing.session_id).await?;
            }
            self.build_and_persist_new_session(session_type).await
        })
        .await
    }

    /// Removes `leetcode_id` from the session's problem list, optionally
    /// appending `replacement` with `selection_reason = prerequisite`.
    /// Never touches attempts.
    #[instrument(skip(self, replacement))]
    pub async fn skip_problem(
        &self,
        session_id: Uuid,
        leetcode_id: i64,
        replacement: Option<Problem>,
    ) -> Result<()> {
        let Some(mut session) = self.store.get_session(session_id).await? else {
            return Err(CoreError::NotFound(format!("session {session_id}")).into());
        };
        session.problems.retain(|p| p.leetcode_id != leetcode_id);
        if let Some(replacement) = replacement {
            session.problems.push(SessionProblem {
                problem_id: replacement.problem_id,
                leetcode_id: replacement.leetcode_id,
                selection_reason: crate::domain::SelectionReason::Prerequisite,
            });
        }
        session.last_activity_time = self.clock.now();
        self.store.put_session(&session).await?;
        Ok(())
    }

    /// Idempotent: a session already `completed` short-circuits to
    /// `Completed` without recomputing mastery again.
    #[instrument(skip(self))]
    pub async fn check_and_complete_session(&self, session_id: Uuid) -> Result<CompletionStatus> {
        let lock = self.completion_lock_for(session_id).await;
        let _guard = lock.lock().await;

        concurrency::with_deadline(COMPLETION_DEADLINE, async {
            let Some(session) = self.store.get_session(session_id).await? else {
                return Ok(CompletionStatus::NotFound);
            };
            if session.status == SessionStatus::Completed {
                return Ok(CompletionStatus::Completed);
            }

            let attempts = self.store.attempts_by_session(session_id).await?;
            let attempted: BTreeSet<i64> = attempts.iter().map(|a| a.leetcode_id).collect();

            let mut unattempted = Vec::new();
            for session_problem in &session.problems {
                if session_problem.leetcode_id <= 0 {
                    return Err(CoreError::InvariantViolation(format!(
                        "session {session_id} references problem {} with an invalid leetcode_id",
                        session_problem.problem_id
                    ))
                    .into());
                }
                if !attempted.contains(&session_problem.leetcode_id) {
                    if let Some(problem) = self.store.get_problem(session_problem.problem_id).await? {
                        unattempted.push(problem);
                    }
                }
            }

            if !unattempted.is_empty() {
                return Ok(CompletionStatus::Remaining(unattempted));
            }

            self.complete_session(session, attempts).await?;
            Ok(CompletionStatus::Completed)
        })
        .await
    }

    /// The effective `SessionState`, lazily created if none exists yet.
    /// Exposed so callers building a daily review schedule (which needs
    /// `current_focus_tags`/`current_allowed_tags`) don't have to duplicate
    /// the lazy-init logic.
    #[instrument(skip(self))]
    pub async fn current_state(&self) -> Result<SessionState> {
        self.current_session_state().await
    }

    async fn find_compatible_in_progress(&self, expected: SessionType) -> Result<Option<Session>> {
        if let Some(session) = self.store.get_in_progress_session(expected).await? {
            return Ok(Some(session));
        }
        for candidate_type in ALL_SESSION_TYPES {
            if candidate_type == expected {
                continue;
            }
            if let Some(session) = self.store.get_in_progress_session(candidate_type).await? {
                if session.session_type.compatible_with(expected) {
                    return Ok(Some(session));
                }
            }
        }
        Ok(None)
    }

    async fn build_and_persist_new_session(&self, session_type: SessionType) -> Result<Option<Session>> {
        let state = self.current_session_state().await?;
        let settings = self.effective_settings(&state);
        let assembled = self.assembler.assemble(&settings, &state).await?;
        if assembled.is_empty() {
            return Ok(None);
        }

        let now = self.clock.now();
        let mut session = Session::new(session_type, SessionOrigin::Generator, now);
        session.problems = assembled.iter().map(|p| p.as_session_problem()).collect();

        let sealed = self
            .store
            .get_in_progress_session(session_type)
            .await?
            .map(|mut existing| {
                existing.status = SessionStatus::Completed;
                existing
            });
        self.store
            .seal_and_create_session(sealed.as_ref(), &session)
            .await?;

        Ok(Some(session))
    }

    async fn complete_session(&self, mut session: Session, attempts: Vec<Attempt>) -> Result<()> {
        let total = attempts.len();
        let successful = attempts.iter().filter(|a| a.success).count();
        let accuracy = if total > 0 {
            successful as f64 / total as f64
        } else {
            0.0
        };
        let duration_minutes = attempts.iter().map(|a| a.time_spent).sum::<u32>() as f64 / 60.0;

        session.accuracy = Some(accuracy);
        session.duration = Some(duration_minutes);
        session.status = SessionStatus::Completed;
        session.last_activity_time = self.clock.now();
        self.store.put_session(&session).await?;

        for session_problem in &session.problems {
            if let Ok(Some(problem)) = self.store.get_problem(session_problem.problem_id).await {
                let reason = format!("tag mastery recompute for problem {}", problem.problem_id);
                let recompute = concurrency::retry_with_backoff(&reason, || {
                    self.tag_mastery.recompute_for_problem(&problem)
                })
                .await;
                if let Err(err) = recompute {
                    warn!(%err, problem_id = %problem.problem_id, "tag mastery recompute failed during completion pipeline");
                }
            }
        }

        let mut state = self.current_session_state().await?;
        let prior_accuracy = state.last_performance.map(|p| p.accuracy);

        let session_length = state.session_length.max(1) as f64;
        let efficiency_score = if duration_minutes > 0.0 {
            (successful as f64 / (duration_minutes * session_length)).clamp(0.0, 1.0)
        } else {
            0.0
        };

        state.num_sessions_completed += 1;
        state.previous_performance = state.last_performance;
        state.last_performance = Some(LastPerformance {
            accuracy,
            efficiency_score,
        });

        match self.run_focus_decision(&state).await {
            Ok(decision) => {
                state.current_focus_tags = decision.next_focus_tags;
                state.performance_level = decision.next_performance_level;
            }
            Err(err) => {
                warn!(%err, "focus decision failed, keeping prior focus tags");
            }
        }

        if accuracy >= 0.8 || prior_accuracy.map(|prev| accuracy > prev).unwrap_or(false) {
            state.last_progress_date = Some(self.clock.now());
        }
        self.store.put_session_state(&state).await?;

        Ok(())
    }

    async fn run_focus_decision(&self, state: &SessionState) -> Result<crate::services::focus::FocusDecision> {
        if !self.base_settings.flexible_schedule {
            return Ok(crate::services::focus::FocusDecision {
                action: crate::services::focus::FocusAction::Keep,
                next_focus_tags: state.current_focus_tags.clone(),
                next_performance_level: state.performance_level,
            });
        }
        let mastery = self.tag_mastery.snapshot_all().await?;
        Ok(self.focus.decide(state, &mastery))
    }

    async fn current_session_state(&self) -> Result<SessionState> {
        match self.store.get_session_state().await? {
            Some(state) => Ok(state),
            None => {
                let mut initial = SessionState::initial(self.default_tier_tags.clone());
                initial.session_length = self.base_settings.session_length;
                initial.number_of_new_problems = self.base_settings.number_of_new_problems;
                initial.current_difficulty_cap = self.base_settings.difficulty_cap;
                self.store.put_session_state(&initial).await?;
                Ok(initial)
            }
        }
    }

    fn effective_settings(&self, state: &SessionState) -> Settings {
        Settings {
            session_length: state.session_length,
            number_of_new_problems: state.number_of_new_problems,
            difficulty_cap: state.current_difficulty_cap,
            ..self.base_settings.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, MockStore};
    use crate::services::catalogue::ProblemCatalogue;
    use crate::services::review_scheduler::ReviewScheduler;
    use chrono::Utc;

    fn manager(store: MockStore) -> SessionLifecycleManager {
        let store: Arc<dyn Store> = Arc::new(store);
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(Utc::now()));
        let catalogue = Arc::new(ProblemCatalogue::new(store.clone()));
        let scheduler = Arc::new(ReviewScheduler::new(store.clone(), clock.clone()));
        let assembler = Arc::new(SessionAssembler::new(catalogue, scheduler, store.clone(), clock.clone()));
        let tag_mastery = Arc::new(TagMasteryEngine::new(store.clone(), clock.clone()));
        SessionLifecycleManager::new(
            store,
            clock,
            assembler,
            tag_mastery,
            Settings::default(),
            BTreeSet::from(["arrays".to_string()]),
        )
    }

    fn session(session_type: SessionType) -> Session {
        Session::new(session_type, SessionOrigin::Generator, Utc::now())
    }

    #[tokio::test]
    async fn refresh_guard_refuses_to_materialize_wrong_type() {
        let mut store = MockStore::new();
        store
            .expect_get_in_progress_session()
            .withf(|t| *t == SessionType::FullInterview)
            .returning(|_| Ok(None));

        let manager = manager(store);
        let result = manager
            .refresh_session(SessionType::FullInterview, true)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn resume_session_returns_null_on_type_mismatch() {
        let existing = session(SessionType::InterviewLike);
        let mut store = MockStore::new();
        store.expect_get_in_progress_session().returning(move |t| {
            if t == SessionType::InterviewLike {
                Ok(Some(existing.clone()))
            } else {
                Ok(None)
            }
        });

        let manager = manager(store);
        let mismatch = manager.resume_session(Some(SessionType::FullInterview)).await.unwrap();
        assert!(mismatch.is_none());
    }

    #[tokio::test]
    async fn resume_session_honors_mixed_standard_fallback() {
        let existing = session(SessionType::InterviewLike);
        let existing_id = existing.session_id;
        let mut store = MockStore::new();
        store.expect_get_in_progress_session().returning(move |t| {
            if t == SessionType::InterviewLike {
                Ok(Some(existing.clone()))
            } else {
                Ok(None)
            }
        });

        let manager = manager(store);
        let fallback = manager.resume_session(Some(SessionType::Standard)).await.unwrap();
        assert_eq!(fallback.unwrap().session_id, existing_id);
    }

    #[tokio::test]
    async fn check_and_complete_session_reports_missing_session() {
        let mut store = MockStore::new();
        store.expect_get_session().returning(|_| Ok(None));

        let manager = manager(store);
        let status = manager
            .check_and_complete_session(Uuid::new_v4())
            .await
            .unwrap();
        assert!(matches!(status, CompletionStatus::NotFound));
    }

    #[tokio::test]
    async fn check_and_complete_session_is_idempotent_once_completed() {
        let mut completed = session(SessionType::Standard);
        completed.status = SessionStatus::Completed;
        let mut store = MockStore::new();
        store.expect_get_session().returning(move |_| Ok(Some(completed.clone())));

        let manager = manager(store);
        let status = manager
            .check_and_complete_session(Uuid::new_v4())
            .await
            .unwrap();
        assert!(matches!(status, CompletionStatus::Completed));
    }

    fn attempt(success: bool, time_spent: u32) -> Attempt {
        Attempt {
            attempt_id: Uuid::new_v4(),
            problem_id: Uuid::new_v4(),
            leetcode_id: 1,
            session_id: None,
            attempt_date: Utc::now(),
            success,
            time_spent,
            hints_used: 0,
            box_level_at_attempt: 1,
            comments: None,
        }
    }

    #[tokio::test]
    async fn completion_moves_last_performance_ahead_of_focus_decision() {
        let mut pending = session(SessionType::Standard);
        pending.problems = Vec::new();
        let pending_clone = pending.clone();

        let prior_performance = LastPerformance {
            accuracy: 0.5,
            efficiency_score: 0.2,
        };
        let mut seeded_state = SessionState::initial(BTreeSet::from(["arrays".to_string()]));
        seeded_state.num_sessions_completed = 5;
        seeded_state.last_performance = Some(prior_performance);

        let attempts = vec![attempt(true, 150), attempt(true, 150)];

        let mut store = MockStore::new();
        store.expect_get_session().returning(move |_| Ok(Some(pending_clone.clone())));
        store.expect_attempts_by_session().returning(move |_| Ok(attempts.clone()));
        store.expect_put_session().returning(|_| Ok(()));
        store
            .expect_get_session_state()
            .returning(move || Ok(Some(seeded_state.clone())));
        store.expect_scan_tag_mastery().returning(|| Ok(vec![]));

        store.expect_put_session_state().returning(move |state| {
            // The Focus Coordinator must see the just-completed session's
            // accuracy as `last_performance`, and the prior session's
            // accuracy preserved separately as `previous_performance`.
            assert_eq!(state.last_performance.unwrap().accuracy, 1.0);
            assert_eq!(state.previous_performance, Some(prior_performance));
            assert_eq!(state.num_sessions_completed, 6);
            Ok(())
        });

        let manager = manager(store);
        let status = manager
            .check_and_complete_session(pending.session_id)
            .await
            .unwrap();
        assert!(matches!(status, CompletionStatus::Completed));
    }

    #[tokio::test]
    async fn efficiency_score_uses_successful_attempts_and_session_length() {
        let mut pending = session(SessionType::Standard);
        pending.problems = Vec::new();
        let pending_clone = pending.clone();

        let mut seeded_state = SessionState::initial(BTreeSet::from(["arrays".to_string()]));
        seeded_state.session_length = 5;

        // 1 success out of 2 attempts, 5 minutes total, session_length 5:
        // 1 / (5 * 5) = 0.04, not the unclamped `total / duration_minutes`.
        let attempts = vec![attempt(true, 150), attempt(false, 150)];

        let mut store = MockStore::new();
        store.expect_get_session().returning(move |_| Ok(Some(pending_clone.clone())));
        store.expect_attempts_by_session().returning(move |_| Ok(attempts.clone()));
        store.expect_put_session().returning(|_| Ok(()));
        store
            .expect_get_session_state()
            .returning(move || Ok(Some(seeded_state.clone())));
        store.expect_scan_tag_mastery().returning(|| Ok(vec![]));
        store.expect_put_session_state().returning(|state| {
            let efficiency_score = state.last_performance.unwrap().efficiency_score;
            assert!((efficiency_score - 0.04).abs() < 1e-9);
            Ok(())
        });

        let manager = manager(store);
        let status = manager
            .check_and_complete_session(pending.session_id)
            .await
            .unwrap();
        assert!(matches!(status, CompletionStatus::Completed));
    }
}
