use crate::domain::{Attempt, NewAttempt, Problem};
use crate::ports::{Clock, Store};
use anyhow::Result;
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Leitner interval table in days, indexed by box level 1..=7 (index 0 is
/// unused so `INTERVALS[level as usize]` reads directly, per spec.md §4.D).
const INTERVALS: [i64; 8] = [0, 0, 1, 2, 4, 7, 14, 30];

/// Days-in-box-level to review interval, per the authoritative Leitner
/// rule in spec.md §4.D.
pub fn interval_for(box_level: u8) -> i64 {
    INTERVALS[box_level.clamp(1, 7) as usize]
}

/// Whether a problem counts as "recently attempted" under the given
/// strictness. `relaxed` divides the interval in half; Scheduler always
/// uses `relaxed = true`.
pub fn recently_attempted(
    last_attempt: Option<chrono::DateTime<chrono::Utc>>,
    box_level: u8,
    now: chrono::DateTime<chrono::Utc>,
    relaxed: bool,
) -> bool {
    let Some(last) = last_attempt else {
        return false;
    };
    let window_days = interval_for(box_level);
    let window = if relaxed {
        chrono::Duration::days(window_days) / 2
    } else {
        chrono::Duration::days(window_days)
    };
    now.signed_duration_since(last) < window
}

/// Result of `AttemptEngine::add_attempt`.
pub struct AddAttemptOutcome {
    pub attempt: Attempt,
    /// Tells the Lifecycle Manager it should run `check_and_complete_session`
    /// for `attempt.session_id`, if present.
    pub completion_hint: bool,
}

/// Records attempts, recomputes per-problem Leitner box level and review
/// schedule, and updates attempt statistics. The only mutator of
/// `attempts` and `problems.learning_state` (spec.md §5).
pub struct AttemptEngine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl AttemptEngine {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Record one solve attempt and update the problem's learning state.
    ///
    /// Returns `Ok(None)` (not an error) when the referenced problem can't
    /// be resolved, per spec.md §4.D's "returned, not thrown" contract for
    /// `ProblemNotFound`.
    #[instrument(skip(self, data))]
    pub async fn add_attempt(
        &self,
        data: NewAttempt,
        session_id: Option<Uuid>,
    ) -> Result<Option<AddAttemptOutcome>> {
        let problem = match self.resolve_problem(&data).await? {
            Some(p) => p,
            None => return Ok(None),
        };

        let attempt_date = self.clock.now();

        let current_box_level = if problem.attempt_stats.total == 0 {
            1
        } else {
            problem.box_level
        };
        let new_box_level = if data.success {
            (current_box_level + 1).min(7)
        } else {
            current_box_level.saturating_sub(1).max(1)
        };

        let mut stats = problem.attempt_stats;
        stats.record(data.success);

        let updated_problem = Problem {
            box_level: new_box_level,
            review_schedule: attempt_date + chrono::Duration::days(interval_for(new_box_level)),
            last_attempt_date: Some(attempt_date),
            attempt_stats: stats,
            ..problem.clone()
        };

        let attempt = Attempt {
            attempt_id: Uuid::new_v4(),
            problem_id: problem.problem_id,
            leetcode_id: problem.leetcode_id,
            session_id,
            attempt_date,
            success: data.success,
            time_spent: data.time_spent,
            hints_used: data.hints_used,
            box_level_at_attempt: current_box_level,
            comments: data.comments,
        };

        self.store
            .record_attempt_atomic(&attempt, &updated_problem)
            .await?;

        Ok(Some(AddAttemptOutcome {
            attempt,
            completion_hint: session_id.is_some(),
        }))
    }

    async fn resolve_problem(&self, data: &NewAttempt) -> Result<Option<Problem>> {
        if let Some(problem_id) = data.problem_id {
            return self.store.get_problem(problem_id).await;
        }
        if let Some(leetcode_id) = data.leetcode_id {
            return self.store.get_problem_by_leetcode_id(leetcode_id).await;
        }
        warn!("add_attempt called without problem_id or leetcode_id");
        Ok(None)
    }

    pub async fn get_attempts_by_problem(&self, problem_id: Uuid) -> Result<Vec<Attempt>> {
        self.store.attempts_by_problem(problem_id).await
    }

    pub async fn get_all_attempts(&self) -> Result<Vec<Attempt>> {
        self.store.scan_attempts().await
    }

    /// Most recent attempt overall, or for `problem_id` if given.
    pub async fn get_most_recent_attempt(
        &self,
        problem_id: Option<Uuid>,
    ) -> Result<Option<Attempt>> {
        let attempts = match problem_id {
            Some(id) => self.store.attempts_by_problem(id).await?,
            None => self.store.scan_attempts().await?,
        };
        Ok(attempts.into_iter().max_by_key(|a| a.attempt_date))
    }
}
