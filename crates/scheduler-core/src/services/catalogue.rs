use crate::domain::{Attempt, Difficulty, Problem};
use crate::ports::store::BoxLevelCounts;
use crate::ports::Store;
use anyhow::Result;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use uuid::Uuid;

/// Read-side view over all known problems (spec.md §4.C). The only writer of
/// `problems.learning_state` is the Attempt Engine; this component is
/// read-only.
pub struct ProblemCatalogue {
    store: Arc<dyn Store>,
}

impl ProblemCatalogue {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(&self, problem_id: Uuid) -> Result<Option<Problem>> {
        self.store.get_problem(problem_id).await
    }

    pub async fn by_leetcode_id(&self, leetcode_id: i64) -> Result<Option<Problem>> {
        self.store.get_problem_by_leetcode_id(leetcode_id).await
    }

    pub async fn scan_all(&self) -> Result<Vec<Problem>> {
        self.store.scan_problems().await
    }

    pub async fn count_by_box_level(&self) -> Result<BoxLevelCounts> {
        let mut counts: BoxLevelCounts = HashMap::new();
        for problem in self.store.scan_problems().await? {
            *counts.entry(problem.box_level).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Problems the user has never attempted, at or under `difficulty_cap`,
    /// with at least one tag in `allowed_tags`, excluding `exclude_leetcode_ids`.
    /// Used by the Session Assembler's "new problems" pass (spec.md §4.G).
    pub async fn fetch_additional(
        &self,
        needed: usize,
        exclude_leetcode_ids: &BTreeSet<i64>,
        allowed_tags: &BTreeSet<String>,
        difficulty_cap: Difficulty,
    ) -> Result<Vec<Problem>> {
        if needed == 0 {
            return Ok(Vec::new());
        }
        let mut candidates: Vec<Problem> = self
            .store
            .scan_problems()
            .await?
            .into_iter()
            .filter(|p| p.attempt_stats.total == 0)
            .filter(|p| p.difficulty <= difficulty_cap)
            .filter(|p| p.has_any_tag(allowed_tags))
            .filter(|p| !exclude_leetcode_ids.contains(&p.leetcode_id))
            .collect();
        candidates.sort_by_key(|p| p.leetcode_id);
        candidates.truncate(needed);
        Ok(candidates)
    }

    /// leetcode_ids for all problems belonging to an in-progress session of
    /// any type, i.e. problems currently "in flight".
    pub async fn in_flight_leetcode_ids(&self) -> Result<BTreeSet<i64>> {
        use crate::domain::SessionType;
        let mut ids = BTreeSet::new();
        for session_type in [
            SessionType::Standard,
            SessionType::Tracking,
            SessionType::InterviewLike,
            SessionType::FullInterview,
        ] {
            if let Some(session) = self.store.get_in_progress_session(session_type).await? {
                ids.extend(session.problems.iter().map(|p| p.leetcode_id));
            }
        }
        Ok(ids)
    }

    pub async fn attempts_for(&self, problem_id: Uuid) -> Result<Vec<Attempt>> {
        self.store.attempts_by_problem(problem_id).await
    }
}
