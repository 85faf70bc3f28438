use crate::domain::{Problem, SessionState};
use crate::ports::{Clock, Store};
use crate::services::attempt_engine::recently_attempted;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Selects review-due problems under tier and tag constraints (spec.md §4.F).
/// Stateless: holds only the store and clock handles, no mutable state of
/// its own.
pub struct ReviewScheduler {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl ReviewScheduler {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Build today's review list, bounded to `budget` problems, honoring
    /// `state.current_allowed_tags` (the tier gate) and the ordering of
    /// `state.current_focus_tags` (the tag-matched pass).
    ///
    /// On any store error this returns an empty list rather than propagating,
    /// so the Assembler's fallback pass can compensate (spec.md §4.F).
    #[instrument(skip(self, state))]
    pub async fn daily_review_schedule(&self, budget: usize, state: &SessionState) -> Vec<Problem> {
        let now = self.clock.now();
        if budget == 0 {
            return Vec::new();
        }
        let all = match self.store.scan_problems().await {
            Ok(p) => p,
            Err(err) => {
                warn!(%err, "scan_problems failed, returning empty review schedule");
                return Vec::new();
            }
        };

        let mut due: Vec<Problem> = all
            .into_iter()
            .filter(|p| Self::is_due(p, now))
            .filter(|p| p.tags_within(&state.current_allowed_tags))
            .collect();
        due.sort_by(|a, b| Self::tie_break(a, b, now));

        let mut picked: Vec<Problem> = Vec::with_capacity(budget);
        let mut picked_ids = BTreeSet::new();

        let unmastered_tags = if due.is_empty() {
            BTreeSet::new()
        } else {
            self.unmastered_tags(state).await
        };
        for tag in &unmastered_tags {
            if picked.len() >= budget {
                break;
            }
            if let Some(idx) = due
                .iter()
                .position(|p| !picked_ids.contains(&p.problem_id) && p.tags.contains(tag))
            {
                let problem = due[idx].clone();
                picked_ids.insert(problem.problem_id);
                picked.push(problem);
            }
        }

        for problem in &due {
            if picked.len() >= budget {
                break;
            }
            if picked_ids.contains(&problem.problem_id) {
                continue;
            }
            picked_ids.insert(problem.problem_id);
            picked.push(problem.clone());
        }

        picked.truncate(budget);
        picked
    }

    /// Every currently-unmastered tag in `state.current_allowed_tags`
    /// (spec.md §4.F step 3), not just the ≤5 the Focus Coordinator spotlit.
    /// On a mastery-scan error, assumes nothing is mastered yet.
    async fn unmastered_tags(&self, state: &SessionState) -> BTreeSet<String> {
        let mastered: BTreeSet<String> = match self.store.scan_tag_mastery().await {
            Ok(snapshot) => snapshot.into_iter().filter(|m| m.mastered).map(|m| m.tag).collect(),
            Err(err) => {
                warn!(%err, "scan_tag_mastery failed, treating all allowed tags as unmastered");
                BTreeSet::new()
            }
        };
        state.current_allowed_tags.difference(&mastered).cloned().collect()
    }

    fn is_due(problem: &Problem, now: chrono::DateTime<chrono::Utc>) -> bool {
        problem.review_schedule <= now
            || !recently_attempted(problem.last_attempt_date, problem.box_level, now, true)
    }

    fn tie_break(a: &Problem, b: &Problem, now: chrono::DateTime<chrono::Utc>) -> std::cmp::Ordering {
        a.review_schedule
            .cmp(&b.review_schedule)
            .then_with(|| a.attempt_stats.total.cmp(&b.attempt_stats.total))
            .then_with(|| {
                Self::decay_weighted_score(b, now)
                    .partial_cmp(&Self::decay_weighted_score(a, now))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    /// Higher is better: recency-decayed success rate, used only to break
    /// remaining ties after date and attempt count.
    fn decay_weighted_score(problem: &Problem, now: chrono::DateTime<chrono::Utc>) -> f64 {
        let success_rate = if problem.attempt_stats.total == 0 {
            0.0
        } else {
            problem.attempt_stats.successful as f64 / problem.attempt_stats.total as f64
        };
        let decay = match problem.last_attempt_date {
            Some(last) => {
                let days = now.signed_duration_since(last).num_seconds() as f64 / 86_400.0;
                (-days.max(0.0) / 30.0).exp().clamp(0.0, 1.0)
            }
            None => 0.0,
        };
        success_rate * decay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AttemptStats, Difficulty, PerformanceLevel};
    use crate::ports::MockStore;
    use chrono::Utc;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn problem(tag: &str, due: chrono::DateTime<Utc>) -> Problem {
        Problem {
            problem_id: Uuid::new_v4(),
            leetcode_id: 1,
            title: "Two Sum".into(),
            slug: "two-sum".into(),
            difficulty: Difficulty::Easy,
            tags: BTreeSet::from([tag.to_string()]),
            box_level: 1,
            review_schedule: due,
            last_attempt_date: None,
            attempt_stats: AttemptStats::new(),
        }
    }

    #[tokio::test]
    async fn empty_store_yields_empty_schedule() {
        let now = Utc::now();
        let mut store = MockStore::new();
        store.expect_scan_problems().returning(|| Ok(vec![]));
        let scheduler = ReviewScheduler::new(Arc::new(store), Arc::new(crate::ports::FixedClock::new(now)));
        let mut state = SessionState::initial(BTreeSet::from(["arrays".to_string()]));
        state.performance_level = PerformanceLevel::Onboarding;

        let schedule = scheduler.daily_review_schedule(5, &state).await;
        assert!(schedule.is_empty());
    }

    fn mastery(tag: &str, mastered: bool) -> crate::domain::TagMastery {
        crate::domain::TagMastery {
            tag: tag.to_string(),
            total_attempts: 10,
            successful_attempts: 9,
            success_rate: 0.9,
            mastered,
            decay_score: 1.0,
            last_recomputed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn tag_matched_pass_prefers_unmastered_tags_over_mastered() {
        let now = Utc::now();
        let p1 = problem("arrays", now - chrono::Duration::days(1));
        let p2 = problem("strings", now - chrono::Duration::days(1));
        let problems = vec![p1.clone(), p2.clone()];

        let mut store = MockStore::new();
        store.expect_scan_problems().returning(move || Ok(problems.clone()));
        store
            .expect_scan_tag_mastery()
            .returning(|| Ok(vec![mastery("arrays", true), mastery("strings", false)]));
        let scheduler = ReviewScheduler::new(Arc::new(store), Arc::new(crate::ports::FixedClock::new(now)));

        let state = SessionState::initial(BTreeSet::from(["arrays".to_string(), "strings".to_string()]));

        let schedule = scheduler.daily_review_schedule(1, &state).await;
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0].problem_id, p2.problem_id);
    }
}
