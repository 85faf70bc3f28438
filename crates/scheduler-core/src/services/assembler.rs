use crate::config::Settings;
use crate::domain::{Problem, SelectionReason, SessionProblem, SessionState};
use crate::ports::{Clock, Store};
use crate::services::catalogue::ProblemCatalogue;
use crate::services::review_scheduler::ReviewScheduler;
use anyhow::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{instrument, warn};

/// A problem selected for a new session, paired with the pass that picked it.
pub struct AssembledProblem {
    pub problem: Problem,
    pub selection_reason: SelectionReason,
}

impl AssembledProblem {
    pub fn as_session_problem(&self) -> SessionProblem {
        SessionProblem {
            problem_id: self.problem.problem_id,
            leetcode_id: self.problem.leetcode_id,
            selection_reason: self.selection_reason,
        }
    }
}

/// Builds the problem list for a new session by mixing review-due problems
/// with new ones under a difficulty cap and tag focus, with deterministic
/// fallbacks (spec.md §4.G).
pub struct SessionAssembler {
    catalogue: Arc<ProblemCatalogue>,
    scheduler: Arc<ReviewScheduler>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl SessionAssembler {
    pub fn new(
        catalogue: Arc<ProblemCatalogue>,
        scheduler: Arc<ReviewScheduler>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalogue,
            scheduler,
            store,
            clock,
        }
    }

    #[instrument(skip(self, settings, state))]
    pub async fn assemble(
        &self,
        settings: &Settings,
        state: &SessionState,
    ) -> Result<Vec<AssembledProblem>> {
        let exclude_ids = self.catalogue.in_flight_leetcode_ids().await?;

        let review_target = (settings.session_length as usize * settings.review_ratio as usize) / 100;
        let review = self.scheduler.daily_review_schedule(review_target, state).await;

        let mut picked: Vec<AssembledProblem> = Vec::with_capacity(settings.session_length as usize);
        let mut chosen_ids = BTreeSet::new();
        for problem in review {
            if chosen_ids.insert(problem.problem_id) {
                picked.push(AssembledProblem {
                    problem,
                    selection_reason: SelectionReason::Review,
                });
            }
        }

        let new_needed = (settings.session_length as usize).saturating_sub(picked.len());
        let new_problems = self
            .catalogue
            .fetch_additional(
                new_needed,
                &exclude_ids,
                &state.current_allowed_tags,
                settings.difficulty_cap,
            )
            .await?;
        for problem in new_problems {
            if chosen_ids.insert(problem.problem_id) {
                picked.push(AssembledProblem {
                    problem,
                    selection_reason: SelectionReason::Expansion,
                });
            }
        }

        if picked.len() < settings.session_length as usize {
            let fallback = self
                .fallback_candidates(&chosen_ids, &exclude_ids, settings.session_length as usize - picked.len())
                .await?;
            for problem in fallback {
                if chosen_ids.insert(problem.problem_id) {
                    picked.push(AssembledProblem {
                        problem,
                        selection_reason: SelectionReason::Fallback,
                    });
                }
            }
        }

        picked.truncate(settings.session_length as usize);

        let actual_review_count = picked
            .iter()
            .filter(|p| p.selection_reason == SelectionReason::Review)
            .count();
        if settings.session_length > 0 {
            let actual_ratio = actual_review_count * 100 / settings.session_length as usize;
            if actual_ratio < settings.min_review_ratio as usize {
                warn!(
                    actual_ratio,
                    min_review_ratio = settings.min_review_ratio,
                    "assembled session fell below the configured review-ratio floor"
                );
            }
        }

        Ok(picked)
    }

    async fn fallback_candidates(
        &self,
        chosen: &BTreeSet<uuid::Uuid>,
        exclude_leetcode_ids: &BTreeSet<i64>,
        needed: usize,
    ) -> Result<Vec<Problem>> {
        let now = self.clock.now();
        let mut candidates: Vec<Problem> = self
            .store
            .scan_problems()
            .await?
            .into_iter()
            .filter(|p| !chosen.contains(&p.problem_id))
            .filter(|p| !exclude_leetcode_ids.contains(&p.leetcode_id))
            .collect();

        candidates.sort_by(|a, b| {
            a.review_schedule
                .cmp(&b.review_schedule)
                .then_with(|| a.attempt_stats.total.cmp(&b.attempt_stats.total))
                .then_with(|| {
                    Self::decay_score(b, now)
                        .partial_cmp(&Self::decay_score(a, now))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        candidates.truncate(needed);
        Ok(candidates)
    }

    fn decay_score(problem: &Problem, now: chrono::DateTime<chrono::Utc>) -> f64 {
        match problem.last_attempt_date {
            Some(last) => {
                let days = now.signed_duration_since(last).num_seconds() as f64 / 86_400.0;
                (-days.max(0.0) / 30.0).exp().clamp(0.0, 1.0)
            }
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AttemptStats, Difficulty, SessionType};
    use crate::ports::{FixedClock, MockStore};
    use chrono::Utc;
    use uuid::Uuid;

    fn problem(leetcode_id: i64, difficulty: Difficulty, tag: &str) -> Problem {
        Problem {
            problem_id: Uuid::new_v4(),
            leetcode_id,
            title: format!("Problem {leetcode_id}"),
            slug: format!("problem-{leetcode_id}"),
            difficulty,
            tags: BTreeSet::from([tag.to_string()]),
            box_level: 1,
            review_schedule: Utc::now(),
            last_attempt_date: None,
            attempt_stats: AttemptStats::new(),
        }
    }

    #[tokio::test]
    async fn cold_start_fills_entirely_from_new_and_fallback() {
        let now = Utc::now();
        let problems: Vec<Problem> = (1..=5)
            .map(|i| problem(i, Difficulty::Easy, if i % 2 == 0 { "array" } else { "string" }))
            .collect();

        let mut store = MockStore::new();
        let for_scan = problems.clone();
        store
            .expect_scan_problems()
            .returning(move || Ok(for_scan.clone()));
        store
            .expect_get_in_progress_session()
            .returning(|_: SessionType| Ok(None));
        store.expect_scan_tag_mastery().returning(|| Ok(vec![]));

        let store: Arc<dyn Store> = Arc::new(store);
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(now));
        let catalogue = Arc::new(ProblemCatalogue::new(store.clone()));
        let scheduler = Arc::new(ReviewScheduler::new(store.clone(), clock.clone()));
        let assembler = SessionAssembler::new(catalogue, scheduler, store, clock);

        let settings = Settings {
            session_length: 5,
            number_of_new_problems: 5,
            flexible_schedule: true,
            review_ratio: 40,
            difficulty_cap: Difficulty::Easy,
            min_review_ratio: 30,
        };
        let state = SessionState::initial(BTreeSet::from(["array".to_string(), "string".to_string()]));

        let assembled = assembler.assemble(&settings, &state).await.unwrap();
        assert_eq!(assembled.len(), 5);
        assert!(assembled.iter().all(|p| p.problem.difficulty == Difficulty::Easy));
    }
}
