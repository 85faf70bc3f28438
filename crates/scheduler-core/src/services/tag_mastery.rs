use crate::domain::{Attempt, MasteryDelta, Problem, TagMastery};
use crate::ports::{Clock, Store};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::instrument;

/// Mastery threshold: a tag is `mastered` once its success rate reaches this
/// fraction over at least `MIN_ATTEMPTS_FOR_MASTERY` attempts (spec.md §4.E).
const MASTERY_SUCCESS_RATE: f64 = 0.85;
const MIN_ATTEMPTS_FOR_MASTERY: u32 = 10;
/// Decay half-life-ish constant: `exp(-days_since_last_attempt / 30)`.
const DECAY_DAYS: f64 = 30.0;
/// Below this decay score a tag reopens for review even if `mastered`.
pub const FRESHNESS_FLOOR: f64 = 0.5;
/// Deltas with `|decay_delta|` under this are considered unchanged.
const DECAY_EPSILON: f64 = 1e-4;

/// Recomputes and caches per-tag mastery from the attempt history. The sole
/// writer of `tag_mastery` (spec.md §5).
pub struct TagMasteryEngine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl TagMasteryEngine {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn snapshot(&self, tag: &str) -> Result<Option<TagMastery>> {
        self.store.get_tag_mastery(tag).await
    }

    pub async fn snapshot_all(&self) -> Result<Vec<TagMastery>> {
        self.store.scan_tag_mastery().await
    }

    /// Recompute mastery for every tag touched by `problem`'s attempts,
    /// returning the deltas against the prior cached snapshot (used by the
    /// Focus Coordinator to decide whether to narrow/expand focus tags).
    #[instrument(skip(self, problem))]
    pub async fn recompute_for_problem(&self, problem: &Problem) -> Result<Vec<MasteryDelta>> {
        let mut deltas = Vec::with_capacity(problem.tags.len());
        for tag in &problem.tags {
            if let Some(delta) = self.recompute_tag(tag).await? {
                deltas.push(delta);
            }
        }
        Ok(deltas)
    }

    /// Recompute mastery for every tag in the catalogue, returning the deltas
    /// against each tag's prior cached snapshot (spec.md §4.E's `recompute()`).
    #[instrument(skip(self))]
    pub async fn recompute(&self) -> Result<Vec<MasteryDelta>> {
        let problems = self.store.scan_problems().await?;
        let tags: BTreeSet<String> = problems.into_iter().flat_map(|p| p.tags).collect();

        let mut deltas = Vec::with_capacity(tags.len());
        for tag in &tags {
            if let Some(delta) = self.recompute_tag(tag).await? {
                deltas.push(delta);
            }
        }
        Ok(deltas)
    }

    /// Pure diff between two tag mastery snapshots, keyed by tag (spec.md
    /// §4.E). Tags present only in `post` are reported as `is_new`.
    pub fn deltas(pre: &[TagMastery], post: &[TagMastery]) -> Vec<MasteryDelta> {
        let pre_by_tag: BTreeMap<&str, &TagMastery> = pre.iter().map(|m| (m.tag.as_str(), m)).collect();

        post.iter()
            .filter_map(|after| {
                let before = pre_by_tag.get(after.tag.as_str());
                let (strength_delta, decay_delta, mastered_changed, is_new) = match before {
                    None => (after.total_attempts as i64, after.decay_score - 1.0, after.mastered, true),
                    Some(before) => (
                        after.total_attempts as i64 - before.total_attempts as i64,
                        after.decay_score - before.decay_score,
                        before.mastered != after.mastered,
                        false,
                    ),
                };

                if strength_delta == 0 && decay_delta.abs() < DECAY_EPSILON && !mastered_changed {
                    return None;
                }

                Some(MasteryDelta {
                    tag: after.tag.clone(),
                    is_new,
                    strength_delta,
                    decay_delta,
                    mastered_changed,
                })
            })
            .collect()
    }

    async fn recompute_tag(&self, tag: &str) -> Result<Option<MasteryDelta>> {
        let problems = self.store.problems_by_tag(tag).await?;
        if problems.is_empty() {
            return Ok(None);
        }

        let mut attempts: Vec<Attempt> = Vec::new();
        for problem in &problems {
            attempts.extend(self.store.attempts_by_problem(problem.problem_id).await?);
        }

        let total = attempts.len() as u32;
        let successful = attempts.iter().filter(|a| a.success).count() as u32;
        let success_rate = if total == 0 {
            0.0
        } else {
            successful as f64 / total as f64
        };

        let last_attempt = attempts.iter().map(|a| a.attempt_date).max();
        let decay_score = match last_attempt {
            Some(last) => {
                let days = (self.clock.now() - last).num_seconds() as f64 / 86_400.0;
                (-days.max(0.0) / DECAY_DAYS).exp().clamp(0.0, 1.0)
            }
            None => 0.0,
        };

        let mastered = total >= MIN_ATTEMPTS_FOR_MASTERY && success_rate >= MASTERY_SUCCESS_RATE;

        let prior = self.store.get_tag_mastery(tag).await?;
        let (strength_delta, decay_delta, mastered_changed) = match &prior {
            None => (total as i64, decay_score - 1.0, mastered),
            Some(p) => (
                total as i64 - p.total_attempts as i64,
                decay_score - p.decay_score,
                p.mastered != mastered,
            ),
        };

        let updated = TagMastery {
            tag: tag.to_string(),
            total_attempts: total,
            successful_attempts: successful,
            success_rate,
            mastered,
            decay_score,
            last_recomputed_at: self.clock.now(),
        };
        self.store.put_tag_mastery(&updated).await?;

        if strength_delta == 0 && decay_delta.abs() < DECAY_EPSILON && !mastered_changed {
            return Ok(None);
        }

        Ok(Some(MasteryDelta {
            tag: tag.to_string(),
            is_new: prior.is_none(),
            strength_delta,
            decay_delta,
            mastered_changed,
        }))
    }

    /// Tags whose cached snapshot is `mastered`.
    pub async fn mastered_tags(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .store
            .scan_tag_mastery()
            .await?
            .into_iter()
            .filter(|m| m.mastered)
            .map(|m| m.tag)
            .collect())
    }

    /// Success rate per tag, for tags with at least one attempt. Used by the
    /// Focus Coordinator's struggling/steady/expanding classification.
    pub async fn success_rates(&self) -> Result<BTreeMap<String, f64>> {
        Ok(self
            .store
            .scan_tag_mastery()
            .await?
            .into_iter()
            .map(|m| (m.tag, m.success_rate))
            .collect())
    }
}
