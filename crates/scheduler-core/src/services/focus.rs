use crate::domain::{LastPerformance, PerformanceLevel, SessionState, TagMastery};

/// What the Lifecycle Manager should do to `SessionState.current_focus_tags`
/// after a completed session (spec.md §4.I).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusAction {
    Keep,
    Expand,
    Narrow,
    Rotate,
}

pub struct FocusDecision {
    pub action: FocusAction,
    pub next_focus_tags: Vec<String>,
    pub next_performance_level: PerformanceLevel,
}

const ONBOARDING_SESSION_THRESHOLD: u32 = 3;
const EXPAND_ACCURACY_THRESHOLD: f64 = 0.8;
const NARROW_ACCURACY_THRESHOLD: f64 = 0.5;
const MAX_FOCUS_TAGS: usize = 5;

/// Decides active focus tags after each session given recent performance
/// (spec.md §4.I). Stateless: takes a snapshot of `SessionState` and the
/// latest mastery cache, returns a decision for the Lifecycle Manager to
/// apply.
pub struct FocusCoordinator;

impl FocusCoordinator {
    pub fn new() -> Self {
        Self
    }

    /// `mastery` is the latest tag mastery snapshot, ordered by ascending
    /// mastery (least mastered first) among `state.current_allowed_tags`.
    ///
    /// Callers that want `flexible_schedule = false` semantics (spec.md §6)
    /// simply skip calling this and keep `current_focus_tags` as-is.
    pub fn decide(&self, state: &SessionState, mastery: &[TagMastery]) -> FocusDecision {
        if state.num_sessions_completed < ONBOARDING_SESSION_THRESHOLD {
            let tag = lowest_mastery_unmastered_tag(state, mastery);
            return FocusDecision {
                action: FocusAction::Keep,
                next_focus_tags: tag.into_iter().collect(),
                next_performance_level: PerformanceLevel::Onboarding,
            };
        }

        let Some(perf) = state.last_performance else {
            return FocusDecision {
                action: FocusAction::Keep,
                next_focus_tags: state.current_focus_tags.clone(),
                next_performance_level: state.performance_level,
            };
        };

        if perf.accuracy >= EXPAND_ACCURACY_THRESHOLD && !regressed(state, &perf) {
            let mut tags = state.current_focus_tags.clone();
            if let Some(next_tag) = next_unmastered_tag(state, mastery, &tags) {
                if tags.len() < MAX_FOCUS_TAGS {
                    tags.push(next_tag);
                }
            }
            FocusDecision {
                action: FocusAction::Expand,
                next_focus_tags: tags,
                next_performance_level: PerformanceLevel::Expanding,
            }
        } else if perf.accuracy < NARROW_ACCURACY_THRESHOLD {
            let weakest = weakest_focus_tag(state, mastery);
            FocusDecision {
                action: FocusAction::Narrow,
                next_focus_tags: weakest.into_iter().collect(),
                next_performance_level: PerformanceLevel::Struggling,
            }
        } else {
            FocusDecision {
                action: FocusAction::Keep,
                next_focus_tags: state.current_focus_tags.clone(),
                next_performance_level: PerformanceLevel::Steady,
            }
        }
    }
}

impl Default for FocusCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

fn regressed(state: &SessionState, current: &LastPerformance) -> bool {
    state
        .previous_performance
        .map(|prev| current.accuracy < prev.accuracy)
        .unwrap_or(false)
}

fn lowest_mastery_unmastered_tag(state: &SessionState, mastery: &[TagMastery]) -> Option<String> {
    mastery
        .iter()
        .filter(|m| !m.mastered && state.current_allowed_tags.contains(&m.tag))
        .min_by(|a, b| a.success_rate.partial_cmp(&b.success_rate).unwrap_or(std::cmp::Ordering::Equal))
        .map(|m| m.tag.clone())
        .or_else(|| state.current_allowed_tags.iter().next().cloned())
}

fn next_unmastered_tag(
    state: &SessionState,
    mastery: &[TagMastery],
    already_focused: &[String],
) -> Option<String> {
    mastery
        .iter()
        .filter(|m| !m.mastered)
        .filter(|m| state.current_allowed_tags.contains(&m.tag))
        .filter(|m| !already_focused.contains(&m.tag))
        .min_by(|a, b| a.success_rate.partial_cmp(&b.success_rate).unwrap_or(std::cmp::Ordering::Equal))
        .map(|m| m.tag.clone())
        .or_else(|| {
            state
                .current_allowed_tags
                .iter()
                .find(|t| !already_focused.contains(t))
                .cloned()
        })
}

fn weakest_focus_tag(state: &SessionState, mastery: &[TagMastery]) -> Option<String> {
    if state.current_focus_tags.is_empty() {
        return lowest_mastery_unmastered_tag(state, mastery);
    }
    state
        .current_focus_tags
        .iter()
        .min_by(|a, b| {
            let rate_a = mastery.iter().find(|m| &&m.tag == a).map(|m| m.success_rate).unwrap_or(0.0);
            let rate_b = mastery.iter().find(|m| &&m.tag == b).map(|m| m.success_rate).unwrap_or(0.0);
            rate_a.partial_cmp(&rate_b).unwrap_or(std::cmp::Ordering::Equal)
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn tag_mastery(tag: &str, success_rate: f64, mastered: bool) -> TagMastery {
        TagMastery {
            tag: tag.to_string(),
            total_attempts: 10,
            successful_attempts: (10.0 * success_rate) as u32,
            success_rate,
            mastered,
            decay_score: 1.0,
            last_recomputed_at: Utc::now(),
        }
    }

    #[test]
    fn onboarding_clamps_to_single_tag() {
        let mut state = SessionState::initial(BTreeSet::from(["arrays".to_string(), "strings".to_string()]));
        state.num_sessions_completed = 0;
        let mastery = vec![tag_mastery("arrays", 0.2, false), tag_mastery("strings", 0.6, false)];

        let decision = FocusCoordinator::new().decide(&state, &mastery);
        assert_eq!(decision.next_focus_tags, vec!["arrays".to_string()]);
        assert_eq!(decision.next_performance_level, PerformanceLevel::Onboarding);
    }

    #[test]
    fn high_accuracy_expands_focus() {
        let mut state = SessionState::initial(BTreeSet::from(["arrays".to_string(), "strings".to_string()]));
        state.num_sessions_completed = 5;
        state.current_focus_tags = vec!["arrays".to_string()];
        state.last_performance = Some(LastPerformance {
            accuracy: 0.9,
            efficiency_score: 1.0,
        });
        let mastery = vec![tag_mastery("arrays", 0.9, false), tag_mastery("strings", 0.2, false)];

        let decision = FocusCoordinator::new().decide(&state, &mastery);
        assert_eq!(decision.action, FocusAction::Expand);
        assert!(decision.next_focus_tags.contains(&"strings".to_string()));
    }

    #[test]
    fn low_accuracy_narrows_to_weakest_tag() {
        let mut state = SessionState::initial(BTreeSet::from(["arrays".to_string(), "strings".to_string()]));
        state.num_sessions_completed = 5;
        state.current_focus_tags = vec!["arrays".to_string(), "strings".to_string()];
        state.last_performance = Some(LastPerformance {
            accuracy: 0.3,
            efficiency_score: 1.0,
        });
        let mastery = vec![tag_mastery("arrays", 0.2, false), tag_mastery("strings", 0.6, false)];

        let decision = FocusCoordinator::new().decide(&state, &mastery);
        assert_eq!(decision.action, FocusAction::Narrow);
        assert_eq!(decision.next_focus_tags, vec!["arrays".to_string()]);
    }
}
