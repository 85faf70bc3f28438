use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Difficulty tier of a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Difficulty {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(anyhow::anyhow!("invalid difficulty: {}", s)),
        }
    }
}

/// Per-attempt bookkeeping for a problem: total attempts and how many succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptStats {
    pub total: u32,
    pub successful: u32,
}

impl AttemptStats {
    pub fn new() -> Self {
        Self {
            total: 0,
            successful: 0,
        }
    }

    pub fn record(&mut self, success: bool) {
        self.total += 1;
        if success {
            self.successful += 1;
        }
    }
}

impl Default for AttemptStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity and learning state of a single catalogued problem.
///
/// Identity fields never change after creation; the learning-state fields
/// (`box_level`, `review_schedule`, `last_attempt_date`, `attempt_stats`) are
/// mutated exclusively by the Attempt Engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub problem_id: Uuid,
    pub leetcode_id: i64,
    pub title: String,
    pub slug: String,
    pub difficulty: Difficulty,
    pub tags: BTreeSet<String>,

    pub box_level: u8,
    pub review_schedule: DateTime<Utc>,
    pub last_attempt_date: Option<DateTime<Utc>>,
    pub attempt_stats: AttemptStats,
}

impl Problem {
    /// True iff the problem's tags are a subset of `allowed`.
    pub fn tags_within(&self, allowed: &BTreeSet<String>) -> bool {
        self.tags.iter().all(|t| allowed.contains(t))
    }

    /// True iff at least one of the problem's tags is in `allowed`.
    pub fn has_any_tag(&self, allowed: &BTreeSet<String>) -> bool {
        self.tags.iter().any(|t| allowed.contains(t))
    }
}

/// An immutable, append-only record of one solve attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub attempt_id: Uuid,
    pub problem_id: Uuid,
    pub leetcode_id: i64,
    pub session_id: Option<Uuid>,
    pub attempt_date: DateTime<Utc>,
    pub success: bool,
    pub time_spent: u32,
    pub hints_used: u32,
    pub box_level_at_attempt: u8,
    pub comments: Option<String>,
}

/// Input to `AttemptEngine::add_attempt`.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub problem_id: Option<Uuid>,
    pub leetcode_id: Option<i64>,
    pub success: bool,
    pub time_spent: u32,
    pub hints_used: u32,
    pub comments: Option<String>,
}

/// The type of a practice session. Groups `Standard` and `Interview` govern
/// cross-type compatibility (see `SessionLifecycleManager`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Standard,
    Tracking,
    InterviewLike,
    FullInterview,
}

impl SessionType {
    pub fn is_standard_group(self) -> bool {
        matches!(self, SessionType::Standard | SessionType::Tracking)
    }

    pub fn is_interview_group(self) -> bool {
        matches!(self, SessionType::InterviewLike | SessionType::FullInterview)
    }

    /// Type-compatibility rule from spec.md §4.H: `self` (the existing
    /// session's type) is compatible with an `expected` request type iff
    /// they're equal, both in the standard group, or either side is
    /// `Standard` itself (the mixed-standard fallback).
    pub fn compatible_with(self, expected: SessionType) -> bool {
        self == expected
            || (self.is_standard_group() && expected.is_standard_group())
            || self == SessionType::Standard
            || expected == SessionType::Standard
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionOrigin {
    Generator,
    Tracking,
}

/// Which Assembler/Lifecycle pass selected a problem for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    Review,
    Focus,
    Expansion,
    Prerequisite,
    Fallback,
}

/// A problem reference within a session, annotated with why it was picked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionProblem {
    pub problem_id: Uuid,
    pub leetcode_id: i64,
    pub selection_reason: SelectionReason,
}

/// A practice session: mutable while `in_progress`, frozen once `completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub session_type: SessionType,
    pub status: SessionStatus,
    pub origin: SessionOrigin,
    pub created_at: DateTime<Utc>,
    pub last_activity_time: DateTime<Utc>,
    pub problems: Vec<SessionProblem>,
    pub attempts: Vec<Uuid>,
    pub current_problem_index: usize,
    pub accuracy: Option<f64>,
    pub duration: Option<f64>,
}

impl Session {
    pub fn new(session_type: SessionType, origin: SessionOrigin, now: DateTime<Utc>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            session_type,
            status: SessionStatus::InProgress,
            origin,
            created_at: now,
            last_activity_time: now,
            problems: Vec::new(),
            attempts: Vec::new(),
            current_problem_index: 0,
            accuracy: None,
            duration: None,
        }
    }
}

/// A derived, cached per-tag mastery snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagMastery {
    pub tag: String,
    pub total_attempts: u32,
    pub successful_attempts: u32,
    pub success_rate: f64,
    pub mastered: bool,
    pub decay_score: f64,
    pub last_recomputed_at: DateTime<Utc>,
}

/// A change in a tag's mastery between two snapshots (see spec.md §4.E).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasteryDelta {
    pub tag: String,
    pub is_new: bool,
    pub strength_delta: i64,
    pub decay_delta: f64,
    pub mastered_changed: bool,
}

/// The user's current performance level, maintained by the Focus Coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceLevel {
    Onboarding,
    Struggling,
    Steady,
    Expanding,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LastPerformance {
    pub accuracy: f64,
    pub efficiency_score: f64,
}

/// Process-wide singleton tracking cross-session scheduling state.
///
/// Created lazily on first completion; mutated only by the Lifecycle
/// Manager and the Focus Coordinator it delegates to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub num_sessions_completed: u32,
    pub current_focus_tags: Vec<String>,
    pub performance_level: PerformanceLevel,
    pub last_performance: Option<LastPerformance>,
    /// `last_performance` as of the session before last, captured right
    /// before `last_performance` is overwritten so the Focus Coordinator can
    /// compare the session that just completed against a genuinely earlier
    /// one (spec.md:163's "no regression" gate).
    pub previous_performance: Option<LastPerformance>,
    pub last_progress_date: Option<DateTime<Utc>>,
    pub current_difficulty_cap: Difficulty,
    pub session_length: u32,
    pub number_of_new_problems: u32,
    pub current_allowed_tags: BTreeSet<String>,
}

pub const SESSION_STATE_ID: &str = "session_state";

impl SessionState {
    pub fn initial(tier_tags: BTreeSet<String>) -> Self {
        Self {
            num_sessions_completed: 0,
            current_focus_tags: Vec::new(),
            performance_level: PerformanceLevel::Onboarding,
            last_performance: None,
            previous_performance: None,
            last_progress_date: None,
            current_difficulty_cap: Difficulty::Medium,
            session_length: 5,
            number_of_new_problems: 3,
            current_allowed_tags: tier_tags,
        }
    }
}
