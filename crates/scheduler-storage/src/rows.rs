//! Row <-> domain-type conversions for the sqlite-backed `Store`.
//!
//! Every row struct mirrors a table from `migrations/0001_init.sql` exactly;
//! the `TryFrom`/`From` impls here are the only place column encodings
//! (timestamps as millis, enums as their `Display`/`FromStr` text, tag sets
//! as JSON) are decided.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use scheduler_core::{
    Attempt, Difficulty, LastPerformance, PerformanceLevel, Problem, Session, SessionOrigin,
    SessionProblem, SessionState, SessionStatus, SessionType, TagMastery,
};
use sqlx::FromRow;
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

#[derive(Debug, FromRow)]
pub struct ProblemRow {
    pub problem_id: String,
    pub leetcode_id: i64,
    pub title: String,
    pub slug: String,
    pub difficulty: String,
    pub box_level: i64,
    pub review_schedule: i64,
    pub last_attempt_date: Option<i64>,
    pub attempts_total: i64,
    pub attempts_successful: i64,
}

impl ProblemRow {
    pub fn into_problem(self, tags: BTreeSet<String>) -> Result<Problem> {
        Ok(Problem {
            problem_id: Uuid::parse_str(&self.problem_id).context("problem_id")?,
            leetcode_id: self.leetcode_id,
            title: self.title,
            slug: self.slug,
            difficulty: Difficulty::from_str(&self.difficulty)?,
            tags,
            box_level: self.box_level as u8,
            review_schedule: millis_to_datetime(self.review_schedule),
            last_attempt_date: self.last_attempt_date.map(millis_to_datetime),
            attempt_stats: scheduler_core::AttemptStats {
                total: self.attempts_total as u32,
                successful: self.attempts_successful as u32,
            },
        })
    }
}

pub struct ProblemBind {
    pub problem_id: String,
    pub leetcode_id: i64,
    pub title: String,
    pub slug: String,
    pub difficulty: String,
    pub box_level: i64,
    pub review_schedule: i64,
    pub last_attempt_date: Option<i64>,
    pub attempts_total: i64,
    pub attempts_successful: i64,
}

impl From<&Problem> for ProblemBind {
    fn from(p: &Problem) -> Self {
        Self {
            problem_id: p.problem_id.to_string(),
            leetcode_id: p.leetcode_id,
            title: p.title.clone(),
            slug: p.slug.clone(),
            difficulty: p.difficulty.to_string(),
            box_level: p.box_level as i64,
            review_schedule: p.review_schedule.timestamp_millis(),
            last_attempt_date: p.last_attempt_date.map(|d| d.timestamp_millis()),
            attempts_total: p.attempt_stats.total as i64,
            attempts_successful: p.attempt_stats.successful as i64,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct AttemptRow {
    pub attempt_id: String,
    pub problem_id: String,
    pub leetcode_id: i64,
    pub session_id: Option<String>,
    pub attempt_date: i64,
    pub success: i64,
    pub time_spent: i64,
    pub hints_used: i64,
    pub box_level_at_attempt: i64,
    pub comments: Option<String>,
}

impl TryFrom<AttemptRow> for Attempt {
    type Error = anyhow::Error;

    fn try_from(r: AttemptRow) -> Result<Self> {
        Ok(Attempt {
            attempt_id: Uuid::parse_str(&r.attempt_id).context("attempt_id")?,
            problem_id: Uuid::parse_str(&r.problem_id).context("problem_id")?,
            leetcode_id: r.leetcode_id,
            session_id: r
                .session_id
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("session_id")?,
            attempt_date: millis_to_datetime(r.attempt_date),
            success: r.success != 0,
            time_spent: r.time_spent as u32,
            hints_used: r.hints_used as u32,
            box_level_at_attempt: r.box_level_at_attempt as u8,
            comments: r.comments,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct SessionRow {
    pub session_id: String,
    pub session_type: String,
    pub status: String,
    pub origin: String,
    pub created_at: i64,
    pub last_activity_time: i64,
    pub problems: String,
    pub attempts: String,
    pub current_problem_index: i64,
    pub accuracy: Option<f64>,
    pub duration: Option<f64>,
}

impl TryFrom<SessionRow> for Session {
    type Error = anyhow::Error;

    fn try_from(r: SessionRow) -> Result<Self> {
        let problems: Vec<SessionProblem> =
            serde_json::from_str(&r.problems).context("session.problems")?;
        let attempts: Vec<Uuid> = serde_json::from_str(&r.attempts).context("session.attempts")?;

        Ok(Session {
            session_id: Uuid::parse_str(&r.session_id).context("session_id")?,
            session_type: parse_session_type(&r.session_type)?,
            status: match r.status.as_str() {
                "in_progress" => SessionStatus::InProgress,
                "completed" => SessionStatus::Completed,
                other => anyhow::bail!("unknown session status: {other}"),
            },
            origin: match r.origin.as_str() {
                "generator" => SessionOrigin::Generator,
                "tracking" => SessionOrigin::Tracking,
                other => anyhow::bail!("unknown session origin: {other}"),
            },
            created_at: millis_to_datetime(r.created_at),
            last_activity_time: millis_to_datetime(r.last_activity_time),
            problems,
            attempts,
            current_problem_index: r.current_problem_index as usize,
            accuracy: r.accuracy,
            duration: r.duration,
        })
    }
}

pub struct SessionBind {
    pub session_id: String,
    pub session_type: String,
    pub status: String,
    pub origin: String,
    pub created_at: i64,
    pub last_activity_time: i64,
    pub problems: String,
    pub attempts: String,
    pub current_problem_index: i64,
    pub accuracy: Option<f64>,
    pub duration: Option<f64>,
}

impl TryFrom<&Session> for SessionBind {
    type Error = anyhow::Error;

    fn try_from(s: &Session) -> Result<Self> {
        Ok(Self {
            session_id: s.session_id.to_string(),
            session_type: session_type_str(s.session_type).to_string(),
            status: match s.status {
                SessionStatus::InProgress => "in_progress",
                SessionStatus::Completed => "completed",
            }
            .to_string(),
            origin: match s.origin {
                SessionOrigin::Generator => "generator",
                SessionOrigin::Tracking => "tracking",
            }
            .to_string(),
            created_at: s.created_at.timestamp_millis(),
            last_activity_time: s.last_activity_time.timestamp_millis(),
            problems: serde_json::to_string(&s.problems)?,
            attempts: serde_json::to_string(&s.attempts)?,
            current_problem_index: s.current_problem_index as i64,
            accuracy: s.accuracy,
            duration: s.duration,
        })
    }
}

pub fn session_type_str(session_type: SessionType) -> &'static str {
    match session_type {
        SessionType::Standard => "standard",
        SessionType::Tracking => "tracking",
        SessionType::InterviewLike => "interview_like",
        SessionType::FullInterview => "full_interview",
    }
}

pub fn parse_session_type(s: &str) -> Result<SessionType> {
    Ok(match s {
        "standard" => SessionType::Standard,
        "tracking" => SessionType::Tracking,
        "interview_like" => SessionType::InterviewLike,
        "full_interview" => SessionType::FullInterview,
        other => anyhow::bail!("unknown session type: {other}"),
    })
}

#[derive(Debug, FromRow)]
pub struct TagMasteryRow {
    pub tag: String,
    pub total_attempts: i64,
    pub successful_attempts: i64,
    pub success_rate: f64,
    pub mastered: i64,
    pub decay_score: f64,
    pub last_recomputed_at: i64,
}

impl From<TagMasteryRow> for TagMastery {
    fn from(r: TagMasteryRow) -> Self {
        TagMastery {
            tag: r.tag,
            total_attempts: r.total_attempts as u32,
            successful_attempts: r.successful_attempts as u32,
            success_rate: r.success_rate,
            mastered: r.mastered != 0,
            decay_score: r.decay_score,
            last_recomputed_at: millis_to_datetime(r.last_recomputed_at),
        }
    }
}

#[derive(Debug, FromRow)]
pub struct SessionStateRow {
    pub id: String,
    pub num_sessions_completed: i64,
    pub current_focus_tags: String,
    pub performance_level: String,
    pub last_performance_accuracy: Option<f64>,
    pub last_performance_efficiency: Option<f64>,
    pub previous_performance_accuracy: Option<f64>,
    pub previous_performance_efficiency: Option<f64>,
    pub last_progress_date: Option<i64>,
    pub current_difficulty_cap: String,
    pub session_length: i64,
    pub number_of_new_problems: i64,
    pub current_allowed_tags: String,
}

impl TryFrom<SessionStateRow> for SessionState {
    type Error = anyhow::Error;

    fn try_from(r: SessionStateRow) -> Result<Self> {
        let current_focus_tags: Vec<String> =
            serde_json::from_str(&r.current_focus_tags).context("current_focus_tags")?;
        let current_allowed_tags: BTreeSet<String> =
            serde_json::from_str(&r.current_allowed_tags).context("current_allowed_tags")?;

        let last_performance = match (r.last_performance_accuracy, r.last_performance_efficiency) {
            (Some(accuracy), Some(efficiency_score)) => Some(LastPerformance {
                accuracy,
                efficiency_score,
            }),
            _ => None,
        };
        let previous_performance = match (r.previous_performance_accuracy, r.previous_performance_efficiency) {
            (Some(accuracy), Some(efficiency_score)) => Some(LastPerformance {
                accuracy,
                efficiency_score,
            }),
            _ => None,
        };

        Ok(SessionState {
            num_sessions_completed: r.num_sessions_completed as u32,
            current_focus_tags,
            performance_level: match r.performance_level.as_str() {
                "onboarding" => PerformanceLevel::Onboarding,
                "struggling" => PerformanceLevel::Struggling,
                "steady" => PerformanceLevel::Steady,
                "expanding" => PerformanceLevel::Expanding,
                other => anyhow::bail!("unknown performance level: {other}"),
            },
            last_performance,
            previous_performance,
            last_progress_date: r.last_progress_date.map(millis_to_datetime),
            current_difficulty_cap: Difficulty::from_str(&r.current_difficulty_cap)?,
            session_length: r.session_length as u32,
            number_of_new_problems: r.number_of_new_problems as u32,
            current_allowed_tags,
        })
    }
}

pub struct SessionStateBind {
    pub num_sessions_completed: i64,
    pub current_focus_tags: String,
    pub performance_level: String,
    pub last_performance_accuracy: Option<f64>,
    pub last_performance_efficiency: Option<f64>,
    pub previous_performance_accuracy: Option<f64>,
    pub previous_performance_efficiency: Option<f64>,
    pub last_progress_date: Option<i64>,
    pub current_difficulty_cap: String,
    pub session_length: i64,
    pub number_of_new_problems: i64,
    pub current_allowed_tags: String,
}

impl TryFrom<&SessionState> for SessionStateBind {
    type Error = anyhow::Error;

    fn try_from(s: &SessionState) -> Result<Self> {
        Ok(Self {
            num_sessions_completed: s.num_sessions_completed as i64,
            current_focus_tags: serde_json::to_string(&s.current_focus_tags)?,
            performance_level: match s.performance_level {
                PerformanceLevel::Onboarding => "onboarding",
                PerformanceLevel::Struggling => "struggling",
                PerformanceLevel::Steady => "steady",
                PerformanceLevel::Expanding => "expanding",
            }
            .to_string(),
            last_performance_accuracy: s.last_performance.map(|p| p.accuracy),
            last_performance_efficiency: s.last_performance.map(|p| p.efficiency_score),
            previous_performance_accuracy: s.previous_performance.map(|p| p.accuracy),
            previous_performance_efficiency: s.previous_performance.map(|p| p.efficiency_score),
            last_progress_date: s.last_progress_date.map(|d| d.timestamp_millis()),
            current_difficulty_cap: s.current_difficulty_cap.to_string(),
            session_length: s.session_length as i64,
            number_of_new_problems: s.number_of_new_problems as i64,
            current_allowed_tags: serde_json::to_string(&s.current_allowed_tags)?,
        })
    }
}
