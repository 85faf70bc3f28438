//! Reusable fixture builders for problems, attempts, and sessions.

use crate::domain::{
    Attempt, AttemptStats, Difficulty, Problem, Session, SessionOrigin, SessionType,
};
use chrono::Utc;
use std::collections::BTreeSet;
use uuid::Uuid;

/// A two-sum-shaped problem with one tag, never attempted.
pub fn problem_fixture(leetcode_id: i64, tags: &[&str]) -> Problem {
    Problem {
        problem_id: Uuid::new_v4(),
        leetcode_id,
        title: format!("Problem {leetcode_id}"),
        slug: format!("problem-{leetcode_id}"),
        difficulty: Difficulty::Easy,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        box_level: 1,
        review_schedule: Utc::now(),
        last_attempt_date: None,
        attempt_stats: AttemptStats::new(),
    }
}

pub fn attempt_fixture(problem: &Problem, success: bool) -> Attempt {
    Attempt {
        attempt_id: Uuid::new_v4(),
        problem_id: problem.problem_id,
        leetcode_id: problem.leetcode_id,
        session_id: None,
        attempt_date: Utc::now(),
        success,
        time_spent: 300,
        hints_used: 0,
        box_level_at_attempt: problem.box_level,
        comments: None,
    }
}

pub fn session_fixture(session_type: SessionType, problems: &[Problem]) -> Session {
    let mut session = Session::new(session_type, SessionOrigin::Generator, Utc::now());
    session.problems = problems
        .iter()
        .map(|p| crate::domain::SessionProblem {
            problem_id: p.problem_id,
            leetcode_id: p.leetcode_id,
            selection_reason: crate::domain::SelectionReason::Review,
        })
        .collect();
    session
}

pub fn tag_set(tags: &[&str]) -> BTreeSet<String> {
    tags.iter().map(|t| t.to_string()).collect()
}
