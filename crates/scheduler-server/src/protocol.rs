use scheduler_core::{Problem, SessionType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /attempts`, mirroring spec.md §6's `addAttempt(attempt_data)`.
#[derive(Debug, Deserialize)]
pub struct AddAttemptRequest {
    pub problem_id: Option<Uuid>,
    pub leetcode_id: Option<i64>,
    pub success: bool,
    pub time_spent: u32,
    #[serde(default)]
    pub hints_used: u32,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ResumeSessionRequest {
    #[serde(default)]
    pub session_type: Option<SessionType>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub session_type: SessionType,
}

#[derive(Debug, Deserialize)]
pub struct RefreshSessionRequest {
    pub session_type: SessionType,
    #[serde(default)]
    pub force_new: bool,
}

#[derive(Debug, Deserialize)]
pub struct SkipProblemRequest {
    pub leetcode_id: i64,
    #[serde(default)]
    pub replacement: Option<Problem>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ReviewScheduleQuery {
    pub n: Option<usize>,
}

/// JSON shape for `checkAndCompleteSession`'s `false | [] | [problems]`
/// tri-state contract (spec.md §4.H).
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompletionResponse {
    NotFound,
    Completed,
    Remaining { problems: Vec<Problem> },
}
