pub mod concurrency;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::Settings;

pub use domain::{
    Attempt, AttemptStats, CoreError, Difficulty, LastPerformance, MasteryDelta, NewAttempt,
    PerformanceLevel, Problem, SelectionReason, Session, SessionOrigin, SessionProblem,
    SessionState, SessionStatus, SessionType, TagMastery, SESSION_STATE_ID,
};

pub use ports::{Clock, FixedClock, Store, SystemClock};

pub use services::{
    AddAttemptOutcome, AssembledProblem, AttemptEngine, CompletionStatus, FocusAction,
    FocusCoordinator, FocusDecision, ProblemCatalogue, ReviewScheduler, SessionAssembler,
    SessionLifecycleManager, TagMasteryEngine,
};
