pub mod assembler;
pub mod attempt_engine;
pub mod catalogue;
pub mod focus;
pub mod lifecycle;
pub mod review_scheduler;
pub mod tag_mastery;

pub use assembler::{AssembledProblem, SessionAssembler};
pub use attempt_engine::{AddAttemptOutcome, AttemptEngine};
pub use catalogue::ProblemCatalogue;
pub use focus::{FocusAction, FocusCoordinator, FocusDecision};
pub use lifecycle::{CompletionStatus, SessionLifecycleManager};
pub use review_scheduler::ReviewScheduler;
pub use tag_mastery::TagMasteryEngine;
