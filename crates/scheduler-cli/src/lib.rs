pub mod attempt;
pub mod context;
pub mod mastery;
pub mod schedule;
pub mod session;
