use crate::domain::Difficulty;
use serde::{Deserialize, Serialize};

/// Recognized settings from spec.md §6 "Configuration inputs". Deserialized
/// from whatever config source the binary crates (server/CLI) choose to
/// read (env, JSON, TOML); `scheduler-core` only defines the shape and the
/// defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Total problems per session. 3..10.
    pub session_length: u32,
    /// Cap on the "new" portion of a session. 0..session_length.
    pub number_of_new_problems: u32,
    /// If true, the Focus Coordinator may adapt focus tags after each
    /// session; if false, `current_focus_tags` is frozen.
    pub flexible_schedule: bool,
    /// Overrides the 0.4 review-ratio constant in the Assembler. 0..80,
    /// step 10.
    pub review_ratio: u32,
    /// Upper difficulty bound passed to the Assembler.
    pub difficulty_cap: Difficulty,
    /// Floor on the review proportion; a warning (not a failure) is logged
    /// when the Assembler falls below it. 0..60.
    pub min_review_ratio: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            session_length: 5,
            number_of_new_problems: 3,
            flexible_schedule: true,
            review_ratio: 40,
            difficulty_cap: Difficulty::Medium,
            min_review_ratio: 30,
        }
    }
}

impl Settings {
    /// Clamp user-supplied values into their documented ranges rather than
    /// rejecting them outright; out-of-range config is a caller mistake,
    /// not a reason to fail session assembly.
    pub fn normalized(mut self) -> Self {
        self.session_length = self.session_length.clamp(3, 10);
        self.number_of_new_problems = self.number_of_new_problems.min(self.session_length);
        self.review_ratio = self.review_ratio.min(80);
        self.min_review_ratio = self.min_review_ratio.min(60);
        self
    }
}
