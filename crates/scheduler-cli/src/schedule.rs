use anyhow::Result;
use colored::*;

use crate::context::Context;

/// Print today's review schedule, up to `budget` problems.
pub async fn daily(ctx: &Context, budget: usize) -> Result<()> {
    let state = ctx.lifecycle.current_state().await?;
    let problems = ctx.review_scheduler.daily_review_schedule(budget, &state).await;

    if problems.is_empty() {
        println!("{}", "nothing due".dimmed());
        return Ok(());
    }

    for problem in problems {
        println!(
            "{} [{}] {} ({:?}, box {})",
            "due".cyan(),
            problem.leetcode_id,
            problem.title,
            problem.difficulty,
            problem.box_level,
        );
    }
    Ok(())
}
