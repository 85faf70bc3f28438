use anyhow::Result;
use colored::*;
use uuid::Uuid;

use crate::context::Context;

/// Record a single attempt and print the written row plus whether it hints
/// the caller should check session completion.
pub async fn add(
    ctx: &Context,
    data: scheduler_core::NewAttempt,
    session_id: Option<Uuid>,
) -> Result<()> {
    match ctx.attempt_engine.add_attempt(data, session_id).await? {
        Some(outcome) => {
            let verdict = if outcome.attempt.success {
                "success".green()
            } else {
                "failure".red()
            };
            println!(
                "{} attempt {} ({})",
                "recorded".bold(),
                outcome.attempt.attempt_id,
                verdict
            );
            if outcome.completion_hint {
                println!("{}", "  session may now be complete".dimmed());
            }
        }
        None => println!("{}", "problem not found".red()),
    }

    Ok(())
}

/// List attempts against a single problem, most recent first.
pub async fn list(ctx: &Context, problem_id: Uuid) -> Result<()> {
    let attempts = ctx.attempt_engine.get_attempts_by_problem(problem_id).await?;
    if attempts.is_empty() {
        println!("{}", "no attempts recorded".dimmed());
        return Ok(());
    }
    for attempt in attempts {
        let verdict = if attempt.success { "ok".green() } else { "miss".red() };
        println!(
            "{}  {:>4}s  hints={}  box={}  {}",
            attempt.attempt_date.to_rfc3339(),
            attempt.time_spent,
            attempt.hints_used,
            attempt.box_level_at_attempt,
            verdict
        );
    }
    Ok(())
}
