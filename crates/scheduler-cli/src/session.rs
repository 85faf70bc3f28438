use anyhow::Result;
use colored::*;
use scheduler_core::{CompletionStatus, Problem, Session, SessionType};
use uuid::Uuid;

use crate::context::Context;

fn print_session(session: &Session) {
    println!(
        "{} {}  type={:?}  status={:?}  problems={}  index={}/{}",
        "session".bold(),
        session.session_id,
        session.session_type,
        session.status,
        session.problems.len(),
        session.current_problem_index,
        session.problems.len(),
    );
}

pub async fn get(ctx: &Context, id: Uuid) -> Result<()> {
    match ctx.store.get_session(id).await? {
        Some(session) => print_session(&session),
        None => println!("{}", "no such session".red()),
    }
    Ok(())
}

pub async fn resume(ctx: &Context, session_type: Option<SessionType>) -> Result<()> {
    match ctx.lifecycle.resume_session(session_type).await? {
        Some(session) => print_session(&session),
        None => println!("{}", "no compatible in-progress session".yellow()),
    }
    Ok(())
}

pub async fn create(ctx: &Context, session_type: SessionType) -> Result<()> {
    match ctx.lifecycle.get_or_create_session(session_type).await? {
        Some(session) => print_session(&session),
        None => println!("{}", "could not assemble a session (no eligible problems)".red()),
    }
    Ok(())
}

pub async fn refresh(ctx: &Context, session_type: SessionType, force_new: bool) -> Result<()> {
    match ctx.lifecycle.refresh_session(session_type, force_new).await? {
        Some(session) => print_session(&session),
        None => println!("{}", "refresh declined (forceNew guard or no eligible problems)".yellow()),
    }
    Ok(())
}

pub async fn complete(ctx: &Context, id: Uuid) -> Result<()> {
    match ctx.lifecycle.check_and_complete_session(id).await? {
        CompletionStatus::NotFound => println!("{}", "no such session".red()),
        CompletionStatus::Completed => println!("{}", "session completed".green()),
        CompletionStatus::Remaining(problems) => {
            println!(
                "{} {} problem(s) remaining:",
                "not yet complete —".yellow(),
                problems.len()
            );
            for problem in &problems {
                print_problem(problem);
            }
        }
    }
    Ok(())
}

pub async fn skip(
    ctx: &Context,
    id: Uuid,
    leetcode_id: i64,
    replacement: Option<Problem>,
) -> Result<()> {
    ctx.lifecycle.skip_problem(id, leetcode_id, replacement).await?;
    println!("{}", "problem skipped".green());
    Ok(())
}

fn print_problem(problem: &Problem) {
    println!(
        "  [{}] {} ({:?}, box {})",
        problem.leetcode_id, problem.title, problem.difficulty, problem.box_level
    );
}
