use anyhow::Result;
use colored::*;

use crate::context::Context;

/// Print every tag's mastery snapshot, mastered tags highlighted.
pub async fn show(ctx: &Context) -> Result<()> {
    let mut snapshot = ctx.tag_mastery.snapshot_all().await?;
    snapshot.sort_by(|a, b| a.tag.cmp(&b.tag));

    if snapshot.is_empty() {
        println!("{}", "no mastery data yet".dimmed());
        return Ok(());
    }

    for entry in snapshot {
        let tag = if entry.mastered {
            entry.tag.green().bold()
        } else {
            entry.tag.normal()
        };
        println!(
            "{:<20} attempts={:<4} success_rate={:>5.1}%  decay={:.2}",
            tag,
            entry.total_attempts,
            entry.success_rate * 100.0,
            entry.decay_score,
        );
    }
    Ok(())
}

/// Print the box-level distribution across the catalogue.
pub async fn box_levels(ctx: &Context) -> Result<()> {
    let counts = ctx.catalogue.count_by_box_level().await?;
    let mut levels: Vec<_> = counts.into_iter().collect();
    levels.sort_by_key(|(level, _)| *level);
    for (level, count) in levels {
        println!("box {level}: {count}");
    }
    Ok(())
}
