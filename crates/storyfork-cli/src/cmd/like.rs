use super::Context;
use crate::output::{pretty_kv, render_mode};
use anyhow::Result;
use clap::Args;
use storyfork_core::canon::record_like_with;

#[derive(Args, Debug)]
pub struct LikeArgs {
    pub story_id: String,
    pub contribution_id: String,
}

/// Execute `sf like <story> <contribution>`.
///
/// Uses the promotion threshold from `.storyfork/config.toml`.
pub fn run_like(args: &LikeArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let policy = ctx.config.project.promotion_policy();
    let outcome = record_like_with(&store, policy, &args.story_id, &args.contribution_id)?;

    render_mode(
        ctx.output,
        &outcome,
        |o, w| {
            writeln!(
                w,
                "{}\t{}\t{}",
                o.contribution_id,
                o.likes,
                if o.promoted { "promoted" } else { "-" }
            )
        },
        |o, w| {
            writeln!(w, "♥ {} now has {} likes", o.contribution_id, o.likes)?;
            if o.promoted {
                pretty_kv(w, "Canon", "promoted to the main storyline")?;
            }
            if let Some(demoted) = &o.demoted {
                pretty_kv(w, "Replaced", demoted.as_str())?;
            }
            Ok(())
        },
    )
}
