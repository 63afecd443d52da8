use super::Context;
use crate::output::{pretty_section, render_mode};
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use storyfork_core::branches::contributions;
use storyfork_core::canon::{InvariantViolation, check_invariants};
use storyfork_core::model::DocId;
use storyfork_core::stories::{get_story, list_stories};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Check a single story instead of all of them.
    pub story_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct StoryCheck {
    story_id: DocId,
    contributions: usize,
    violations: Vec<String>,
}

#[derive(Debug, Serialize)]
struct VerifyReport {
    ok: bool,
    stories: Vec<StoryCheck>,
}

/// Execute `sf verify`: re-check canon invariants over stored stories.
///
/// # Errors
///
/// Fails after printing the report if any story is inconsistent.
pub fn run_verify(args: &VerifyArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let ids: Vec<DocId> = match &args.story_id {
        Some(id) => vec![get_story(&store, id)?.id],
        None => list_stories(&store)?.into_iter().map(|s| s.id).collect(),
    };

    let mut first_violation: Option<InvariantViolation> = None;
    let mut checks = Vec::with_capacity(ids.len());
    for story_id in ids {
        let rows = contributions(&store, &story_id)?;
        let violations = check_invariants(&rows).err().unwrap_or_default();
        if first_violation.is_none() {
            first_violation = violations.first().cloned();
        }
        checks.push(StoryCheck {
            story_id,
            contributions: rows.len(),
            violations: violations.iter().map(ToString::to_string).collect(),
        });
    }

    let report = VerifyReport {
        ok: first_violation.is_none(),
        stories: checks,
    };
    render_mode(
        ctx.output,
        &report,
        |r, w| {
            for s in &r.stories {
                let status = if s.violations.is_empty() { "ok" } else { "FAIL" };
                writeln!(w, "{}\t{}\t{}", s.story_id, s.contributions, status)?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, &format!("Verified {} stories", r.stories.len()))?;
            for s in &r.stories {
                if s.violations.is_empty() {
                    writeln!(w, "✓ {} ({} contributions)", s.story_id, s.contributions)?;
                } else {
                    writeln!(w, "✗ {}", s.story_id)?;
                    for v in &s.violations {
                        writeln!(w, "    {v}")?;
                    }
                }
            }
            Ok(())
        },
    )?;

    match first_violation {
        Some(violation) => Err(anyhow::Error::new(violation).context("canon invariants violated")),
        None => Ok(()),
    }
}
