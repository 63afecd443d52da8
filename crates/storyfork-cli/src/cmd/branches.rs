//! `sf branches`: the competing continuations of one contribution.

use super::{Context, excerpt};
use crate::output::{pretty_section, render_mode};
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::collections::HashMap;
use storyfork_core::branches::branches_of;
use storyfork_core::model::{Contribution, DocId};
use storyfork_core::rank::{LocalRanker, ranked_branches};
use storyfork_core::stories::get_story;

#[derive(Args, Debug)]
pub struct BranchesArgs {
    pub story_id: String,

    /// Contribution whose branches to list. Defaults to the opening.
    #[arg(long)]
    pub parent: Option<String>,

    /// Order branches with the ranker and include its justification.
    #[arg(long)]
    pub rank: bool,
}

#[derive(Debug, Serialize)]
struct BranchRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    rank: Option<u32>,
    id: DocId,
    likes: u64,
    canonical: bool,
    author: String,
    excerpt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    justification: Option<String>,
}

impl BranchRow {
    fn from_contribution(c: &Contribution) -> Self {
        Self {
            rank: None,
            id: c.id.clone(),
            likes: c.likes_count,
            canonical: c.is_canonical,
            author: c.author.display_name.clone(),
            excerpt: excerpt(&c.content, 60),
            justification: None,
        }
    }
}

pub fn run_branches(args: &BranchesArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let parent = match &args.parent {
        Some(id) => id.clone(),
        None => get_story(&store, &args.story_id)?
            .first_contribution_id
            .map(|id| id.to_string())
            .ok_or_else(|| anyhow::anyhow!("story {} has no opening", args.story_id))?,
    };

    let children = branches_of(&store, &args.story_id, &parent)?;
    let rows: Vec<BranchRow> = if args.rank {
        let by_id: HashMap<&DocId, &Contribution> = children.iter().map(|c| (&c.id, c)).collect();
        ranked_branches(&store, &LocalRanker, &args.story_id, &parent)?
            .into_iter()
            .filter_map(|ranked| {
                by_id.get(&ranked.id).map(|c| BranchRow {
                    rank: Some(ranked.rank),
                    justification: Some(ranked.justification),
                    ..BranchRow::from_contribution(c)
                })
            })
            .collect()
    } else {
        children.iter().map(BranchRow::from_contribution).collect()
    };

    render_mode(
        ctx.output,
        rows.as_slice(),
        |rows, w| {
            for r in rows {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}",
                    r.id,
                    r.likes,
                    if r.canonical { "canon" } else { "-" },
                    r.excerpt
                )?;
            }
            Ok(())
        },
        |rows, w| {
            if rows.is_empty() {
                return writeln!(w, "No branches under {parent} yet.");
            }
            pretty_section(w, &format!("Branches under {parent}"))?;
            for r in rows {
                let marker = if r.canonical { "★" } else { " " };
                let position = r.rank.map_or_else(String::new, |n| format!("#{n} "));
                writeln!(
                    w,
                    "{marker} {position}{} ({} likes, {}) {}",
                    r.id, r.likes, r.author, r.excerpt
                )?;
                if let Some(why) = &r.justification {
                    writeln!(w, "    {why}")?;
                }
            }
            Ok(())
        },
    )
}
