use super::Context;
use super::story::contribution_row;
use crate::output::{pretty_kv, render_mode};
use anyhow::{Context as _, Result};
use clap::Args;
use storyfork_core::branches::add_contribution;
use storyfork_core::model::{ContributionTags, DocId, NewContribution};

#[derive(Args, Debug)]
pub struct ContributeArgs {
    pub story_id: String,

    /// Contribution this branch continues from.
    #[arg(long)]
    pub parent: String,

    /// Branch text.
    #[arg(long)]
    pub content: String,

    /// Character appearing in this branch (repeatable).
    #[arg(long = "character")]
    pub characters: Vec<String>,

    /// Where in the story's timeline this branch sits.
    #[arg(long)]
    pub timeline: Option<String>,

    /// Where this branch takes place.
    #[arg(long)]
    pub location: Option<String>,
}

impl ContributeArgs {
    fn tags(&self) -> Option<ContributionTags> {
        let tags = ContributionTags {
            characters: self.characters.clone(),
            timeline: self.timeline.clone(),
            location: self.location.clone(),
        };
        (!tags.is_empty()).then_some(tags)
    }
}

/// Execute `sf contribute <story> --parent <id> --content <text>`.
pub fn run_contribute(args: &ContributeArgs, ctx: &Context) -> Result<()> {
    let parent = DocId::parse(&args.parent)?;
    let store = ctx.open_store()?;
    let input = NewContribution {
        content: args.content.clone(),
        parent_contribution_id: parent,
        tags: args.tags(),
    };
    let contribution = add_contribution(&store, &ctx.author(), &args.story_id, &input)
        .context("add contribution")?;

    render_mode(ctx.output, &contribution, contribution_row, |c, w| {
        writeln!(w, "✓ Added contribution {}", c.id)?;
        pretty_kv(w, "Story", c.story_id.as_str())?;
        pretty_kv(
            w,
            "Parent",
            c.parent_contribution_id
                .as_ref()
                .map_or("-", DocId::as_str),
        )?;
        pretty_kv(w, "Author", &c.author.display_name)
    })
}

#[cfg(test)]
mod tests {
    use super::ContributeArgs;

    fn args(characters: &[&str], location: Option<&str>) -> ContributeArgs {
        ContributeArgs {
            story_id: "s".into(),
            parent: "p".into(),
            content: "text".into(),
            characters: characters.iter().map(|c| (*c).to_string()).collect(),
            timeline: None,
            location: location.map(str::to_string),
        }
    }

    #[test]
    fn no_flags_means_no_tags() {
        assert!(args(&[], None).tags().is_none());
    }

    #[test]
    fn flags_become_tags() {
        let tags = args(&["Mira", "Tor"], Some("docks")).tags().expect("tags");
        assert_eq!(tags.characters, ["Mira", "Tor"]);
        assert_eq!(tags.location.as_deref(), Some("docks"));
    }
}
