//! `sf story`: create, list, show, and close stories.

use super::{Context, excerpt, micros_to_local_datetime};
use crate::output::{pretty_kv, pretty_rule, pretty_section, render_mode};
use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::io::{self, Write};
use storyfork_core::branches::{canonical_line, contributions};
use storyfork_core::model::{Contribution, NewStory, Story, StoryStatus};
use storyfork_core::stories;

#[derive(Subcommand, Debug)]
pub enum StoryCommand {
    /// Start a new story with its opening contribution.
    Create(CreateArgs),
    /// List stories, newest first.
    List,
    /// Show a story and its main storyline.
    Show(ShowArgs),
    /// Mark a story ongoing or completed.
    Status(StatusArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Story title.
    #[arg(long)]
    pub title: String,

    /// Opening contribution text.
    #[arg(long)]
    pub content: String,

    /// Optional cover image URL.
    #[arg(long)]
    pub cover: Option<String>,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub story_id: String,

    /// Show every contribution instead of only the main storyline.
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    pub story_id: String,

    /// New status: ongoing or completed.
    pub status: String,
}

#[derive(Debug, Serialize)]
struct StoryView<'a> {
    #[serde(flatten)]
    story: &'a Story,
    contributions: &'a [Contribution],
}

pub fn run_story(command: &StoryCommand, ctx: &Context) -> Result<()> {
    match command {
        StoryCommand::Create(args) => run_create(args, ctx),
        StoryCommand::List => run_list(ctx),
        StoryCommand::Show(args) => run_show(args, ctx),
        StoryCommand::Status(args) => run_status(args, ctx),
    }
}

fn run_create(args: &CreateArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let input = NewStory {
        title: args.title.clone(),
        content: args.content.clone(),
        cover_image_url: args.cover.clone(),
    };
    let story = stories::create_story(&store, &ctx.author(), &input).context("create story")?;
    render_mode(ctx.output, &story, story_row, |s, w| {
        writeln!(w, "✓ Created story {}", s.id)?;
        pretty_kv(w, "Title", &s.title)?;
        pretty_kv(
            w,
            "Opening",
            s.first_contribution_id
                .as_ref()
                .map_or_else(String::new, ToString::to_string),
        )
    })
}

fn run_list(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let all = stories::list_stories(&store)?;
    render_mode(
        ctx.output,
        all.as_slice(),
        |list, w| {
            for s in list {
                story_row(s, w)?;
            }
            Ok(())
        },
        |list, w| {
            if list.is_empty() {
                return writeln!(w, "No stories yet.");
            }
            pretty_section(w, &format!("Stories ({})", list.len()))?;
            for s in list {
                writeln!(
                    w,
                    "{:<22} {:<10} {}",
                    s.id.as_str(),
                    s.status.as_str(),
                    excerpt(&s.title, 40)
                )?;
            }
            Ok(())
        },
    )
}

fn run_show(args: &ShowArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let story = stories::get_story(&store, &args.story_id)?;
    let rows = if args.all {
        contributions(&store, &story.id)?
    } else {
        canonical_line(&store, &story.id)?
    };
    let view = StoryView {
        story: &story,
        contributions: &rows,
    };
    render_mode(
        ctx.output,
        &view,
        |v, w| {
            story_row(v.story, w)?;
            for c in v.contributions {
                contribution_row(c, w)?;
            }
            Ok(())
        },
        |v, w| render_show_human(v, args.all, w),
    )
}

fn render_show_human(view: &StoryView<'_>, all: bool, w: &mut dyn Write) -> io::Result<()> {
    let story = view.story;
    pretty_section(w, &story.title)?;
    pretty_kv(w, "ID", story.id.as_str())?;
    pretty_kv(w, "Author", &story.author.display_name)?;
    pretty_kv(w, "Status", story.status.as_str())?;
    pretty_kv(w, "Created", micros_to_local_datetime(story.created_at_us))?;
    if let Some(cover) = &story.cover_image_url {
        pretty_kv(w, "Cover", cover)?;
    }
    writeln!(w)?;
    writeln!(w, "{}", if all { "All contributions" } else { "Main storyline" })?;
    pretty_rule(w)?;
    for c in view.contributions {
        let marker = if c.is_canonical { "★" } else { " " };
        writeln!(
            w,
            "{marker} {} ({} likes, {})",
            c.id,
            c.likes_count,
            c.author.display_name
        )?;
        for line in c.content.lines() {
            writeln!(w, "    {line}")?;
        }
    }
    Ok(())
}

fn run_status(args: &StatusArgs, ctx: &Context) -> Result<()> {
    let status: StoryStatus = args.status.parse()?;
    let store = ctx.open_store()?;
    let story = stories::set_status(&store, &args.story_id, status)?;
    render_mode(ctx.output, &story, story_row, |s, w| {
        writeln!(w, "✓ Story {} is now {}", s.id, s.status)
    })
}

fn story_row(s: &Story, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}",
        s.id, s.status, s.author.display_name, s.title
    )
}

pub fn contribution_row(c: &Contribution, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}\t{}",
        c.id,
        c.parent_contribution_id
            .as_ref()
            .map_or("-", |p| p.as_str()),
        c.likes_count,
        if c.is_canonical { "canon" } else { "-" },
        excerpt(&c.content, 60)
    )
}
