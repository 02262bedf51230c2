use std::fmt::Write;

use anyhow::Result;
use forumplan_core::{AnalysisReport, Calendar, Comment, Post, QualityReport};

pub fn calendars_markdown(calendars: &[Calendar]) -> Result<String> {
    let mut out = String::new();
    for (week, calendar) in calendars.iter().enumerate() {
        if week > 0 {
            writeln!(out)?;
        }
        write_calendar(&mut out, week, calendar)?;
    }
    Ok(out)
}

fn write_calendar(out: &mut String, week: usize, calendar: &Calendar) -> Result<()> {
    writeln!(
        out,
        "# Week {} (starting {})\n",
        week + 1,
        calendar.week_start_date.format("%A %Y-%m-%d")
    )?;
    writeln!(out, "| Date | Subreddit | Author | Title | Comments |")?;
    writeln!(out, "| --- | --- | --- | --- | --- |")?;
    for post in &calendar.posts {
        writeln!(
            out,
            "| {} | r/{} | {} | {} | {} |",
            post.date.format("%a %H:%M"),
            post.subreddit,
            post.author_name,
            escape_cell(&post.simulated_title),
            post.comments.len()
        )?;
    }

    for post in &calendar.posts {
        writeln!(out)?;
        write_post(out, post)?;
    }
    Ok(())
}

fn write_post(out: &mut String, post: &Post) -> Result<()> {
    writeln!(out, "## {}\n", post.simulated_title)?;
    writeln!(
        out,
        "*r/{} · {} · {}*\n",
        post.subreddit,
        post.author_name,
        post.date.format("%Y-%m-%d %H:%M")
    )?;
    writeln!(out, "{}\n", post.simulated_body)?;

    for comment in post.comments.iter().filter(|c| c.parent_id.is_none()) {
        write_comment(out, post, comment, 0)?;
    }
    Ok(())
}

fn write_comment(out: &mut String, post: &Post, comment: &Comment, depth: usize) -> Result<()> {
    let indent = "  ".repeat(depth);
    writeln!(
        out,
        "{indent}- **{}** ({}, {}): {}",
        comment.author_name,
        comment.comment_type,
        comment.date.format("%H:%M"),
        comment.simulated_content
    )?;
    for reply in post
        .comments
        .iter()
        .filter(|c| c.parent_id == Some(comment.id))
    {
        write_comment(out, post, reply, depth + 1)?;
    }
    Ok(())
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

pub fn analysis_text(label: &str, report: &AnalysisReport) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "{label}: score {}/10", report.score)?;
    if report.warnings.is_empty() {
        writeln!(out, "  no warnings")?;
    }
    for warning in &report.warnings {
        writeln!(out, "  ⚠ {warning}")?;
    }
    let metrics = &report.metrics;
    for (name, counts) in [
        ("posts per subreddit", &metrics.posts_per_subreddit),
        ("posts per persona", &metrics.posts_per_persona),
        ("topic usage", &metrics.topic_usage),
    ] {
        let joined = counts
            .iter()
            .map(|(key, count)| format!("{key}={count}"))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(out, "  {name}: {joined}")?;
    }
    Ok(out)
}

pub fn quality_text(label: &str, report: &QualityReport) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "{label}: quality {}/10", report.score)?;
    for issue in &report.issues {
        writeln!(out, "  ⚠ {issue}")?;
    }
    writeln!(
        out,
        "  diversity {:.2} · interaction {} · structure {}",
        report.metrics.diversity_score,
        report.metrics.interaction_score,
        report.metrics.structure_score
    )?;
    Ok(out)
}
