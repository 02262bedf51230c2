//! Post-hoc quality scoring of a finished calendar.
//!
//! Both scorers are pure: they read the calendar and never touch it.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::model::{Calendar, Comment, CommentType, Post};

pub const MAX_SCORE: i32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisMetrics {
    pub posts_per_subreddit: BTreeMap<String, usize>,
    /// Keyed by OP display name
    pub posts_per_persona: BTreeMap<String, usize>,
    pub topic_usage: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub score: u8,
    pub warnings: Vec<String>,
    pub metrics: AnalysisMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub diversity_score: f64,
    pub interaction_score: i64,
    pub structure_score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub score: u8,
    pub issues: Vec<String>,
    pub metrics: QualityMetrics,
}

fn clamp_score(score: i32) -> u8 {
    score.clamp(0, MAX_SCORE) as u8
}

fn tally<'a>(keys: impl Iterator<Item = &'a str>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for key in keys {
        *counts.entry(key.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Comments whose author is also the author of what they reply to.
fn self_replies(post: &Post) -> impl Iterator<Item = &Comment> {
    post.comments
        .iter()
        .filter(move |c| post.parent_author(c) == Some(c.persona_id.as_str()))
}

/// Score a calendar out of 10 for diversity, dominance, repetition,
/// self-reply artifacts, overposting and duplicate text.
pub fn analyze_calendar(calendar: &Calendar) -> AnalysisReport {
    let posts = &calendar.posts;
    let total = posts.len();
    if total == 0 {
        return AnalysisReport {
            score: 0,
            warnings: vec!["No posts generated.".to_string()],
            metrics: AnalysisMetrics::default(),
        };
    }

    let mut score = MAX_SCORE;
    let mut warnings = Vec::new();

    let posts_per_subreddit = tally(posts.iter().map(|p| p.subreddit.as_str()));
    for (sub, &count) in &posts_per_subreddit {
        if count > 2 && count * 2 > total {
            score -= 1;
            warnings.push(format!(
                "High frequency in r/{sub} ({count} posts). Consider diversifying subreddits."
            ));
        }
    }

    let posts_per_persona = tally(posts.iter().map(|p| p.author_name.as_str()));
    for (name, &count) in &posts_per_persona {
        if count as f64 > total as f64 * 0.6 {
            score -= 1;
            warnings.push(format!(
                "Persona \"{name}\" is dominating the conversation ({count} posts)."
            ));
        }
    }

    let topic_usage = tally(posts.iter().map(|p| p.topic_id.as_str()));
    for (topic, &count) in &topic_usage {
        if count > 2 {
            score -= 1;
            warnings.push(format!("Topic ID \"{topic}\" is repeated {count} times."));
        }
    }

    let self_reply_count: usize = posts.iter().map(|p| self_replies(p).count()).sum();
    if self_reply_count > 0 {
        score -= 2;
        warnings.push(format!(
            "Detected {self_reply_count} instances of personas replying to themselves. This looks unnatural."
        ));
    }

    let mut posts_per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for post in posts {
        *posts_per_day.entry(post.date.date()).or_insert(0) += 1;
    }
    for (day, &count) in &posts_per_day {
        if count > 3 {
            score -= 1;
            warnings.push(format!(
                "High volume on {} ({count} posts). Risk of looking spammy.",
                day.format("%a %b %d %Y")
            ));
        }
    }

    let duplicates = duplicate_count(calendar);
    if duplicates > 0 {
        score -= 2;
        warnings.push(format!(
            "Detected {duplicates} duplicate posts/comments. Content should be unique."
        ));
    }

    AnalysisReport {
        score: clamp_score(score),
        warnings,
        metrics: AnalysisMetrics {
            posts_per_subreddit,
            posts_per_persona,
            topic_usage,
        },
    }
}

/// Repeat occurrences of identical non-empty text; first sightings are free.
pub fn duplicate_count(calendar: &Calendar) -> usize {
    let mut seen: HashSet<&str> = HashSet::new();
    let texts = calendar.posts.iter().flat_map(|post| {
        [post.simulated_title.as_str(), post.simulated_body.as_str()]
            .into_iter()
            .chain(post.comments.iter().map(|c| c.simulated_content.as_str()))
    });
    texts
        .filter(|text| !text.is_empty())
        .filter(|text| !seen.insert(*text))
        .count()
}

/// Stricter evaluation against the configuration that produced the calendar.
pub fn evaluate_quality(calendar: &Calendar, config: &GenerationConfig) -> QualityReport {
    let mut score = MAX_SCORE;
    let mut issues = Vec::new();

    let mut self_reply_count = 0i64;
    for post in &calendar.posts {
        for comment in self_replies(post) {
            self_reply_count += 1;
            issues.push(format!(
                "Self-reply detected in post {} by {}",
                post.id, comment.author_name
            ));
        }
    }
    if self_reply_count > 0 {
        score -= 5;
    }

    let used_subreddits: HashSet<&str> =
        calendar.posts.iter().map(|p| p.subreddit.as_str()).collect();
    let used_topics: HashSet<&str> = calendar.posts.iter().map(|p| p.topic_id.as_str()).collect();
    let posts_per_week = config.posts_per_week as usize;
    let subreddit_diversity = ratio(used_subreddits.len(), posts_per_week.min(config.subreddits.len()));
    let topic_diversity = ratio(used_topics.len(), posts_per_week.min(config.topics.len()));
    if subreddit_diversity < 0.5 {
        score -= 1;
        issues.push("Low subreddit diversity".to_string());
    }
    if topic_diversity < 0.5 {
        score -= 1;
        issues.push("Low topic diversity".to_string());
    }

    let mut ping_pong = 0i64;
    for post in &calendar.posts {
        let participants: HashSet<&str> = std::iter::once(post.op_persona_id.as_str())
            .chain(post.comments.iter().map(|c| c.persona_id.as_str()))
            .collect();
        if post.comments.len() > 3 && participants.len() <= 2 {
            ping_pong += 1;
            issues.push(format!("Potential ping-pong conversation in post {}", post.id));
        }
    }
    if ping_pong > 0 {
        score -= 1;
    }

    let brand = config.brand.name.as_str();
    let mut missing_plug = 0i64;
    for post in &calendar.posts {
        let promoted = post.comments.iter().any(|c| {
            c.comment_type == CommentType::Plug
                || (!brand.is_empty() && c.simulated_content.contains(brand))
        });
        if !promoted {
            missing_plug += 1;
            issues.push(format!("Post {} missing business promotion", post.id));
        }
    }
    if missing_plug > 0 {
        score -= 2;
    }

    let mut awkward = 0i64;
    for post in &calendar.posts {
        for comment in &post.comments {
            if comment.comment_type != CommentType::Agreement {
                continue;
            }
            let parent_agrees = comment
                .parent_id
                .and_then(|id| post.comment(id))
                .is_some_and(|parent| parent.comment_type == CommentType::Agreement);
            if parent_agrees {
                awkward += 1;
                issues.push(format!("Awkward agreement chain in post {}", post.id));
            }
        }
    }
    if awkward > 0 {
        score -= 1;
    }

    QualityReport {
        score: clamp_score(score),
        issues,
        metrics: QualityMetrics {
            diversity_score: (subreddit_diversity + topic_diversity) / 2.0,
            interaction_score: 10 - (self_reply_count + ping_pong),
            structure_score: 10 - (missing_plug + awkward),
        },
    }
}

/// `used / available`, treating nothing-available as fully diverse.
fn ratio(used: usize, available: usize) -> f64 {
    if available == 0 {
        return 1.0;
    }
    used as f64 / available as f64
}
