//! Template catalogs and `{name}` placeholder substitution.
//!
//! Recognised placeholders are `{topic}`, `{subreddit}` and `{companyName}`.
//! Anything else in braces is left verbatim.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex"));

pub const TOPIC: &str = "topic";
pub const SUBREDDIT: &str = "subreddit";
pub const COMPANY_NAME: &str = "companyName";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTemplates {
    pub titles: Vec<String>,
    pub bodies: BodyTemplates,
    pub comments: CommentTemplates,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyTemplates {
    pub intros: Vec<String>,
    pub middles: Vec<String>,
    pub outros: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentTemplates {
    pub agreements: Vec<String>,
    /// Kept for config compatibility; no comment type selects this pool.
    #[serde(default)]
    pub disagreements: Vec<String>,
    pub plugs: Vec<String>,
    pub generic: Vec<String>,
}

impl ContentTemplates {
    /// Names of the pools that are empty, as dotted paths.
    pub fn empty_pools(&self) -> Vec<&'static str> {
        let pools: [(&'static str, &Vec<String>); 7] = [
            ("titles", &self.titles),
            ("bodies.intros", &self.bodies.intros),
            ("bodies.middles", &self.bodies.middles),
            ("bodies.outros", &self.bodies.outros),
            ("comments.agreements", &self.comments.agreements),
            ("comments.plugs", &self.comments.plugs),
            ("comments.generic", &self.comments.generic),
        ];
        pools
            .into_iter()
            .filter(|(_, pool)| pool.is_empty())
            .map(|(name, _)| name)
            .collect()
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ContentTemplates {
    fn default() -> Self {
        Self {
            titles: owned(&[
                "Thoughts on {topic}?",
                "Question about {topic}",
                "Anyone have experience with {topic}?",
                "{topic} - need advice",
                "Let's discuss {topic}",
                "Best approach for {topic}?",
                "Struggling with {topic}",
                "Tips for {topic}?",
                "How do you handle {topic}?",
                "Resources for {topic}?",
                "Discussion: {topic}",
                "Help with {topic}",
                "Opinions on {topic}",
                "Guide to {topic}?",
                "{topic} in 2025",
            ]),
            bodies: BodyTemplates {
                intros: owned(&[
                    "I've been lurking in r/{subreddit} for a while and wanted to ask...",
                    "My boss just asked me to look into {topic} and I'm a bit lost.",
                    "I saw a tweet about {topic} and it got me thinking.",
                    "I've been using a few different tools for this but nothing sticks.",
                    "Just wanted to get a sanity check from you guys.",
                    "Long time lurker, first time poster here.",
                    "I'm trying to optimize my workflow around {topic}.",
                    "Does anyone have experience with this in a production environment?",
                ]),
                middles: owned(&[
                    "I've heard good things about {companyName} but haven't tried it.",
                    "Does anyone have a workflow that actually works?",
                    "I feel like I'm wasting so much time on this.",
                    "Is there a standard way to handle this in 2025?",
                    "I've tried a bunch of solutions but they all fall short.",
                    "It seems like everyone does this differently.",
                    "I'm hitting a wall and could use some pointers.",
                ]),
                outros: owned(&[
                    "Thanks in advance!",
                    "Appreciate any help.",
                    "Let me know what you think.",
                    "Cheers.",
                    "Any advice is welcome.",
                    "Thanks for reading!",
                    "Looking forward to your thoughts.",
                ]),
            },
            comments: CommentTemplates {
                agreements: owned(&[
                    "Totally agree.",
                    "This is exactly what I was thinking.",
                    "100%.",
                    "Great point.",
                    "I've had the same experience.",
                    "Spot on.",
                    "Couldn't have said it better myself.",
                    "This.",
                ]),
                disagreements: owned(&["I see it differently.", "Not sure I agree."]),
                plugs: owned(&[
                    "Have you checked {companyName}? It might help.",
                    "I use {companyName} for this and it works great.",
                    "{companyName} is pretty solid for this use case.",
                    "Give {companyName} a look.",
                    "I'd recommend taking a look at {companyName}.",
                    "We switched to {companyName} and it solved this.",
                ]),
                generic: owned(&[
                    "Following.",
                    "I'm curious about this too.",
                    "Great question.",
                    "I've been wondering the same thing.",
                    "Any updates on this?",
                    "Hope someone has an answer.",
                    "Bump.",
                ]),
            },
        }
    }
}

/// Replace every `{key}` with its value from `replacements`.
pub fn fill_placeholders(template: &str, replacements: &[(&str, &str)]) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            replacements
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Uniform pick from a pool, `None` when the pool is empty.
pub fn pick<'a, R: Rng + ?Sized>(pool: &'a [String], rng: &mut R) -> Option<&'a str> {
    pool.choose(rng).map(String::as_str)
}
