//! Post and comment-tree skeletons: who posts, who replies to whom, what
//! kind of comment it is, and the prompts describing the text to write.
//!
//! Nothing here produces final text; `provider` fills that in.

use chrono::{Duration, NaiveDateTime};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{PlanError, Result};
use crate::model::{Brand, CommentType, Persona, Subreddit, Topic};

pub const MAX_COMMENTS: usize = 3;
pub const TOP_LEVEL_PROBABILITY: f64 = 0.7;
pub const PLUG_PROBABILITY: f64 = 0.3;
pub const AGREE_WITH_PLUG_PROBABILITY: f64 = 0.9;
pub const AGREE_PROBABILITY: f64 = 0.65;
/// Minutes between consecutive comments, `[min, max)`.
pub const REPLY_DELAY_MINUTES: (i64, i64) = (10, 130);

#[derive(Debug, Clone, PartialEq)]
pub struct CommentDraft {
    pub id: Uuid,
    pub persona_id: String,
    pub author_name: String,
    pub content_prompt: String,
    pub parent_id: Option<Uuid>,
    pub date: NaiveDateTime,
    pub comment_type: CommentType,
    /// Generated text, filled in by the content provider
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostDraft {
    pub id: Uuid,
    pub subreddit: String,
    pub op_persona_id: String,
    pub author_name: String,
    pub topic_id: String,
    pub topic_query: String,
    pub title_prompt: String,
    pub body_prompt: String,
    pub date: NaiveDateTime,
    pub comments: Vec<CommentDraft>,
    pub title: Option<String>,
    pub body: Option<String>,
}

/// Uuid built from the caller's RNG so seeded runs replay exactly.
pub fn random_id<R: Rng + ?Sized>(rng: &mut R) -> Uuid {
    uuid::Builder::from_random_bytes(rng.gen()).into_uuid()
}

pub struct ThreadSynthesizer<'a> {
    brand: &'a Brand,
    personas: &'a [Persona],
}

impl<'a> ThreadSynthesizer<'a> {
    pub fn new(brand: &'a Brand, personas: &'a [Persona]) -> Result<Self> {
        if personas.is_empty() {
            return Err(PlanError::config("at least one persona is required"));
        }
        Ok(Self { brand, personas })
    }

    pub fn draft_post<R: Rng + ?Sized>(
        &self,
        date: NaiveDateTime,
        subreddit: &Subreddit,
        topic: &Topic,
        rng: &mut R,
    ) -> PostDraft {
        let op = self
            .personas
            .choose(rng)
            .unwrap_or(&self.personas[0]);

        let id = random_id(rng);
        let comments = self.draft_comments(op, topic, date, rng);
        debug!(post = %id, op = %op.id, comments = comments.len(), "drafted post");

        PostDraft {
            id,
            subreddit: subreddit.name.clone(),
            op_persona_id: op.id.clone(),
            author_name: op.name.clone(),
            topic_id: topic.id.clone(),
            topic_query: topic.query.clone(),
            title_prompt: title_prompt(op, subreddit, topic, self.brand),
            body_prompt: body_prompt(op, subreddit, topic, self.brand),
            date,
            comments,
            title: None,
            body: None,
        }
    }

    fn draft_comments<R: Rng + ?Sized>(
        &self,
        op: &Persona,
        topic: &Topic,
        post_date: NaiveDateTime,
        rng: &mut R,
    ) -> Vec<CommentDraft> {
        let count = rng.gen_range(1..=MAX_COMMENTS);
        let mut comments: Vec<CommentDraft> = Vec::with_capacity(count);
        let mut last_date = post_date;
        let mut has_plug = false;

        for slot in 0..count {
            let parent = if comments.is_empty() || rng.gen_bool(TOP_LEVEL_PROBABILITY) {
                None
            } else {
                comments.choose(rng)
            };
            let (parent_id, parent_author, parent_type) = match parent {
                Some(p) => (Some(p.id), p.persona_id.as_str(), Some(p.comment_type)),
                None => (None, op.id.as_str(), None),
            };

            let candidates: Vec<&Persona> = self
                .personas
                .iter()
                .filter(|p| p.id != parent_author)
                .collect();
            let Some(commenter) = candidates.choose(rng).copied() else {
                warn!(parent = %parent_author, "no persona other than the parent author; skipping comment");
                continue;
            };

            let is_last = slot + 1 == count;
            let comment_type = classify_comment(has_plug, is_last, parent_type, rng);
            has_plug |= comment_type == CommentType::Plug;

            let delay = rng.gen_range(REPLY_DELAY_MINUTES.0..REPLY_DELAY_MINUTES.1);
            let date = last_date + Duration::minutes(delay);
            last_date = date;

            comments.push(CommentDraft {
                id: random_id(rng),
                persona_id: commenter.id.clone(),
                author_name: commenter.name.clone(),
                content_prompt: comment_prompt(
                    commenter,
                    topic,
                    self.brand,
                    parent_id.is_some(),
                    comment_type,
                ),
                parent_id,
                date,
                comment_type,
                content: None,
            });
        }

        comments
    }
}

/// Pick a comment's type.
///
/// The last slot of a post without a plug is always a plug; otherwise a plug
/// with `PLUG_PROBABILITY`, else agreement or curiosity depending on what is
/// being replied to.
pub fn classify_comment<R: Rng + ?Sized>(
    has_plug: bool,
    is_last: bool,
    parent_type: Option<CommentType>,
    rng: &mut R,
) -> CommentType {
    if (!has_plug && is_last) || rng.gen_bool(PLUG_PROBABILITY) {
        return CommentType::Plug;
    }
    let agree = match parent_type {
        Some(CommentType::Plug) => AGREE_WITH_PLUG_PROBABILITY,
        _ => AGREE_PROBABILITY,
    };
    if rng.gen_bool(agree) {
        CommentType::Agreement
    } else {
        CommentType::Curiosity
    }
}

fn title_prompt(op: &Persona, subreddit: &Subreddit, topic: &Topic, brand: &Brand) -> String {
    format!(
        "Role: {style} ({tone})\n\
         Task: Write a Reddit post title for r/{sub}.\n\
         Topic: {query}\n\
         Goal: Spark discussion about a problem that {brand} solves.\n\
         Constraint: Do NOT sound like an ad. Use lowercase if it fits the persona. \
         Make it clickbaity but authentic. Include a typo if the persona is casual.",
        style = op.style,
        tone = op.tone,
        sub = subreddit.name,
        query = topic.query,
        brand = brand.name,
    )
}

fn body_prompt(op: &Persona, subreddit: &Subreddit, topic: &Topic, brand: &Brand) -> String {
    format!(
        "Role: {style} ({tone})\n\
         Task: Write the body of the Reddit post.\n\
         Community: r/{sub} - {sub_description}\n\
         Context: {description}\n\
         Topic: {query}\n\
         Instructions:\n\
         1. Start with a personal hook or observation related to the topic.\n\
         2. Describe a specific struggle or need.\n\
         3. Mention {brand} as a potential solution you are considering, or ask if anyone has \
         experience with it. Alternatively, describe the problem so well that {brand} is the \
         obvious answer in the comments.\n\
         4. Keep it under 200 words.\n\
         5. Use slang or abbreviations appropriate for r/{sub}.\n\
         6. IMPORTANT: Sound like a confused or curious user, NOT a brand representative.",
        style = op.style,
        tone = op.tone,
        sub = subreddit.name,
        sub_description = subreddit.description,
        description = brand.description,
        query = topic.query,
        brand = brand.name,
    )
}

fn comment_prompt(
    commenter: &Persona,
    topic: &Topic,
    brand: &Brand,
    replies_to_comment: bool,
    comment_type: CommentType,
) -> String {
    let parent_context = if replies_to_comment {
        "the previous comment"
    } else {
        "the original post"
    };
    let instruction = match comment_type {
        CommentType::Plug => format!(
            "Mention {} as a good solution. Share a brief positive experience or feature. \
             Keep it subtle, like a user recommendation.",
            brand.name
        ),
        CommentType::Agreement => "Agree with the parent comment/post. Validate their point \
                                   or share a similar experience."
            .to_string(),
        CommentType::Curiosity | CommentType::Generic => "Ask a relevant follow-up question \
                                                          to the parent comment/post to keep \
                                                          the discussion going."
            .to_string(),
    };
    format!(
        "Role: {style} ({tone})\n\
         Task: Write a comment replying to {parent_context}.\n\
         Topic: {query}\n\
         Context: The thread is about {query} and potentially {brand}.\n\
         Instruction: {instruction}\n\
         Constraint: Keep it short (1-2 sentences). Be conversational. Don't be too formal. \
         No hashtags.",
        style = commenter.style,
        tone = commenter.tone,
        query = topic.query,
        brand = brand.name,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn brand() -> Brand {
        Brand {
            name: "TestCo".into(),
            description: "A testing company".into(),
            goals: "Test the algorithm".into(),
        }
    }

    fn personas(n: usize) -> Vec<Persona> {
        (1..=n)
            .map(|i| Persona {
                id: format!("p{i}"),
                name: format!("Persona {i}"),
                style: "Expert".into(),
                tone: "Professional".into(),
            })
            .collect()
    }

    fn subreddit() -> Subreddit {
        Subreddit {
            name: "testsub1".into(),
            description: "Testing 1".into(),
        }
    }

    fn topic() -> Topic {
        Topic {
            id: "t1".into(),
            query: "Topic 1".into(),
        }
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 26)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn resolved_parent<'a>(post: &'a PostDraft, comment: &CommentDraft) -> &'a str {
        match comment.parent_id {
            None => &post.op_persona_id,
            Some(id) => {
                &post
                    .comments
                    .iter()
                    .find(|c| c.id == id)
                    .expect("parent exists in same post")
                    .persona_id
            }
        }
    }

    #[test]
    fn rejects_empty_persona_list() {
        let brand = brand();
        assert!(ThreadSynthesizer::new(&brand, &[]).is_err());
    }

    #[test]
    fn two_personas_never_self_reply() {
        let brand = brand();
        let personas = personas(2);
        let synth = ThreadSynthesizer::new(&brand, &personas).unwrap();
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let post = synth.draft_post(noon(), &subreddit(), &topic(), &mut rng);
            for comment in &post.comments {
                assert_ne!(comment.persona_id, resolved_parent(&post, comment));
            }
        }
    }

    #[test]
    fn every_post_has_a_plug() {
        let brand = brand();
        let personas = personas(4);
        let synth = ThreadSynthesizer::new(&brand, &personas).unwrap();
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let post = synth.draft_post(noon(), &subreddit(), &topic(), &mut rng);
            assert!((1..=MAX_COMMENTS).contains(&post.comments.len()));
            assert!(post
                .comments
                .iter()
                .any(|c| c.comment_type == CommentType::Plug));
        }
    }

    #[test]
    fn comments_are_chronological_and_first_is_top_level() {
        let brand = brand();
        let personas = personas(3);
        let synth = ThreadSynthesizer::new(&brand, &personas).unwrap();
        for seed in 0..100 {
            let mut rng = StdRng::seed_from_u64(seed);
            let post = synth.draft_post(noon(), &subreddit(), &topic(), &mut rng);
            assert_eq!(post.comments[0].parent_id, None);

            let mut previous = post.date;
            for comment in &post.comments {
                let gap = (comment.date - previous).num_minutes();
                assert!((10..130).contains(&gap), "gap {gap} out of range");
                previous = comment.date;
            }
        }
    }

    #[test]
    fn parents_precede_their_replies() {
        let brand = brand();
        let personas = personas(4);
        let synth = ThreadSynthesizer::new(&brand, &personas).unwrap();
        for seed in 0..100 {
            let mut rng = StdRng::seed_from_u64(seed);
            let post = synth.draft_post(noon(), &subreddit(), &topic(), &mut rng);
            for (idx, comment) in post.comments.iter().enumerate() {
                if let Some(parent_id) = comment.parent_id {
                    let parent_idx = post.comments.iter().position(|c| c.id == parent_id);
                    assert!(matches!(parent_idx, Some(p) if p < idx));
                }
            }
        }
    }

    #[test]
    fn single_persona_skips_comments_instead_of_self_replying() {
        let brand = brand();
        let personas = personas(1);
        let synth = ThreadSynthesizer::new(&brand, &personas).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let post = synth.draft_post(noon(), &subreddit(), &topic(), &mut rng);
        assert!(post.comments.is_empty());
    }

    #[test]
    fn last_slot_without_plug_is_forced() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            assert_eq!(
                classify_comment(false, true, Some(CommentType::Agreement), &mut rng),
                CommentType::Plug
            );
        }
    }

    #[test]
    fn classification_never_yields_generic() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let kind = classify_comment(true, false, Some(CommentType::Plug), &mut rng);
            assert_ne!(kind, CommentType::Generic);
        }
    }

    #[test]
    fn prompts_reference_persona_topic_subreddit_and_brand() {
        let brand = brand();
        let personas = personas(2);
        let synth = ThreadSynthesizer::new(&brand, &personas).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let post = synth.draft_post(noon(), &subreddit(), &topic(), &mut rng);

        assert!(post.title_prompt.contains("Expert (Professional)"));
        assert!(post.title_prompt.contains("r/testsub1"));
        assert!(post.title_prompt.contains("Topic 1"));
        assert!(post.title_prompt.contains("TestCo"));
        assert!(post.body_prompt.contains("Testing 1"));
        assert!(post.body_prompt.contains("A testing company"));

        let plug = post
            .comments
            .iter()
            .find(|c| c.comment_type == CommentType::Plug)
            .unwrap();
        assert!(plug.content_prompt.contains("Mention TestCo as a good solution"));
    }
}
