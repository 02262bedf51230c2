//! Content filling for drafted posts.
//!
//! Two strategies: local template filling, and batched requests to an
//! external [`TextGenerator`]. The external path works chunk by chunk; any
//! item a chunk leaves without text is filled from templates before the
//! next chunk starts, so one failed request never costs the whole calendar.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ProviderError;
use crate::model::CommentType;
use crate::templates::{fill_placeholders, pick, ContentTemplates, COMPANY_NAME, SUBREDDIT, TOPIC};
use crate::thread::PostDraft;

/// Times a colliding generator is re-run before the duplicate is accepted.
pub const MAX_UNIQUE_RETRIES: usize = 10;

const BATCH_SYSTEM_PROMPT: &str = r#"You are a Reddit content generator.
Process the provided JSON input which contains a list of posts and their comments.
For each post and comment, generate the text content based on the provided 'prompt'.
Return a JSON object with the following structure:
{
  "posts": [
    {
      "id": "...",
      "title": "...",
      "body": "...",
      "comments": [
        { "id": "...", "content": "..." },
        ...
      ]
    },
    ...
  ]
}
Ensure the IDs match exactly."#;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask the provider for a JSON object response
    pub structured_output: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 150,
            temperature: 0.7,
            structured_output: false,
        }
    }
}

impl GenerationOptions {
    pub fn batch() -> Self {
        Self {
            max_tokens: 2500,
            structured_output: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub options: GenerationOptions,
}

/// Turns a prompt into text. Implemented by external providers.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError>;
}

/// Sequential chunking with a fixed pause between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPacing {
    pub chunk_size: usize,
    pub delay: Duration,
}

impl Default for ChunkPacing {
    fn default() -> Self {
        Self {
            chunk_size: 3,
            delay: Duration::from_millis(1500),
        }
    }
}

/// Every text accepted during one calendar generation.
#[derive(Debug, Default, Clone)]
pub struct UsedContent {
    seen: HashSet<String>,
}

impl UsedContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.seen.contains(text)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Record `text` if unseen. Returns false for a duplicate.
    pub fn try_accept(&mut self, text: &str) -> bool {
        if self.seen.contains(text) {
            return false;
        }
        self.seen.insert(text.to_owned());
        true
    }

    /// Run `generate` until it yields unseen text or the retries run out,
    /// in which case the last (duplicate) value is accepted anyway.
    pub fn unique_with<F>(&mut self, mut generate: F) -> Option<String>
    where
        F: FnMut() -> Option<String>,
    {
        let mut text = generate()?;
        let mut attempts = 0;
        while self.seen.contains(&text) && attempts < MAX_UNIQUE_RETRIES {
            text = generate()?;
            attempts += 1;
        }
        if self.seen.contains(&text) {
            debug!(attempts, "uniqueness retries exhausted; accepting duplicate");
        }
        self.seen.insert(text.clone());
        Some(text)
    }
}

/// Local template strategy.
#[derive(Debug, Clone, Copy)]
pub struct TemplateFiller<'a> {
    templates: &'a ContentTemplates,
    company_name: &'a str,
}

impl<'a> TemplateFiller<'a> {
    pub fn new(templates: &'a ContentTemplates, company_name: &'a str) -> Self {
        Self {
            templates,
            company_name,
        }
    }

    pub fn title<R: Rng + ?Sized>(&self, topic: &str, rng: &mut R) -> Option<String> {
        let template = pick(&self.templates.titles, rng)?;
        Some(fill_placeholders(template, &[(TOPIC, topic)]))
    }

    /// Intro, middle and outro joined by single spaces.
    pub fn body<R: Rng + ?Sized>(&self, topic: &str, subreddit: &str, rng: &mut R) -> Option<String> {
        let bodies = &self.templates.bodies;
        let intro = pick(&bodies.intros, rng)?;
        let middle = pick(&bodies.middles, rng)?;
        let outro = pick(&bodies.outros, rng)?;
        let replacements = [
            (TOPIC, topic),
            (SUBREDDIT, subreddit),
            (COMPANY_NAME, self.company_name),
        ];
        Some(
            [intro, middle, outro]
                .iter()
                .map(|part| fill_placeholders(part, &replacements))
                .collect::<Vec<_>>()
                .join(" "),
        )
    }

    pub fn comment<R: Rng + ?Sized>(&self, kind: CommentType, rng: &mut R) -> Option<String> {
        let comments = &self.templates.comments;
        let pool = match kind {
            CommentType::Plug => &comments.plugs,
            CommentType::Agreement => &comments.agreements,
            CommentType::Curiosity | CommentType::Generic => &comments.generic,
        };
        let template = pick(pool, rng)?;
        Some(fill_placeholders(template, &[(COMPANY_NAME, self.company_name)]))
    }

    /// Fill every field of `draft` that has no text yet.
    ///
    /// Returns how many fields were filled.
    pub fn fill_missing<R: Rng + ?Sized>(
        &self,
        draft: &mut PostDraft,
        used: &mut UsedContent,
        rng: &mut R,
    ) -> usize {
        let mut filled = 0;
        if draft.title.is_none() {
            draft.title = used.unique_with(|| self.title(&draft.topic_query, rng));
            filled += usize::from(draft.title.is_some());
        }
        if draft.body.is_none() {
            draft.body = used.unique_with(|| self.body(&draft.topic_query, &draft.subreddit, rng));
            filled += usize::from(draft.body.is_some());
        }
        for comment in draft.comments.iter_mut() {
            if comment.content.is_none() {
                let kind = comment.comment_type;
                comment.content = used.unique_with(|| self.comment(kind, rng));
                filled += usize::from(comment.content.is_some());
            }
        }
        filled
    }
}

/// How the text of one calendar was produced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FillStats {
    pub external: usize,
    pub templated: usize,
    pub failed_chunks: usize,
}

#[derive(Serialize)]
struct BatchInput<'a> {
    posts: Vec<BatchPostInput<'a>>,
}

#[derive(Serialize)]
struct BatchPostInput<'a> {
    id: Uuid,
    title_prompt: &'a str,
    body_prompt: &'a str,
    comments: Vec<BatchCommentInput<'a>>,
}

#[derive(Serialize)]
struct BatchCommentInput<'a> {
    id: Uuid,
    prompt: &'a str,
}

/// Validated shape of a batch response.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BatchOutput {
    pub posts: Vec<GeneratedPost>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GeneratedPost {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub comments: Vec<GeneratedComment>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GeneratedComment {
    pub id: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// The single prompt sent for one chunk of drafts.
pub fn batch_prompt(chunk: &[PostDraft]) -> Result<String, ProviderError> {
    let input = BatchInput {
        posts: chunk
            .iter()
            .map(|post| BatchPostInput {
                id: post.id,
                title_prompt: &post.title_prompt,
                body_prompt: &post.body_prompt,
                comments: post
                    .comments
                    .iter()
                    .map(|c| BatchCommentInput {
                        id: c.id,
                        prompt: &c.content_prompt,
                    })
                    .collect(),
            })
            .collect(),
    };
    let json = serde_json::to_string(&input)
        .map_err(|err| ProviderError::malformed(format!("failed to encode batch: {err}")))?;
    Ok(format!("{BATCH_SYSTEM_PROMPT}\n\nInput Data:\n{json}"))
}

/// Parse a batch response, tolerating a surrounding markdown code fence.
pub fn parse_batch_response(raw: &str) -> Result<BatchOutput, ProviderError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim()).map_err(|err| ProviderError::malformed(err.to_string()))
}

/// Copy generated text onto matching drafts. Blank or already-used text is
/// ignored and left for template fallback. Returns the number of fields set.
pub fn apply_batch(chunk: &mut [PostDraft], output: BatchOutput, used: &mut UsedContent) -> usize {
    let mut applied = 0;
    for generated in output.posts {
        let Some(draft) = chunk.iter_mut().find(|d| d.id.to_string() == generated.id) else {
            debug!(id = %generated.id, "ignoring generated post with unknown id");
            continue;
        };
        if let Some(title) = accept(generated.title, used) {
            draft.title = Some(title);
            applied += 1;
        }
        if let Some(body) = accept(generated.body, used) {
            draft.body = Some(body);
            applied += 1;
        }
        for generated_comment in generated.comments {
            let Some(comment) = draft
                .comments
                .iter_mut()
                .find(|c| c.id.to_string() == generated_comment.id)
            else {
                continue;
            };
            if let Some(content) = accept(generated_comment.content, used) {
                comment.content = Some(content);
                applied += 1;
            }
        }
    }
    applied
}

fn accept(text: Option<String>, used: &mut UsedContent) -> Option<String> {
    let text = text?.trim().to_string();
    if text.is_empty() || !used.try_accept(&text) {
        return None;
    }
    Some(text)
}

/// Picks and runs a strategy over a set of drafts.
pub struct ContentProvider<'a> {
    filler: TemplateFiller<'a>,
    generator: Option<Arc<dyn TextGenerator>>,
    pacing: ChunkPacing,
}

impl<'a> ContentProvider<'a> {
    pub fn templates_only(filler: TemplateFiller<'a>) -> Self {
        Self {
            filler,
            generator: None,
            pacing: ChunkPacing::default(),
        }
    }

    pub fn external(
        filler: TemplateFiller<'a>,
        generator: Arc<dyn TextGenerator>,
        pacing: ChunkPacing,
    ) -> Self {
        Self {
            filler,
            generator: Some(generator),
            pacing,
        }
    }

    pub fn fill_from_templates<R: Rng + ?Sized>(
        &self,
        drafts: &mut [PostDraft],
        used: &mut UsedContent,
        rng: &mut R,
    ) -> FillStats {
        let templated = drafts
            .iter_mut()
            .map(|draft| self.filler.fill_missing(draft, used, rng))
            .sum();
        FillStats {
            templated,
            ..FillStats::default()
        }
    }

    /// Fill all drafts, through the external generator when one is set.
    pub async fn fill<R: Rng + Send + ?Sized>(
        &self,
        drafts: &mut [PostDraft],
        used: &mut UsedContent,
        rng: &mut R,
    ) -> FillStats {
        let Some(generator) = self.generator.as_deref() else {
            return self.fill_from_templates(drafts, used, rng);
        };

        let mut stats = FillStats::default();
        let chunk_size = self.pacing.chunk_size.max(1);
        let chunk_count = drafts.len().div_ceil(chunk_size);

        for (index, chunk) in drafts.chunks_mut(chunk_size).enumerate() {
            match generate_chunk(generator, chunk).await {
                Ok(output) => {
                    let applied = apply_batch(chunk, output, used);
                    debug!(chunk = index, applied, "applied generated chunk");
                    stats.external += applied;
                }
                Err(err) => {
                    warn!(chunk = index, error = %err, "batch generation failed; using templates for this chunk");
                    stats.failed_chunks += 1;
                }
            }

            for draft in chunk.iter_mut() {
                stats.templated += self.filler.fill_missing(draft, used, rng);
            }

            if index + 1 < chunk_count && !self.pacing.delay.is_zero() {
                tokio::time::sleep(self.pacing.delay).await;
            }
        }

        stats
    }
}

async fn generate_chunk(
    generator: &dyn TextGenerator,
    chunk: &[PostDraft],
) -> Result<BatchOutput, ProviderError> {
    let request = GenerationRequest {
        prompt: batch_prompt(chunk)?,
        options: GenerationOptions::batch(),
    };
    let raw = generator.generate(&request).await?;
    parse_batch_response(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Brand, Persona, Subreddit, Topic};
    use crate::thread::ThreadSynthesizer;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Mutex;

    fn drafts(count: usize, seed: u64) -> Vec<PostDraft> {
        let brand = Brand {
            name: "TestCo".into(),
            description: "A testing company".into(),
            goals: String::new(),
        };
        let personas: Vec<Persona> = (1..=3)
            .map(|i| Persona {
                id: format!("p{i}"),
                name: format!("P{i}"),
                style: "Fan".into(),
                tone: "Excited".into(),
            })
            .collect();
        let sub = Subreddit {
            name: "testsub1".into(),
            description: "Testing".into(),
        };
        let topic = Topic {
            id: "t1".into(),
            query: "Topic 1".into(),
        };
        let synth = ThreadSynthesizer::new(&brand, &personas).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let date = NaiveDate::from_ymd_opt(2026, 10, 26)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        (0..count)
            .map(|_| synth.draft_post(date, &sub, &topic, &mut rng))
            .collect()
    }

    fn fully_filled(draft: &PostDraft) -> bool {
        draft.title.is_some()
            && draft.body.is_some()
            && draft.comments.iter().all(|c| c.content.is_some())
    }

    /// Answers each chunk from a script; `None` entries fail the request.
    struct ScriptedGenerator {
        replies: Mutex<Vec<Option<String>>>,
        prompts: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<Option<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(request.clone());
            match self.replies.lock().unwrap().pop() {
                Some(Some(reply)) => Ok(reply),
                _ => Err(ProviderError::Transport("connection reset".into())),
            }
        }
    }

    fn full_reply(chunk: &[PostDraft], tag: &str) -> String {
        let posts: Vec<serde_json::Value> = chunk
            .iter()
            .map(|p| {
                serde_json::json!({
                    "id": p.id.to_string(),
                    "title": format!("{tag} title {}", p.id),
                    "body": format!("{tag} body {}", p.id),
                    "comments": p.comments.iter().map(|c| serde_json::json!({
                        "id": c.id.to_string(),
                        "content": format!("{tag} comment {}", c.id),
                    })).collect::<Vec<_>>(),
                })
            })
            .collect();
        serde_json::json!({ "posts": posts }).to_string()
    }

    #[test]
    fn unique_with_retries_then_accepts_duplicate() {
        let mut used = UsedContent::new();
        assert_eq!(used.unique_with(|| Some("same".into())).as_deref(), Some("same"));

        let mut calls = 0;
        let text = used.unique_with(|| {
            calls += 1;
            Some("same".to_string())
        });
        assert_eq!(text.as_deref(), Some("same"));
        assert_eq!(calls, MAX_UNIQUE_RETRIES + 1);
    }

    #[test]
    fn unique_with_stops_at_first_fresh_value() {
        let mut used = UsedContent::new();
        used.try_accept("a");
        let mut values = vec!["c", "b", "a"];
        let text = used.unique_with(|| values.pop().map(String::from));
        assert_eq!(text.as_deref(), Some("b"));
        assert!(used.contains("b"));
        assert_eq!(used.len(), 2);
    }

    #[test]
    fn comment_pool_follows_type() {
        let templates = ContentTemplates::default();
        let filler = TemplateFiller::new(&templates, "SlideForge");
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            let plug = filler.comment(CommentType::Plug, &mut rng).unwrap();
            assert!(plug.contains("SlideForge"));
            let agreement = filler.comment(CommentType::Agreement, &mut rng).unwrap();
            assert!(templates.comments.agreements.contains(&agreement));
            let curiosity = filler.comment(CommentType::Curiosity, &mut rng).unwrap();
            assert!(templates.comments.generic.contains(&curiosity));
        }
    }

    #[test]
    fn body_joins_three_parts() {
        let mut templates = ContentTemplates::default();
        templates.bodies.intros = vec!["In r/{subreddit}.".into()];
        templates.bodies.middles = vec!["About {topic}.".into()];
        templates.bodies.outros = vec!["Try {companyName}.".into()];
        let filler = TemplateFiller::new(&templates, "Acme");
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            filler.body("decks", "slides", &mut rng).as_deref(),
            Some("In r/slides. About decks. Try Acme.")
        );
    }

    #[test]
    fn empty_pool_leaves_field_unfilled() {
        let mut templates = ContentTemplates::default();
        templates.titles.clear();
        let filler = TemplateFiller::new(&templates, "Acme");
        let mut used = UsedContent::new();
        let mut rng = StdRng::seed_from_u64(2);
        let mut draft = drafts(1, 4).remove(0);
        filler.fill_missing(&mut draft, &mut used, &mut rng);
        assert!(draft.title.is_none());
        assert!(draft.body.is_some());
    }

    #[test]
    fn parse_rejects_missing_posts() {
        assert!(matches!(
            parse_batch_response(r#"{"items": []}"#),
            Err(ProviderError::Malformed { .. })
        ));
        assert!(parse_batch_response("not json").is_err());
    }

    #[test]
    fn parse_accepts_fenced_json() {
        let raw = "```json\n{\"posts\": [{\"id\": \"x\", \"title\": \"T\"}]}\n```";
        let output = parse_batch_response(raw).unwrap();
        assert_eq!(output.posts.len(), 1);
        assert_eq!(output.posts[0].title.as_deref(), Some("T"));
        assert!(output.posts[0].comments.is_empty());
    }

    #[test]
    fn batch_prompt_carries_every_identifier() {
        let chunk = drafts(2, 3);
        let prompt = batch_prompt(&chunk).unwrap();
        assert!(prompt.starts_with("You are a Reddit content generator."));
        for post in &chunk {
            assert!(prompt.contains(&post.id.to_string()));
            for comment in &post.comments {
                assert!(prompt.contains(&comment.id.to_string()));
            }
        }
    }

    #[test]
    fn apply_batch_skips_blank_and_duplicate_text() {
        let mut chunk = drafts(1, 5);
        let id = chunk[0].id.to_string();
        let mut used = UsedContent::new();
        used.try_accept("taken");
        let output = BatchOutput {
            posts: vec![GeneratedPost {
                id,
                title: Some("taken".into()),
                body: Some("   ".into()),
                comments: vec![],
            }],
        };
        assert_eq!(apply_batch(&mut chunk, output, &mut used), 0);
        assert!(chunk[0].title.is_none());
        assert!(chunk[0].body.is_none());
    }

    #[tokio::test]
    async fn external_results_are_applied_per_chunk() {
        let mut drafts = drafts(5, 6);
        let replies = vec![Some(full_reply(&drafts[0..3], "a")), Some(full_reply(&drafts[3..5], "b"))];
        let generator = Arc::new(ScriptedGenerator::new(replies));
        let templates = ContentTemplates::default();
        let provider = ContentProvider::external(
            TemplateFiller::new(&templates, "TestCo"),
            generator.clone(),
            ChunkPacing {
                chunk_size: 3,
                delay: Duration::ZERO,
            },
        );
        let mut used = UsedContent::new();
        let mut rng = StdRng::seed_from_u64(1);

        let stats = provider.fill(&mut drafts, &mut used, &mut rng).await;

        assert_eq!(stats.failed_chunks, 0);
        assert_eq!(stats.templated, 0);
        assert_eq!(generator.prompts.lock().unwrap().len(), 2);
        assert!(generator.prompts.lock().unwrap()[0].options.structured_output);
        assert!(drafts[0].title.as_deref().unwrap().starts_with("a title"));
        assert!(drafts[4].title.as_deref().unwrap().starts_with("b title"));
    }

    #[tokio::test]
    async fn failed_chunk_falls_back_to_templates_only_for_that_chunk() {
        let mut drafts = drafts(6, 7);
        let replies = vec![Some(full_reply(&drafts[0..3], "llm")), None];
        let generator = Arc::new(ScriptedGenerator::new(replies));
        let templates = ContentTemplates::default();
        let provider = ContentProvider::external(
            TemplateFiller::new(&templates, "TestCo"),
            generator,
            ChunkPacing {
                chunk_size: 3,
                delay: Duration::ZERO,
            },
        );
        let mut used = UsedContent::new();
        let mut rng = StdRng::seed_from_u64(1);

        let stats = provider.fill(&mut drafts, &mut used, &mut rng).await;

        assert_eq!(stats.failed_chunks, 1);
        assert!(drafts.iter().all(fully_filled));
        assert!(drafts[..3]
            .iter()
            .all(|d| d.title.as_deref().unwrap().starts_with("llm title")));
        assert!(drafts[3..]
            .iter()
            .all(|d| !d.title.as_deref().unwrap().starts_with("llm")));
    }

    #[tokio::test]
    async fn partial_response_fills_gaps_from_templates() {
        let mut drafts = drafts(2, 8);
        let reply = serde_json::json!({
            "posts": [{ "id": drafts[0].id.to_string(), "title": "only a title" }]
        })
        .to_string();
        let generator = Arc::new(ScriptedGenerator::new(vec![Some(reply)]));
        let templates = ContentTemplates::default();
        let provider = ContentProvider::external(
            TemplateFiller::new(&templates, "TestCo"),
            generator,
            ChunkPacing::default(),
        );
        let mut used = UsedContent::new();
        let mut rng = StdRng::seed_from_u64(1);

        let stats = provider.fill(&mut drafts, &mut used, &mut rng).await;

        assert_eq!(stats.external, 1);
        assert_eq!(drafts[0].title.as_deref(), Some("only a title"));
        assert!(drafts.iter().all(fully_filled));
    }

    #[tokio::test(start_paused = true)]
    async fn chunks_are_paced() {
        let mut drafts = drafts(7, 9);
        let generator = Arc::new(ScriptedGenerator::new(vec![None, None, None]));
        let templates = ContentTemplates::default();
        let provider = ContentProvider::external(
            TemplateFiller::new(&templates, "TestCo"),
            generator.clone(),
            ChunkPacing::default(),
        );
        let mut used = UsedContent::new();
        let mut rng = StdRng::seed_from_u64(1);

        let started = tokio::time::Instant::now();
        let stats = provider.fill(&mut drafts, &mut used, &mut rng).await;

        assert_eq!(stats.failed_chunks, 3);
        assert_eq!(generator.prompts.lock().unwrap().len(), 3);
        assert!(started.elapsed() >= Duration::from_millis(3000));
    }
}
