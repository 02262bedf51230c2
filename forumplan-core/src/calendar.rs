//! Calendar assembly: schedule, draft threads, fill text, finalize.

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use rand::Rng;
use tracing::{info, instrument, warn};

use crate::config::GenerationConfig;
use crate::error::{PlanError, Result};
use crate::model::{Calendar, Comment, Post};
use crate::provider::{ChunkPacing, ContentProvider, FillStats, TemplateFiller, TextGenerator, UsedContent};
use crate::schedule::{plan_slots, RoundRobin};
use crate::thread::{PostDraft, ThreadSynthesizer};

pub const ERROR_TITLE: &str = "Error Generating Title";
pub const ERROR_BODY: &str = "Error Generating Body";
pub const ERROR_COMMENT: &str = "Error Generating Comment";

/// Monday starting week `week_offset`, where week 0 is the week after the
/// one containing `today`.
pub fn week_start(today: NaiveDate, week_offset: u32) -> NaiveDate {
    let this_monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    this_monday + Duration::days(7 + 7 * i64::from(week_offset))
}

pub struct CalendarEngine<'a> {
    config: &'a GenerationConfig,
    generator: Option<Arc<dyn TextGenerator>>,
    pacing: ChunkPacing,
}

impl<'a> CalendarEngine<'a> {
    pub fn new(config: &'a GenerationConfig) -> Self {
        Self {
            config,
            generator: None,
            pacing: ChunkPacing::default(),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_pacing(mut self, pacing: ChunkPacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn config(&self) -> &GenerationConfig {
        self.config
    }

    /// External generation runs only when configured, credentialed and wired.
    pub fn uses_external_generation(&self) -> bool {
        self.generator.is_some() && self.config.external_generation_enabled()
    }

    /// Scheduled post skeletons without text.
    pub fn draft_week<R: Rng + ?Sized>(
        &self,
        week_start: NaiveDate,
        rng: &mut R,
    ) -> Result<Vec<PostDraft>> {
        self.config.validate()?;
        let config = self.config;

        let topics = RoundRobin::shuffled(&config.topics, rng);
        let subreddits = RoundRobin::shuffled(&config.subreddits, rng);
        let synthesizer = ThreadSynthesizer::new(&config.brand, &config.personas)?;

        plan_slots(config.posts_per_week as usize, rng)
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                let topic = topics
                    .get(index)
                    .ok_or_else(|| PlanError::config("at least one topic is required"))?;
                let subreddit = subreddits
                    .get(index)
                    .ok_or_else(|| PlanError::config("at least one subreddit is required"))?;
                Ok(synthesizer.draft_post(slot.at(week_start), subreddit, topic, rng))
            })
            .collect()
    }

    /// Generate one week. Provider failures degrade to template text; only
    /// configuration problems are returned as errors.
    #[instrument(skip_all, fields(week_offset = week_offset, posts = self.config.posts_per_week))]
    pub async fn generate<R: Rng + Send + ?Sized>(
        &self,
        week_offset: u32,
        today: NaiveDate,
        rng: &mut R,
    ) -> Result<Calendar> {
        let start = week_start(today, week_offset);
        let mut drafts = self.draft_week(start, rng)?;
        let mut used = UsedContent::new();
        let filler = TemplateFiller::new(&self.config.templates, &self.config.brand.name);

        let stats = match (&self.generator, self.config.external_generation_enabled()) {
            (Some(generator), true) => {
                let provider = ContentProvider::external(filler, generator.clone(), self.pacing);
                provider.fill(&mut drafts, &mut used, rng).await
            }
            (None, true) => {
                warn!("external generation requested but no generator is available; using templates");
                ContentProvider::templates_only(filler).fill_from_templates(&mut drafts, &mut used, rng)
            }
            (_, false) => {
                ContentProvider::templates_only(filler).fill_from_templates(&mut drafts, &mut used, rng)
            }
        };

        Ok(finish(start, drafts, stats))
    }

    /// Template-only generation, no runtime needed.
    pub fn generate_with_templates<R: Rng + ?Sized>(
        &self,
        week_offset: u32,
        today: NaiveDate,
        rng: &mut R,
    ) -> Result<Calendar> {
        let start = week_start(today, week_offset);
        let mut drafts = self.draft_week(start, rng)?;
        let mut used = UsedContent::new();
        let filler = TemplateFiller::new(&self.config.templates, &self.config.brand.name);
        let stats =
            ContentProvider::templates_only(filler).fill_from_templates(&mut drafts, &mut used, rng);
        Ok(finish(start, drafts, stats))
    }
}

fn finish(week_start_date: NaiveDate, drafts: Vec<PostDraft>, stats: FillStats) -> Calendar {
    let calendar = assemble(week_start_date, drafts);
    let gaps = count_gaps(&calendar);
    if gaps > 0 {
        warn!(gaps, "some fields have no generated text");
    }
    info!(
        week_start = %week_start_date,
        posts = calendar.posts.len(),
        external = stats.external,
        templated = stats.templated,
        failed_chunks = stats.failed_chunks,
        "calendar generated"
    );
    calendar
}

/// Turn drafts into final records, sentinel text for anything unfilled,
/// posts sorted by date.
pub fn assemble(week_start_date: NaiveDate, drafts: Vec<PostDraft>) -> Calendar {
    let mut posts: Vec<Post> = drafts
        .into_iter()
        .map(|draft| Post {
            id: draft.id,
            subreddit: draft.subreddit,
            op_persona_id: draft.op_persona_id,
            author_name: draft.author_name,
            topic_id: draft.topic_id,
            title_prompt: draft.title_prompt,
            body_prompt: draft.body_prompt,
            simulated_title: draft.title.unwrap_or_else(|| ERROR_TITLE.to_string()),
            simulated_body: draft.body.unwrap_or_else(|| ERROR_BODY.to_string()),
            date: draft.date,
            comments: draft
                .comments
                .into_iter()
                .map(|c| Comment {
                    id: c.id,
                    persona_id: c.persona_id,
                    author_name: c.author_name,
                    content_prompt: c.content_prompt,
                    simulated_content: c.content.unwrap_or_else(|| ERROR_COMMENT.to_string()),
                    parent_id: c.parent_id,
                    date: c.date,
                    comment_type: c.comment_type,
                })
                .collect(),
        })
        .collect();

    posts.sort_by_key(|post| post.date);

    Calendar {
        week_start_date,
        posts,
    }
}

fn count_gaps(calendar: &Calendar) -> usize {
    calendar
        .posts
        .iter()
        .map(|post| {
            usize::from(post.simulated_title == ERROR_TITLE)
                + usize::from(post.simulated_body == ERROR_BODY)
                + post
                    .comments
                    .iter()
                    .filter(|c| c.simulated_content == ERROR_COMMENT)
                    .count()
        })
        .sum()
}
