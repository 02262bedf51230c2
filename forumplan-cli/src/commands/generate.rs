use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, ValueEnum};
use forumplan_core::{
    analyze_calendar, Calendar, CalendarEngine, GenerationConfig, PlanSession, TextGenerator,
};
use forumplan_llm::OpenAiClient;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, instrument, warn};

use crate::config::load_config;
use crate::render;
use crate::ui;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Config file (default: ~/.forumplan/config.toml, else a built-in sample)
    #[arg(long, value_name = "PATH", env = "FORUMPLAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of consecutive weeks to plan
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=52))]
    pub weeks: u32,

    /// Seed for a reproducible calendar
    #[arg(long)]
    pub seed: Option<u64>,

    /// Pretend today is this date (YYYY-MM-DD); week 1 starts the following Monday
    #[arg(long, value_name = "DATE")]
    pub today: Option<NaiveDate>,

    /// Output format
    #[arg(long, value_enum, default_value_t = CalendarFormat::Json)]
    pub format: CalendarFormat,

    /// Write to a file instead of stdout
    #[arg(long = "out", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Generate text with the OpenAI API (needs OPENAI_API_KEY or openai_api_key)
    #[arg(long)]
    pub llm: bool,

    /// Print a quality analysis of each week to stderr
    #[arg(long)]
    pub analyze: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum CalendarFormat {
    /// Array of calendars
    #[default]
    Json,
    /// Week tables followed by threaded posts
    Markdown,
}

#[instrument(skip_all, fields(weeks = args.weeks))]
pub async fn run_generate(args: GenerateArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if args.llm {
        config.use_external_generation = true;
    }
    config.validate().context("Configuration is not usable")?;

    let seed = args.seed.unwrap_or_else(rand::random);
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    info!(seed, %today, "planning");

    let mut engine = CalendarEngine::new(&config);
    if let Some(generator) = external_generator(&config) {
        engine = engine.with_generator(generator);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut session = PlanSession::new(engine, today);
    for week in 0..args.weeks {
        let label = format!("Generating week {} of {}", week + 1, args.weeks);
        ui::with_spinner_async(
            label,
            |calendar: &&Calendar| {
                format!(
                    "Week of {} planned ({} posts)",
                    calendar.week_start_date,
                    calendar.posts.len()
                )
            },
            session.next_week(&mut rng),
        )
        .await?;
    }

    let calendars = session.weeks();
    let rendered = match args.format {
        CalendarFormat::Json => {
            serde_json::to_string_pretty(calendars).context("Failed to serialize calendars")?
        }
        CalendarFormat::Markdown => render::calendars_markdown(calendars)?,
    };

    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !ui::is_quiet() {
                eprintln!("Wrote {} week(s) to {}", calendars.len(), path.display());
            }
        }
        None => println!("{rendered}"),
    }

    if args.analyze {
        for (week, calendar) in calendars.iter().enumerate() {
            let label = format!("Week {} ({})", week + 1, calendar.week_start_date);
            eprint!("{}", render::analysis_text(&label, &analyze_calendar(calendar))?);
        }
    }

    Ok(())
}

/// The OpenAI client, when configuration asks for it and a key is present.
fn external_generator(config: &GenerationConfig) -> Option<Arc<dyn TextGenerator>> {
    if !config.use_external_generation {
        return None;
    }
    let Some(key) = config.api_key() else {
        warn!("external generation requested but no API key is set; using templates");
        return None;
    };
    match OpenAiClient::new(key, config.model.clone()) {
        Ok(client) => Some(Arc::new(client)),
        Err(err) => {
            warn!(error = %err, "could not create OpenAI client; using templates");
            None
        }
    }
}
