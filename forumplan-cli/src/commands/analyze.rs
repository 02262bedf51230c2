use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use forumplan_core::{analyze_calendar, evaluate_quality, AnalysisReport, Calendar, QualityReport};
use serde::Serialize;

use crate::config::load_config;
use crate::render;

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Calendar JSON written by `forumplan generate` (one calendar or an array)
    #[arg(long = "in", value_name = "PATH")]
    pub input: PathBuf,

    /// Also run the stricter evaluation against the generating config
    #[arg(long)]
    pub strict: bool,

    /// Config for --strict (default: ~/.forumplan/config.toml, else the built-in sample)
    #[arg(long, value_name = "PATH", env = "FORUMPLAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// JSON for machine consumption
    Json,
}

#[derive(Serialize)]
struct WeekReport {
    week_start_date: NaiveDate,
    analysis: AnalysisReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<QualityReport>,
}

pub fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let calendars = Calendar::parse_many(&raw)
        .with_context(|| format!("{} is not a calendar JSON file", args.input.display()))?;

    let config = if args.strict {
        Some(load_config(args.config.as_deref())?)
    } else {
        None
    };

    let reports: Vec<WeekReport> = calendars
        .iter()
        .map(|calendar| WeekReport {
            week_start_date: calendar.week_start_date,
            analysis: analyze_calendar(calendar),
            quality: config.as_ref().map(|cfg| evaluate_quality(calendar, cfg)),
        })
        .collect();

    match args.format {
        ReportFormat::Json => {
            let json =
                serde_json::to_string_pretty(&reports).context("Failed to serialize reports")?;
            println!("{json}");
        }
        ReportFormat::Text => {
            if reports.is_empty() {
                println!("No calendars found in {}", args.input.display());
            }
            for (week, report) in reports.iter().enumerate() {
                let label = format!("Week {} ({})", week + 1, report.week_start_date);
                print!("{}", render::analysis_text(&label, &report.analysis)?);
                if let Some(quality) = &report.quality {
                    print!("{}", render::quality_text(&label, quality)?);
                }
            }
        }
    }

    Ok(())
}
