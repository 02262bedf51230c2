use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use forumplan_core::GenerationConfig;
use tracing::info;

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a starter config with sample brand, personas, subreddits and topics
    Init(InitArgs),
    /// Show config file path
    Path,
    /// Print the effective config as TOML (API key redacted)
    Show(ShowArgs),
    /// Check that the config can produce a calendar
    Validate(ShowArgs),
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Force overwrite existing config
    #[arg(long, short)]
    pub force: bool,

    /// Write somewhere other than the default location
    #[arg(long, value_name = "PATH")]
    pub path: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Config file (default: ~/.forumplan/config.toml)
    #[arg(long, value_name = "PATH", env = "FORUMPLAN_CONFIG")]
    pub config: Option<PathBuf>,
}

pub fn run_config(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Init(args) => run_init(args),
        ConfigCommands::Path => run_path(),
        ConfigCommands::Show(args) => run_show(args),
        ConfigCommands::Validate(args) => run_validate(args),
    }
}

/// Explicit path, else the default file, else the built-in sample.
pub fn load_config(path: Option<&Path>) -> Result<GenerationConfig> {
    if let Some(path) = path {
        return GenerationConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    let default_path = GenerationConfig::config_path();
    if default_path.exists() {
        return GenerationConfig::load(&default_path)
            .with_context(|| format!("Failed to load config {}", default_path.display()));
    }

    info!(
        path = %default_path.display(),
        "no config file found; using the built-in sample"
    );
    let mut config = GenerationConfig::sample();
    config.expand_variables();
    Ok(config)
}

fn run_init(args: InitArgs) -> Result<()> {
    let config_path = args.path.unwrap_or_else(GenerationConfig::config_path);

    if config_path.exists() && !args.force {
        return Err(anyhow::anyhow!(
            "Config already exists at {}\n\nUse --force to overwrite",
            config_path.display()
        ));
    }

    let mut config = GenerationConfig::sample();
    config.openai_api_key = Some("${OPENAI_API_KEY}".to_string());
    config
        .save(&config_path)
        .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

    println!("✅ Created config at: {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Edit the config: $EDITOR {}", config_path.display());
    println!("  2. Replace the sample brand, personas, subreddits and topics");
    println!("  3. Run: forumplan config validate");

    Ok(())
}

fn run_path() -> Result<()> {
    println!("{}", GenerationConfig::config_path().display());
    Ok(())
}

fn run_show(args: ShowArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if config.openai_api_key.is_some() {
        config.openai_api_key = Some("<redacted>".to_string());
    }
    let toml_str = toml::to_string_pretty(&config).context("Failed to serialize config to TOML")?;
    println!("{}", toml_str);
    Ok(())
}

fn run_validate(args: ShowArgs) -> Result<()> {
    println!("🔍 Validating configuration...");

    let config = load_config(args.config.as_deref())?;
    println!("   ✓ Config loaded successfully");

    config.validate().context("Configuration is not usable")?;
    println!(
        "   ✓ {} personas, {} subreddits, {} topics, {} posts per week",
        config.personas.len(),
        config.subreddits.len(),
        config.topics.len(),
        config.posts_per_week
    );

    if config.personas.len() < 2 {
        println!("   ⚠ A single persona cannot reply without replying to itself; comments will be skipped");
    }
    let empty = config.templates.empty_pools();
    if !empty.is_empty() {
        println!("   ⚠ Empty template pools: {}", empty.join(", "));
    }
    match (config.use_external_generation, config.api_key().is_some()) {
        (true, true) => println!("   ✓ External generation enabled ({})", config.model),
        (true, false) => {
            println!("   ⚠ External generation requested but no API key found; templates will be used")
        }
        (false, _) => println!("   ✓ Template generation"),
    }

    println!("\n✅ Configuration valid!");
    Ok(())
}
