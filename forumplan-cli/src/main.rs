//! forumplan CLI - weekly forum content calendars for brand marketing
//!
//! - `generate`: plan one or more weeks of posts and threaded comments
//! - `analyze`: score a previously generated calendar
//! - `config`: create, inspect and validate the planning config

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod config;
mod render;
mod tracing_setup;
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "forumplan",
    author,
    version,
    about = "Plan a natural-looking week of forum posts and comment threads for a brand",
    long_about = "Schedules posts across a week, builds persona comment threads that never \
                  reply to themselves and always mention the brand, fills text from templates \
                  or the OpenAI API, and scores the result for naturalness."
)]
struct Cli {
    /// Suppress progress spinners (for script consumption)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Debug logging to stderr
    #[arg(long, global = true)]
    debug: bool,

    /// Export traces over OTLP (needs the `telemetry` feature)
    #[arg(long, global = true)]
    otel: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate content calendars
    Generate(commands::generate::GenerateArgs),
    /// Score a generated calendar file
    Analyze(commands::analyze::AnalyzeArgs),
    /// Manage forumplan configuration (init, path, show, validate)
    Config(config::ConfigArgs),
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)] // PowerShell is a proper noun, not a suffix
enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

fn load_env_files() {
    if let Some(home) = dirs::home_dir() {
        let _ = dotenvy::from_path(home.join(".forumplan/.env"));
    }
    let _ = dotenvy::dotenv();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    load_env_files();

    tracing_setup::init(&tracing_setup::TracingConfig {
        debug: cli.debug,
        otel: cli.otel,
    })
    .ok();
    ui::init_quiet_mode(cli.quiet);

    let result = match cli.command {
        Commands::Generate(args) => commands::run_generate(args).await,
        Commands::Analyze(args) => commands::run_analyze(args),
        Commands::Config(args) => config::run_config(args),
        Commands::Completions(args) => run_completions(args),
    };

    tracing_setup::shutdown_otel();
    result
}

fn run_completions(args: CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell as CompletionShell};
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    let shell = match args.shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    };

    generate(shell, &mut cmd, bin_name, &mut io::stdout());

    Ok(())
}
