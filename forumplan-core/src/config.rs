use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PlanError, Result};
use crate::model::{Brand, Persona, Subreddit, Topic};
use crate::templates::ContentTemplates;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Everything one calendar generation needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub posts_per_week: u32,
    #[serde(default)]
    pub use_external_generation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    pub brand: Brand,
    pub personas: Vec<Persona>,
    pub subreddits: Vec<Subreddit>,
    pub topics: Vec<Topic>,
    #[serde(default)]
    pub templates: ContentTemplates,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl GenerationConfig {
    /// Load config from a TOML file and expand `${VAR}` references.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PlanError::path_not_found(path));
        }

        let content = fs::read_to_string(path)?;
        let mut config: Self =
            toml::from_str(&content).map_err(|err| PlanError::toml(path, err))?;
        config.expand_variables();
        Ok(config)
    }

    /// Default config location: ~/.forumplan/config.toml
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".forumplan/config.toml")
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)
            .map_err(|err| PlanError::config(format!("failed to serialize config: {err}")))?;
        fs::write(path, toml_str)?;
        Ok(())
    }

    /// Fill the API key from `${VAR}` references or `OPENAI_API_KEY`.
    pub fn expand_variables(&mut self) {
        let key = match self.openai_api_key.take() {
            Some(key) => expand_env(&key),
            None => String::new(),
        };
        let key = if key.trim().is_empty() {
            env::var("OPENAI_API_KEY").unwrap_or_default()
        } else {
            key
        };
        self.openai_api_key = (!key.trim().is_empty()).then_some(key);
    }

    /// Reject configurations that make planning impossible.
    pub fn validate(&self) -> Result<()> {
        if self.personas.is_empty() {
            return Err(PlanError::config("at least one persona is required"));
        }
        if self.posts_per_week == 0 {
            return Err(PlanError::config("posts_per_week must be at least 1"));
        }
        if self.subreddits.is_empty() {
            return Err(PlanError::config("at least one subreddit is required"));
        }
        if self.topics.is_empty() {
            return Err(PlanError::config("at least one topic is required"));
        }
        if self.personas.len() == 1 {
            warn!("only one persona configured; comments cannot be attributed without self-replies");
        }
        let empty = self.templates.empty_pools();
        if !empty.is_empty() {
            warn!(pools = ?empty, "empty template pools will produce placeholder text");
        }
        Ok(())
    }

    /// The credential, if one is set and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.openai_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
    }

    /// External generation needs both the flag and a credential.
    pub fn external_generation_enabled(&self) -> bool {
        self.use_external_generation && self.api_key().is_some()
    }

    /// Stock planning setup used by `config init`.
    pub fn sample() -> Self {
        let persona = |id: &str, name: &str, style: &str, tone: &str| Persona {
            id: id.into(),
            name: name.into(),
            style: style.into(),
            tone: tone.into(),
        };
        let subreddit = |name: &str, description: &str| Subreddit {
            name: name.into(),
            description: description.into(),
        };
        let topic = |id: &str, query: &str| Topic {
            id: id.into(),
            query: query.into(),
        };

        Self {
            posts_per_week: 5,
            use_external_generation: false,
            openai_api_key: None,
            model: default_model(),
            brand: Brand {
                name: "SlideForge".into(),
                description:
                    "AI-powered presentation generator that creates professional slides in seconds."
                        .into(),
                goals: "Drive signups and brand awareness among professionals and students.".into(),
            },
            personas: vec![
                persona("1", "Alex", "Helpful Expert", "Professional and informative"),
                persona("2", "Sam", "Curious Student", "Casual and inquisitive"),
                persona("3", "Jordan", "Skeptical Techie", "Critical and detail-oriented"),
            ],
            subreddits: vec![
                subreddit("productivity", "Tips and tricks for being more productive."),
                subreddit("consulting", "Discussion for management consultants."),
                subreddit("college", "Everything related to college life."),
            ],
            topics: vec![
                topic("1", "Best tools for making presentations quickly"),
                topic("2", "How to save time on slide decks"),
                topic("3", "AI tools for students"),
            ],
            templates: ContentTemplates::default(),
        }
    }
}

/// Expand ${VAR} references from the environment; unset vars become empty.
fn expand_env(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                result.push_str(&env::var(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);
    result
}
