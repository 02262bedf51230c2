pub mod analysis;
pub mod calendar;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod schedule;
pub mod session;
pub mod templates;
pub mod thread;

pub use analysis::{analyze_calendar, evaluate_quality, AnalysisReport, QualityReport};
pub use calendar::{week_start, CalendarEngine};
pub use config::GenerationConfig;
pub use error::{PlanError, ProviderError, Result};
pub use model::{Brand, Calendar, Comment, CommentType, Persona, Post, Subreddit, Topic};
pub use provider::{ChunkPacing, GenerationOptions, GenerationRequest, TextGenerator};
pub use session::PlanSession;
pub use templates::ContentTemplates;
