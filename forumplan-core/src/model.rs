use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PlanError, Result};

/// The brand being promoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub goals: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    /// e.g. "Helpful expert", "Curious beginner"
    pub style: String,
    pub tone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subreddit {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    /// Discussion seed injected into prompts and templates
    pub query: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentType {
    Plug,
    Agreement,
    Curiosity,
    Generic,
}

impl CommentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentType::Plug => "plug",
            CommentType::Agreement => "agreement",
            CommentType::Curiosity => "curiosity",
            CommentType::Generic => "generic",
        }
    }
}

impl fmt::Display for CommentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub persona_id: String,
    pub author_name: String,
    pub content_prompt: String,
    pub simulated_content: String,
    /// `None` replies to the post itself, `Some` to another comment of the same post
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    pub date: NaiveDateTime,
    pub comment_type: CommentType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub subreddit: String,
    pub op_persona_id: String,
    pub author_name: String,
    pub topic_id: String,
    pub title_prompt: String,
    pub body_prompt: String,
    pub simulated_title: String,
    pub simulated_body: String,
    pub date: NaiveDateTime,
    pub comments: Vec<Comment>,
}

impl Post {
    pub fn comment(&self, id: Uuid) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    /// Persona id of whatever `comment` replies to: the parent comment's
    /// author, or the OP for top-level comments.
    ///
    /// A dangling `parent_id` resolves to `None`.
    pub fn parent_author(&self, comment: &Comment) -> Option<&str> {
        match comment.parent_id {
            None => Some(self.op_persona_id.as_str()),
            Some(parent_id) => self.comment(parent_id).map(|p| p.persona_id.as_str()),
        }
    }

    pub fn has_plug(&self) -> bool {
        self.comments
            .iter()
            .any(|c| c.comment_type == CommentType::Plug)
    }
}

/// One generated week. Posts are sorted ascending by date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    pub week_start_date: NaiveDate,
    pub posts: Vec<Post>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CalendarDocument {
    Many(Vec<Calendar>),
    One(Calendar),
}

impl Calendar {
    /// Parse either a single calendar or an array of them.
    pub fn parse_many(raw: &str) -> Result<Vec<Calendar>> {
        match serde_json::from_str(raw) {
            Ok(CalendarDocument::Many(calendars)) => Ok(calendars),
            Ok(CalendarDocument::One(calendar)) => Ok(vec![calendar]),
            Err(err) => Err(PlanError::json("not a calendar document", err)),
        }
    }
}
