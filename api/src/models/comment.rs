use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enrichment::Authored;

pub const COMMENTS_TABLE: &str = "comments";
pub const MAX_COMMENT_LENGTH: usize = 5000;

// The model that maps to the `comments` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub project_id: i64,
    #[serde(default)]
    pub parent_comment_id: Option<i64>,
    pub content: String,
    #[serde(rename(deserialize = "user_id"), default)]
    pub author_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Authored for Comment {
    fn author_id(&self) -> Option<Uuid> {
        self.author_id
    }
}

#[derive(Debug, Serialize)]
pub struct NewComment {
    pub content: String,
    pub user_id: Uuid,
    pub project_id: i64,
    pub parent_comment_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CommentSubmission {
    pub content: String,
    #[serde(default)]
    pub parent_comment_id: Option<i64>,
}

impl CommentSubmission {
    pub fn validate(&mut self) -> Result<(), &'static str> {
        self.content = self.content.trim().to_string();

        if self.content.is_empty() {
            return Err("No content provided");
        }

        if self.content.chars().count() > MAX_COMMENT_LENGTH {
            return Err("Content too long (max 5000 characters)");
        }

        Ok(())
    }
}
