use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enrichment::Authored;

use super::null_as_default;

pub const PROJECTS_TABLE: &str = "projects";
pub const PREDEFINED_TAGS: &[&str] = &["React", "Vue", "JavaScript", "Python", "API", "ML"];

const MAX_TITLE_LENGTH: usize = 120;
const MAX_DESCRIPTION_LENGTH: usize = 5000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub project_link: Option<String>,
    #[serde(default)]
    pub video_link: Option<String>,
    #[serde(rename(deserialize = "user_id"), default)]
    pub author_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub image: Option<String>,

    // Denormalized author columns, present on some deployments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
}

impl Authored for Project {
    fn author_id(&self) -> Option<Uuid> {
        self.author_id
    }

    fn creator_name(&self) -> Option<&str> {
        self.creator_name.as_deref()
    }

    fn user_email(&self) -> Option<&str> {
        self.user_email.as_deref()
    }
}

impl AsRef<Project> for Project {
    fn as_ref(&self) -> &Project {
        self
    }
}

#[derive(Debug, Serialize)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub project_link: Option<String>,
    pub video_link: Option<String>,
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ProjectSubmission {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub project_link: Option<String>,
    #[serde(default)]
    pub video_link: Option<String>,
}

impl ProjectSubmission {
    pub fn validate(self, author: Uuid) -> Result<NewProject, &'static str> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err("No title provided");
        }
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err("Title too long (max 120 characters)");
        }

        let description = self.description.trim().to_string();
        if description.is_empty() {
            return Err("No description provided");
        }
        if description.chars().count() > MAX_DESCRIPTION_LENGTH {
            return Err("Description too long (max 5000 characters)");
        }

        let mut tags: Vec<String> = Vec::with_capacity(self.tags.len());
        for tag in self.tags {
            let tag = tag.trim();
            let Some(known) = PREDEFINED_TAGS.iter().find(|t| t.eq_ignore_ascii_case(tag)) else {
                return Err("Unknown tag");
            };
            if !tags.iter().any(|t| t == known) {
                tags.push(known.to_string());
            }
        }

        Ok(NewProject {
            title,
            description,
            tags,
            project_link: optional_link(self.project_link)?,
            video_link: optional_link(self.video_link)?,
            user_id: author,
        })
    }
}

fn optional_link(link: Option<String>) -> Result<Option<String>, &'static str> {
    let Some(link) = link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()) else {
        return Ok(None);
    };

    match url::Url::parse(&link) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => Ok(Some(link)),
        _ => Err("Links must be http(s) URLs"),
    }
}
