use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PROFILES_TABLE: &str = "profiles";
pub const PROFILE_COLUMNS: &[&str] = &["id", "email", "full_name", "avatar_url"];

/// Public author data, keyed by the auth identity id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NewProfile<'a> {
    pub id: Uuid,
    pub email: Option<&'a str>,
    pub full_name: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
}
