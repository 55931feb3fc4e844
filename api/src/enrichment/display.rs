use serde::Serialize;

use crate::models::profile::Profile;

use super::Authored;

pub const ANONYMOUS_USER: &str = "Anonymous User";
const AVATAR_PLACEHOLDER: &str = "https://ui-avatars.com/api/";

/// Author label and picture, resolved the same way for every row type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorView {
    pub display_name: String,
    pub avatar_url: String,
}

impl AuthorView {
    pub fn resolve<T: Authored + ?Sized>(profile: Option<&Profile>, row: &T) -> Self {
        let display_name = resolve_display_name(profile, row);
        let avatar_url = resolve_avatar_url(profile, &display_name);
        AuthorView {
            display_name,
            avatar_url,
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// First available of the profile's full name, the profile's email, the
/// row's denormalized creator name, the row's denormalized email.
pub fn resolve_display_name<T: Authored + ?Sized>(profile: Option<&Profile>, row: &T) -> String {
    present(profile.and_then(|p| p.full_name.as_deref()))
        .or_else(|| present(profile.and_then(|p| p.email.as_deref())))
        .or_else(|| present(row.creator_name()))
        .or_else(|| present(row.user_email()))
        .unwrap_or(ANONYMOUS_USER)
        .to_string()
}

pub fn resolve_avatar_url(profile: Option<&Profile>, display_name: &str) -> String {
    if let Some(url) = present(profile.and_then(|p| p.avatar_url.as_deref())) {
        return url.to_string();
    }

    url::Url::parse_with_params(
        AVATAR_PLACEHOLDER,
        &[
            ("name", display_name),
            ("background", "667eea"),
            ("color", "fff"),
        ],
    )
    .map(String::from)
    .unwrap_or_else(|_| AVATAR_PLACEHOLDER.to_string())
}

#[cfg(test)]
mod test {
    use uuid::Uuid;

    use super::*;

    #[derive(Default)]
    struct Row {
        creator_name: Option<String>,
        user_email: Option<String>,
    }

    impl Authored for Row {
        fn author_id(&self) -> Option<Uuid> {
            None
        }

        fn creator_name(&self) -> Option<&str> {
            self.creator_name.as_deref()
        }

        fn user_email(&self) -> Option<&str> {
            self.user_email.as_deref()
        }
    }

    fn profile(full_name: Option<&str>, email: Option<&str>, avatar: Option<&str>) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            email: email.map(String::from),
            full_name: full_name.map(String::from),
            avatar_url: avatar.map(String::from),
        }
    }

    #[test]
    fn full_name_wins() {
        let p = profile(Some("Ada Lovelace"), Some("ada@example.com"), None);
        assert_eq!(resolve_display_name(Some(&p), &Row::default()), "Ada Lovelace");
    }

    #[test]
    fn email_is_used_without_full_name() {
        let p = profile(None, Some("a@b.com"), None);
        assert_eq!(resolve_display_name(Some(&p), &Row::default()), "a@b.com");

        let blank = profile(Some("  "), Some("a@b.com"), None);
        assert_eq!(resolve_display_name(Some(&blank), &Row::default()), "a@b.com");
    }

    #[test]
    fn denormalized_columns_follow_profile() {
        let row = Row {
            creator_name: Some("Grace".into()),
            user_email: Some("grace@example.com".into()),
        };
        assert_eq!(resolve_display_name(None, &row), "Grace");

        let row = Row {
            creator_name: None,
            user_email: Some("grace@example.com".into()),
        };
        assert_eq!(resolve_display_name(None, &row), "grace@example.com");
    }

    #[test]
    fn nothing_known_is_anonymous() {
        assert_eq!(resolve_display_name(None, &Row::default()), ANONYMOUS_USER);

        let empty = profile(None, None, None);
        assert_eq!(resolve_display_name(Some(&empty), &Row::default()), "Anonymous User");
    }

    #[test]
    fn avatar_prefers_profile_picture() {
        let p = profile(None, None, Some("https://cdn.example.com/a.png"));
        assert_eq!(resolve_avatar_url(Some(&p), "whoever"), "https://cdn.example.com/a.png");
    }

    #[test]
    fn avatar_placeholder_encodes_name() {
        assert_eq!(
            resolve_avatar_url(None, "Ada Lovelace"),
            "https://ui-avatars.com/api/?name=Ada+Lovelace&background=667eea&color=fff"
        );
        assert_eq!(
            AuthorView::resolve(None, &Row::default()).avatar_url,
            "https://ui-avatars.com/api/?name=Anonymous+User&background=667eea&color=fff"
        );
    }
}
