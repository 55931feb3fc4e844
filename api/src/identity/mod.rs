use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::{
    App,
    enrichment::{Authored, AuthorView},
    error::{ApiRequestError, AppError},
    models::profile::Profile,
};

pub mod auth_client;
pub mod profile;
pub mod routes;

pub const COOKIE_NAME: &str = "access_token";

#[derive(thiserror::Error, Debug)]
pub enum AuthenticationError {
    #[error("Authentication required, but no cookie `{COOKIE_NAME}` found in headers.")]
    NoCookie,

    #[error(
        "Unauthorized, please check if you're logged in by refreshing the \
         page. This could be due to an expired session or token has became invalid."
    )]
    Unauthorized,
}

impl ApiRequestError for AuthenticationError {
    fn status_code(&self) -> axum::http::StatusCode {
        match self {
            AuthenticationError::NoCookie => axum::http::StatusCode::UNAUTHORIZED,
            AuthenticationError::Unauthorized => axum::http::StatusCode::UNAUTHORIZED,
        }
    }
}

/// The signed-in user as reported by the auth provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub access_token: String,
}

impl Identity {
    pub fn as_profile(&self) -> Profile {
        Profile {
            id: self.id,
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }

    pub fn author(&self) -> AuthorView {
        AuthorView::resolve(Some(&self.as_profile()), self)
    }
}

impl Authored for Identity {
    fn author_id(&self) -> Option<Uuid> {
        Some(self.id)
    }

    fn user_email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

/// Resolves the session cookie once per request. Handlers only ever read
/// the identity from here; nothing else asks the auth provider who is
/// signed in.
pub struct MaybeAuthUser(pub Result<Identity, AuthenticationError>);

impl FromRequestParts<App> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &App) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);

        let token = if let Some(t) = jar.get(COOKIE_NAME) {
            t.value().to_string()
        } else {
            return Ok(MaybeAuthUser(Err(AuthenticationError::NoCookie)));
        };

        match state.auth.get_user(&token).await {
            Ok(identity) => Ok(MaybeAuthUser(Ok(identity))),
            Err(e) if e.is_rejection() => {
                tracing::debug!(error = %e, "session token rejected");
                Ok(MaybeAuthUser(Err(AuthenticationError::Unauthorized)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

pub struct AuthUser(pub Identity);

impl FromRequestParts<App> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &App) -> Result<Self, Self::Rejection> {
        let MaybeAuthUser(auth_user) = MaybeAuthUser::from_request_parts(parts, state).await?;

        Ok(AuthUser(auth_user?))
    }
}
