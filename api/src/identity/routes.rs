use std::sync::LazyLock;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::Duration;
use uuid::Uuid;

use crate::{
    App,
    enrichment::AuthorView,
    error::AppError,
    models::profile::Profile,
};

use super::{
    COOKIE_NAME, Identity, MaybeAuthUser,
    auth_client::{AuthSession, SignUpOutcome},
    profile::ensure_profile,
};

const MIN_PASSWORD_LENGTH: usize = 6;
const MAX_EMAIL_LENGTH: usize = 254;
const MAX_NAME_LENGTH: usize = 100;

static EMAIL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

pub fn route() -> Router<App> {
    // TODO rate limit signup and login
    Router::<App>::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct IdentityView {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub author: AuthorView,
}

impl IdentityView {
    fn new(identity: &Identity, profile: Option<&Profile>) -> Self {
        IdentityView {
            id: identity.id,
            email: identity.email.clone(),
            author: match profile {
                Some(profile) => AuthorView::resolve(Some(profile), identity),
                None => identity.author(),
            },
        }
    }
}

#[derive(Serialize)]
pub struct IsAuth {
    is_auth: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    identity: Option<IdentityView>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    confirmation_required: bool,
}

#[derive(Deserialize, Debug)]
pub struct SignUpForm {
    email: String,
    password: String,
    confirm_password: String,
    #[serde(default)]
    full_name: Option<String>,
}

impl SignUpForm {
    fn validate(&mut self) -> Result<(), &'static str> {
        self.email = normalize_email(&self.email)?;

        if self.password != self.confirm_password {
            return Err("Passwords do not match");
        }

        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err("Password must be at least 6 characters");
        }

        if let Some(name) = self.full_name.take() {
            let name = name.trim().to_string();
            if name.chars().count() > MAX_NAME_LENGTH {
                return Err("Name too long");
            }
            self.full_name = Some(name).filter(|n| !n.is_empty());
        }

        Ok(())
    }
}

#[derive(Deserialize, Debug)]
pub struct LoginForm {
    email: String,
    password: String,
}

fn normalize_email(email: &str) -> Result<String, &'static str> {
    let email = email.trim().to_lowercase();

    if email.is_empty() {
        return Err("No email provided");
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err("Email too long");
    }

    let valid = EMAIL_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(&email));
    if !valid {
        return Err("Invalid email");
    }

    Ok(email)
}

fn session_cookie(ctx: &App, session: &AuthSession) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, session.identity.access_token.clone()))
        .http_only(true)
        .secure(ctx.config.is_production())
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::seconds(session.expires_in))
        .build()
}

/// Creates or syncs the profile for a fresh session. A failure here must not
/// undo a successful sign-in, so it is only logged.
async fn profile_for_session(ctx: &App, identity: &Identity) -> Option<Profile> {
    match ensure_profile(&ctx.store_for(Some(identity)), identity).await {
        Ok(profile) => Some(profile),
        Err(e) => {
            tracing::warn!(identity_id = %identity.id, error = %e, "could not ensure profile");
            None
        }
    }
}

async fn start_session(ctx: &App, session: AuthSession) -> (CookieJar, Json<IsAuth>) {
    let profile = profile_for_session(ctx, &session.identity).await;
    let jar = CookieJar::new().add(session_cookie(ctx, &session));

    (
        jar,
        Json(IsAuth {
            is_auth: true,
            identity: Some(IdentityView::new(&session.identity, profile.as_ref())),
            confirmation_required: false,
        }),
    )
}

async fn signup(
    State(ctx): State<App>,
    crate::json::Json(mut form): crate::json::Json<SignUpForm>,
) -> Result<impl IntoResponse, AppError> {
    form.validate()
        .map_err(|e| (e, StatusCode::BAD_REQUEST))?;

    let outcome = ctx
        .auth
        .sign_up(&form.email, &form.password, form.full_name.as_deref())
        .await?;

    match outcome {
        SignUpOutcome::SignedIn(session) => {
            tracing::info!(identity_id = %session.identity.id, "signed up");
            Ok(start_session(&ctx, session).await.into_response())
        }
        SignUpOutcome::ConfirmationRequired { id, .. } => {
            tracing::info!(identity_id = %id, "signed up, awaiting email confirmation");
            Ok((
                StatusCode::ACCEPTED,
                Json(IsAuth {
                    is_auth: false,
                    identity: None,
                    confirmation_required: true,
                }),
            )
                .into_response())
        }
    }
}

async fn login(
    State(ctx): State<App>,
    crate::json::Json(form): crate::json::Json<LoginForm>,
) -> Result<(CookieJar, Json<IsAuth>), AppError> {
    let email = normalize_email(&form.email).map_err(|e| (e, StatusCode::BAD_REQUEST))?;
    if form.password.is_empty() {
        return Err(("No password provided", StatusCode::BAD_REQUEST).into());
    }

    let session = ctx.auth.sign_in_with_password(&email, &form.password).await?;
    tracing::info!(identity_id = %session.identity.id, "signed in");

    Ok(start_session(&ctx, session).await)
}

async fn logout(State(ctx): State<App>, jar: CookieJar) -> impl IntoResponse {
    if let Some(token) = jar.get(COOKIE_NAME).map(|c| c.value().to_string()) {
        // The cookie is removed either way, the provider session just expires.
        if let Err(e) = ctx.auth.sign_out(&token).await {
            tracing::warn!(error = %e, "could not revoke session");
        }
    }

    jar.remove(Cookie::build(COOKIE_NAME).path("/"))
}

async fn me(
    State(ctx): State<App>,
    MaybeAuthUser(identity): MaybeAuthUser,
) -> Json<IsAuth> {
    let identity = match identity {
        Ok(identity) => identity,
        Err(_) => {
            return Json(IsAuth {
                is_auth: false,
                identity: None,
                confirmation_required: false,
            });
        }
    };

    let profile = profile_for_session(&ctx, &identity).await;
    Json(IsAuth {
        is_auth: true,
        identity: Some(IdentityView::new(&identity, profile.as_ref())),
        confirmation_required: false,
    })
}
