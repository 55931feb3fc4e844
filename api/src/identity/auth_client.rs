use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use uuid::Uuid;

use crate::config::SupabaseConfig;

use super::Identity;

const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Client for the hosted auth service (`/auth/v1`).
#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

#[derive(thiserror::Error, Debug)]
pub enum AuthClientError {
    #[error("Auth provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Auth provider did not answer in time")]
    Timeout,

    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("Unexpected auth provider response: {0}")]
    Decode(String),
}

impl AuthClientError {
    /// The provider understood the request and refused it, e.g. bad
    /// credentials or an expired token.
    pub fn is_rejection(&self) -> bool {
        matches!(self, AuthClientError::Rejected { status, .. } if status.is_client_error())
    }
}

#[derive(Deserialize)]
struct GoTrueUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    user_metadata: UserMetadata,
}

#[derive(Deserialize, Default)]
struct UserMetadata {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct GoTrueSession {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    user: GoTrueUser,
}

fn default_expires_in() -> i64 {
    DEFAULT_EXPIRES_IN
}

// Sign-up answers with a session when email confirmation is off, and with
// the bare user otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpBody {
    Session(GoTrueSession),
    User(GoTrueUser),
}

#[derive(Deserialize, Default)]
struct GoTrueErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl GoTrueUser {
    fn into_identity(self, access_token: String) -> Identity {
        Identity {
            id: self.id,
            email: self.email,
            full_name: self.user_metadata.full_name,
            avatar_url: self.user_metadata.avatar_url,
            access_token,
        }
    }
}

impl GoTrueSession {
    fn into_auth_session(self) -> AuthSession {
        AuthSession {
            expires_in: self.expires_in,
            identity: self.user.into_identity(self.access_token),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub identity: Identity,
    /// Seconds until the access token expires.
    pub expires_in: i64,
}

#[derive(Debug)]
pub enum SignUpOutcome {
    SignedIn(AuthSession),
    ConfirmationRequired { id: Uuid, email: Option<String> },
}

impl AuthClient {
    pub fn new(http: reqwest::Client, config: &SupabaseConfig, timeout: Duration) -> Self {
        AuthClient {
            http,
            base_url: format!("{}/auth/v1", config.url),
            api_key: config.anon_key.clone(),
            timeout,
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http
            .post(format!("{}/{}", self.base_url, path))
            .header("apikey", &self.api_key)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<SignUpOutcome, AuthClientError> {
        let req = self.post("signup").json(&json!({
            "email": email,
            "password": password,
            "data": { "full_name": full_name },
        }));

        Ok(match self.call::<SignUpBody>(req).await? {
            SignUpBody::Session(s) => SignUpOutcome::SignedIn(s.into_auth_session()),
            SignUpBody::User(u) => SignUpOutcome::ConfirmationRequired {
                id: u.id,
                email: u.email,
            },
        })
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthClientError> {
        let req = self
            .post("token")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));

        Ok(self.call::<GoTrueSession>(req).await?.into_auth_session())
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthClientError> {
        let req = self.post("logout").bearer_auth(access_token);
        self.send(req).await.map(|_| ())
    }

    pub async fn get_user(&self, access_token: &str) -> Result<Identity, AuthClientError> {
        let req = self
            .http
            .get(format!("{}/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token);

        Ok(self
            .call::<GoTrueUser>(req)
            .await?
            .into_identity(access_token.to_string()))
    }

    async fn call<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, AuthClientError> {
        let body = self.send(req).await?;
        serde_json::from_slice(&body).map_err(|e| AuthClientError::Decode(e.to_string()))
    }

    async fn send(&self, req: RequestBuilder) -> Result<Vec<u8>, AuthClientError> {
        let exchange = async {
            let resp = req.send().await?;
            let status = resp.status();
            let body = resp.bytes().await?;
            Ok::<_, AuthClientError>((status, body))
        };

        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| AuthClientError::Timeout)??;

        if !status.is_success() {
            let message = rejection_message(status, &body);
            tracing::debug!(%status, %message, "auth provider rejected request");
            return Err(AuthClientError::Rejected { status, message });
        }

        Ok(body.to_vec())
    }
}

fn rejection_message(status: StatusCode, body: &[u8]) -> String {
    let parsed: GoTrueErrorBody = serde_json::from_slice(body).unwrap_or_default();
    parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| format!("Auth provider responded with {status}"))
}
