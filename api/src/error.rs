use std::collections::HashMap;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::Value;

use crate::{
    identity::{AuthenticationError, auth_client::AuthClientError},
    store::{StoreError, StoreErrorKind},
};

/// An error caused by the request itself, answered with its own status code
/// and its display text as the message.
pub trait ApiRequestError: std::fmt::Display {
    fn status_code(&self) -> StatusCode;
}

#[derive(Debug)]
pub enum ServerError {
    Store(StoreError),
    Auth(AuthClientError),
}

impl Serialize for ServerError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        use serde::ser::SerializeMap;
        let message = match self {
            ServerError::Store(e) => e.to_string(),
            ServerError::Auth(e) => e.to_string(),
        };
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("message", &message)?;
        map.end()
    }
}

impl ServerError {
    fn status_and_code(&self) -> (StatusCode, &'static str, &'static str) {
        match self {
            ServerError::Store(e) => match e.kind {
                StoreErrorKind::RelationNotFound => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "TABLE_NOT_FOUND",
                    "Table not found. Please check database setup.",
                ),
                StoreErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", "Not found"),
                StoreErrorKind::Timeout => (
                    StatusCode::GATEWAY_TIMEOUT,
                    "STORE_TIMEOUT",
                    "The database did not respond in time",
                ),
                _ => (StatusCode::BAD_GATEWAY, "STORE_ERR", "Database error"),
            },
            ServerError::Auth(AuthClientError::Timeout) => (
                StatusCode::GATEWAY_TIMEOUT,
                "AUTH_TIMEOUT",
                "The auth provider did not respond in time",
            ),
            ServerError::Auth(_) => (StatusCode::BAD_GATEWAY, "AUTH_ERR", "Auth provider error"),
        }
    }
}

pub enum AppError {
    ServerError {
        error: ServerError,

        #[cfg(debug_assertions)]
        backtrace: backtrace::Backtrace,
    },
    RequestError {
        msg: String,
        status: StatusCode,
    },
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::ServerError { error, .. } => f.debug_tuple("ServerError").field(error).finish(),
            AppError::RequestError { msg, status } => f
                .debug_struct("RequestError")
                .field("msg", msg)
                .field("status", status)
                .finish(),
        }
    }
}

impl AppError {
    fn server(error: ServerError) -> Self {
        AppError::ServerError {
            error,
            #[cfg(debug_assertions)]
            backtrace: backtrace::Backtrace::new(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ServerError { error, .. } => error.status_and_code().0,
            AppError::RequestError { status, .. } => *status,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    msg: Option<String>,

    #[cfg(debug_assertions)]
    #[serde(skip_serializing_if = "Option::is_none")]
    debug_info: Option<HashMap<&'static str, Value>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code();

        let error_response = match self {
            AppError::ServerError {
                error,
                #[cfg(debug_assertions)]
                backtrace,
            } => {
                let (_, code, msg) = error.status_and_code();
                if status_code.is_server_error() {
                    tracing::error!(error = ?error, "upstream request failed");
                }

                ErrorResponse {
                    code: code.into(),
                    msg: Some(msg.into()),
                    #[cfg(debug_assertions)]
                    debug_info: Some(HashMap::from([
                        (
                            "backtrace",
                            serde_json::to_value(filter_backtrace(&backtrace)).unwrap_or_default(),
                        ),
                        ("error", serde_json::to_value(&error).unwrap_or_default()),
                    ])),
                }
            }
            AppError::RequestError { msg, .. } => ErrorResponse {
                code: "REQUEST_ERR".into(),
                msg: Some(msg),
                #[cfg(debug_assertions)]
                debug_info: None,
            },
        };

        (status_code, Json(error_response)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::server(ServerError::Store(e))
    }
}

impl From<AuthClientError> for AppError {
    fn from(e: AuthClientError) -> Self {
        match e {
            AuthClientError::Rejected { status, message } if status.is_client_error() => {
                AppError::RequestError {
                    msg: message,
                    status,
                }
            }
            e => AppError::server(ServerError::Auth(e)),
        }
    }
}

impl From<AuthenticationError> for AppError {
    fn from(e: AuthenticationError) -> Self {
        AppError::RequestError {
            status: e.status_code(),
            msg: e.to_string(),
        }
    }
}

impl From<(&'static str, StatusCode)> for AppError {
    fn from((msg, status): (&'static str, StatusCode)) -> Self {
        AppError::RequestError {
            msg: msg.into(),
            status,
        }
    }
}

#[cfg(debug_assertions)]
#[derive(Serialize, Debug)]
struct FrameInfo {
    name: String,
    loc: String,
}

#[cfg(debug_assertions)]
fn filter_backtrace(backtrace: &backtrace::Backtrace) -> Vec<FrameInfo> {
    const MODULE_PREFIX: &str = concat!(env!("CARGO_CRATE_NAME"), "::");
    let mut frames_info: Vec<FrameInfo> = Vec::new();

    for frame in backtrace.frames() {
        for symbol in frame.symbols() {
            if let (Some(name), Some(filename), Some(lineno)) = (
                symbol.name().map(|n| n.to_string()),
                symbol.filename(),
                symbol.lineno(),
            ) {
                if name.contains(MODULE_PREFIX) {
                    frames_info.push(FrameInfo {
                        name,
                        loc: format!("{}:{}", filename.display(), lineno),
                    });
                }
            }
        }
    }

    frames_info
}
