use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod enrichment;
pub mod error;
pub mod identity;
pub mod json;
pub mod models;
pub mod project;
pub mod store;

use config::{Env, ServerConfig};
use identity::{Identity, auth_client::AuthClient};
use store::postgrest::PostgrestClient;

#[derive(Clone)]
pub struct App {
    pub config: Arc<ServerConfig>,
    /// Authorized with the anon key. Use [`App::store_for`] inside handlers.
    pub store: PostgrestClient,
    pub auth: AuthClient,
}

impl App {
    pub fn new(config: ServerConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;

        Ok(App {
            store: PostgrestClient::new(http.clone(), &config.supabase, config.request_timeout),
            auth: AuthClient::new(http, &config.supabase, config.request_timeout),
            config: Arc::new(config),
        })
    }

    /// Store client acting as `identity`, so row level security sees the
    /// signed-in user. Anonymous requests use the anon key.
    pub fn store_for(&self, identity: Option<&Identity>) -> PostgrestClient {
        self.store
            .with_access_token(identity.map(|i| i.access_token.as_str()))
    }
}

pub fn router(app: App) -> Router {
    let mut router = Router::<App>::new()
        .nest("/auth", identity::routes::route())
        .nest("/projects", project::routes::route())
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors_layer(&app.config) {
        router = router.layer(cors);
    }

    router.with_state(app)
}

fn cors_layer(config: &ServerConfig) -> Option<CorsLayer> {
    match config.cors_allowed_origin.as_deref() {
        Some(origin) => match HeaderValue::from_str(origin) {
            Ok(origin) => Some(
                CorsLayer::new()
                    .allow_origin(origin)
                    .allow_credentials(true)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE]),
            ),
            Err(e) => {
                tracing::error!(origin, error = %e, "invalid CORS origin, CORS disabled");
                None
            }
        },
        None if config.env == Env::Dev => Some(CorsLayer::permissive()),
        None => None,
    }
}
