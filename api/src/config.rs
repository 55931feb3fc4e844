use std::time::Duration;

use crate::project::comment::thread::OrphanPolicy;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Env {
    Dev,
    Staging,
    Production,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub env: Env,
    pub port: u16,
    pub supabase: SupabaseConfig,
    pub request_timeout: Duration,
    pub orphan_policy: OrphanPolicy,
    pub cors_allowed_origin: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    pub anon_key: String,
}

fn var(key: &str) -> Result<Option<String>, String> {
    match std::env::var(key) {
        Ok(env) => Ok(Some(env)),
        Err(e) => match e {
            std::env::VarError::NotPresent => {
                tracing::debug!("Missing environment variable `{key}`");
                Ok(None)
            }
            std::env::VarError::NotUnicode(_) => Err(format!(
                "Could not get the environment variable `{key}` due to unicode error"
            )),
        },
    }
}

fn required_var(key: &str) -> String {
    match var(key) {
        Ok(Some(val)) => val,
        Ok(None) => {
            tracing::error!("Environment variable `{key}` is required");
            std::process::exit(1)
        }
        Err(e) => {
            tracing::error!(
                "Environment variable `{key}` is required, but could not retrieve: {e}"
            );
            std::process::exit(1)
        }
    }
}

/// Reads an optional variable and parses it, falling back to `default` when
/// the variable is absent or malformed.
fn parsed_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    match var(key) {
        Ok(Some(raw)) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Environment variable `{key}` has an invalid value `{raw}`, using default");
            default
        }),
        _ => default,
    }
}

fn parse_env(raw: Option<&str>) -> Env {
    match raw {
        Some("dev") => Env::Dev,
        Some("staging") => Env::Staging,
        Some("production") => Env::Production,
        _ => Env::Dev,
    }
}

impl ServerConfig {
    pub fn new_from_env() -> Self {
        let supabase = SupabaseConfig {
            url: required_var("SUPABASE_URL").trim_end_matches('/').to_string(),
            anon_key: required_var("SUPABASE_ANON_KEY"),
        };

        let timeout_secs = parsed_var("REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT.as_secs());

        ServerConfig {
            env: parse_env(var("ENVIRONMENT").ok().flatten().as_deref()),
            port: parsed_var("PORT", DEFAULT_PORT),
            supabase,
            request_timeout: Duration::from_secs(timeout_secs.max(1)),
            orphan_policy: parsed_var("COMMENT_ORPHAN_POLICY", OrphanPolicy::default()),
            cors_allowed_origin: var("CORS_ALLOWED_ORIGIN").ok().flatten(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.env == Env::Production
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_environment_defaults_to_dev() {
        assert_eq!(parse_env(Some("production")), Env::Production);
        assert_eq!(parse_env(Some("staging")), Env::Staging);
        assert_eq!(parse_env(Some("qa")), Env::Dev);
        assert_eq!(parse_env(None), Env::Dev);
    }

    #[test]
    fn orphan_policy_parses_from_config_value() {
        assert_eq!("drop".parse::<OrphanPolicy>(), Ok(OrphanPolicy::Drop));
        assert_eq!("promote".parse::<OrphanPolicy>(), Ok(OrphanPolicy::PromoteToRoot));
        assert!("keep".parse::<OrphanPolicy>().is_err());
    }
}
