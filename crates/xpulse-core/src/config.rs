use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

pub const DEFAULT_API_BASE_URL: &str = "https://api.twitterapi.io/twitter";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can pass a `HashMap`
/// lookup instead of mutating real env vars.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
    };

    let or_default = |var: &str, default: &str| -> String {
        optional(var).unwrap_or_else(|| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_positive_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let value = or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value == 0 {
            return Err(invalid(var, "must be greater than zero".to_string()));
        }
        Ok(value)
    };

    let env = parse_environment(&or_default("XPULSE_ENV", "development"));
    let log_level = or_default("XPULSE_LOG_LEVEL", "info");

    let database_url = optional("DATABASE_URL");
    let api_key = optional("XPULSE_API_KEY");
    let api_base_url = or_default("XPULSE_API_BASE_URL", DEFAULT_API_BASE_URL);
    if url::Url::parse(&api_base_url).is_err() {
        return Err(invalid(
            "XPULSE_API_BASE_URL",
            format!("not a valid URL: {api_base_url}"),
        ));
    }

    let request_timeout_secs = parse_u64("XPULSE_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("XPULSE_USER_AGENT", "xpulse/0.1 (content-ingestion)");
    let max_retries = parse_u32("XPULSE_MAX_RETRIES", "3")?;
    let retry_backoff_base_ms = parse_u64("XPULSE_RETRY_BACKOFF_BASE_MS", "1000")?;
    let page_delay_ms = parse_u64("XPULSE_PAGE_DELAY_MS", "0")?;

    let batch_max_size = parse_positive_usize("XPULSE_BATCH_MAX_SIZE", "10")?;
    let batch_max_concurrent = parse_positive_usize("XPULSE_BATCH_MAX_CONCURRENT", "3")?;
    let batch_delay_ms = parse_u64("XPULSE_BATCH_DELAY_MS", "1000")?;
    let max_batch_urls = parse_positive_usize("XPULSE_MAX_BATCH_URLS", "100")?;

    let db_max_connections = parse_u32("XPULSE_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("XPULSE_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("XPULSE_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        api_key,
        api_base_url,
        request_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_base_ms,
        page_delay_ms,
        batch_max_size,
        batch_max_concurrent,
        batch_delay_ms,
        max_batch_urls,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn parse_environment_variants() {
        assert_eq!(parse_environment("development"), Environment::Development);
        assert_eq!(parse_environment("test"), Environment::Test);
        assert_eq!(parse_environment("production"), Environment::Production);
        assert_eq!(parse_environment("unknown"), Environment::Development);
    }

    #[test]
    fn build_app_config_succeeds_with_empty_env() {
        let map: HashMap<&str, &str> = HashMap::new();
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.env, Environment::Development);
        assert!(cfg.database_url.is_none());
        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.request_timeout_secs, 30);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.retry_backoff_base_ms, 1000);
        assert_eq!(cfg.page_delay_ms, 0);
        assert_eq!(cfg.batch_max_size, 10);
        assert_eq!(cfg.batch_max_concurrent, 3);
        assert_eq!(cfg.batch_delay_ms, 1000);
        assert_eq!(cfg.max_batch_urls, 100);
        assert_eq!(cfg.db_max_connections, 10);
        assert_eq!(cfg.db_min_connections, 1);
        assert_eq!(cfg.db_acquire_timeout_secs, 10);
    }

    #[test]
    fn dotenv_file_values_reach_the_config() {
        let file = "# local overrides\nXPULSE_API_KEY=from-dotenv\nXPULSE_BATCH_MAX_SIZE=7\n";
        let pairs: Vec<(String, String)> = dotenvy::from_read_iter(file.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();
        let map: HashMap<&str, &str> = pairs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("from-dotenv"));
        assert_eq!(cfg.batch_max_size, 7);
    }

    #[test]
    fn blank_optional_values_are_treated_as_unset() {
        let mut map = HashMap::new();
        map.insert("DATABASE_URL", "  ");
        map.insert("XPULSE_API_KEY", "");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert!(cfg.database_url.is_none());
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let mut map = HashMap::new();
        map.insert("XPULSE_ENV", "production");
        map.insert("XPULSE_API_KEY", "secret");
        map.insert("XPULSE_BATCH_MAX_SIZE", "25");
        map.insert("XPULSE_BATCH_MAX_CONCURRENT", "2");
        map.insert("XPULSE_BATCH_DELAY_MS", "2000");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.env, Environment::Production);
        assert_eq!(cfg.api_key.as_deref(), Some("secret"));
        assert_eq!(cfg.batch_max_size, 25);
        assert_eq!(cfg.batch_max_concurrent, 2);
        assert_eq!(cfg.batch_delay_ms, 2000);
    }

    #[test]
    fn invalid_number_names_the_variable() {
        let mut map = HashMap::new();
        map.insert("XPULSE_REQUEST_TIMEOUT_SECS", "soon");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "XPULSE_REQUEST_TIMEOUT_SECS"),
            "expected InvalidEnvVar(XPULSE_REQUEST_TIMEOUT_SECS), got: {result:?}"
        );
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut map = HashMap::new();
        map.insert("XPULSE_BATCH_MAX_CONCURRENT", "0");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "XPULSE_BATCH_MAX_CONCURRENT"),
            "got: {result:?}"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let mut map = HashMap::new();
        map.insert("XPULSE_API_BASE_URL", "not a url");
        let result = build_app_config(lookup_from_map(&map));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "XPULSE_API_BASE_URL"
        ));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut map = HashMap::new();
        map.insert("XPULSE_API_KEY", "super-secret-key");
        map.insert("DATABASE_URL", "postgres://user:pw@localhost/db");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("super-secret-key"));
        assert!(!debug.contains("user:pw"));
        assert!(debug.contains("[redacted]"));
    }
}
