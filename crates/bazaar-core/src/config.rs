use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

const MIN_JWT_SECRET_LEN: usize = 32;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
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
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Parsing and validation are decoupled from the process environment so tests
/// can drive them with a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
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

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_i64 = |var: &str, default: &str| -> Result<i64, ConfigError> {
        or_default(var, default)
            .parse::<i64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;
    let jwt_secret = require("BAZAAR_JWT_SECRET")?;
    if jwt_secret.len() < MIN_JWT_SECRET_LEN {
        return Err(invalid(
            "BAZAAR_JWT_SECRET",
            format!("must be at least {MIN_JWT_SECRET_LEN} characters"),
        ));
    }

    let env = parse_environment(&or_default("BAZAAR_ENV", "development"))?;

    let bind_addr = parse_addr("BAZAAR_BIND_ADDR", "0.0.0.0:5000")?;
    let log_level = or_default("BAZAAR_LOG_LEVEL", "info");

    let session_ttl_days = parse_i64("BAZAAR_SESSION_TTL_DAYS", "7")?;
    if session_ttl_days < 1 {
        return Err(invalid(
            "BAZAAR_SESSION_TTL_DAYS",
            "must be at least 1".to_string(),
        ));
    }
    let cookie_secure = parse_bool(&or_default("BAZAAR_COOKIE_SECURE", "false"))
        .ok_or_else(|| invalid("BAZAAR_COOKIE_SECURE", "expected true or false".to_string()))?;

    let cors_origin = or_default("BAZAAR_CORS_ORIGIN", "http://localhost:3000");
    let public_url = or_default("BAZAAR_PUBLIC_URL", "http://localhost:5000")
        .trim_end_matches('/')
        .to_string();
    let upload_dir = PathBuf::from(or_default("BAZAAR_UPLOAD_DIR", "./uploads"));
    let upload_max_bytes = parse_usize("BAZAAR_UPLOAD_MAX_BYTES", "5242880")?;
    let catalog_path = PathBuf::from(or_default(
        "BAZAAR_CATALOG_PATH",
        "./config/products.yaml",
    ));

    let admin_username = or_default("BAZAAR_ADMIN_USERNAME", "admin");
    let admin_email = lookup("BAZAAR_ADMIN_EMAIL")
        .ok()
        .filter(|v| !v.trim().is_empty());
    let admin_password = lookup("BAZAAR_ADMIN_PASSWORD")
        .ok()
        .filter(|v| !v.is_empty());

    let db_max_connections = parse_u32("BAZAAR_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("BAZAAR_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("BAZAAR_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        jwt_secret,
        session_ttl_days,
        cookie_secure,
        cors_origin,
        public_url,
        upload_dir,
        upload_max_bytes,
        catalog_path,
        admin_username,
        admin_email,
        admin_password,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for anything other than
/// `development`, `test` or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "BAZAAR_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
