use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub jwt_secret: String,
    pub session_ttl_days: i64,
    pub cookie_secure: bool,
    pub cors_origin: String,
    pub public_url: String,
    pub upload_dir: PathBuf,
    pub upload_max_bytes: usize,
    pub catalog_path: PathBuf,
    pub admin_username: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl AppConfig {
    /// Admin credentials to seed at startup, present only when both halves are configured.
    #[must_use]
    pub fn admin_seed(&self) -> Option<(&str, &str)> {
        match (self.admin_email.as_deref(), self.admin_password.as_deref()) {
            (Some(email), Some(password)) => Some((email, password)),
            _ => None,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("jwt_secret", &"[redacted]")
            .field("session_ttl_days", &self.session_ttl_days)
            .field("cookie_secure", &self.cookie_secure)
            .field("cors_origin", &self.cors_origin)
            .field("public_url", &self.public_url)
            .field("upload_dir", &self.upload_dir)
            .field("upload_max_bytes", &self.upload_max_bytes)
            .field("catalog_path", &self.catalog_path)
            .field("admin_username", &self.admin_username)
            .field("admin_email", &self.admin_email)
            .field(
                "admin_password",
                &self.admin_password.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
