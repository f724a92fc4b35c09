use crate::auth::jwt::JwtConfig;

/// Default multipart body limit for bulk uploads (50 MiB).
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults for local development except the JWT
/// secret, which must always be provided.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Listen port (default: `4000`).
    pub port: u16,
    /// Allowed CORS origins (comma-separated in env).
    pub cors_origins: Vec<String>,
    /// Timeout for JSON endpoints. Report streams and uploads are exempt.
    pub request_timeout_secs: u64,
    /// How long shutdown waits for in-flight jobs.
    pub shutdown_timeout_secs: u64,
    /// Largest accepted bulk upload body.
    pub max_upload_bytes: usize,
    pub import_batch_size: usize,
    pub export_batch_size: usize,
    /// Completed operations older than this are swept.
    pub operation_retention_days: i64,
    /// JWT authentication configuration.
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `HOST`                     | `0.0.0.0`               |
    /// | `PORT`                     | `4000`                  |
    /// | `CORS_ORIGINS`             | `http://localhost:4200` |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `30`                    |
    /// | `MAX_UPLOAD_BYTES`         | `52428800`              |
    /// | `IMPORT_BATCH_SIZE`        | `1000`                  |
    /// | `EXPORT_BATCH_SIZE`        | `1000`                  |
    /// | `OPERATION_RETENTION_DAYS` | `7`                     |
    ///
    /// # Panics
    ///
    /// Panics if a numeric variable does not parse or `JWT_SECRET` is missing.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:4200".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host,
            port: env_or("PORT", 4000),
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 30),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            import_batch_size: env_or("IMPORT_BATCH_SIZE", 1000),
            export_batch_size: env_or("EXPORT_BATCH_SIZE", 1000),
            operation_retention_days: env_or("OPERATION_RETENTION_DAYS", 7),
            jwt: JwtConfig::from_env(),
        }
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + ToString,
{
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{key} must be a valid {}", std::any::type_name::<T>()))
}
