use crate::auth::password::PasswordParams;
use std::env;
use std::net::SocketAddr;

#[derive(Clone)]
pub struct Config {
    // Redis
    pub redis_url: String,

    // Server
    pub bind_addr: SocketAddr,
    pub max_body_bytes: usize,

    // Prefix for owner-scoped storage paths
    pub storage_root: String,

    // Sessions
    pub session_ttl_secs: u64,
    pub cookie_secure: bool,

    // Password hashing
    pub password: PasswordParams,

    // Rate limiting
    pub rate_limit_auth_per_min: u32,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("redis_url", &"[REDACTED]")
            .field("bind_addr", &self.bind_addr)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("storage_root", &self.storage_root)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("cookie_secure", &self.cookie_secure)
            .field("password", &self.password)
            .field("rate_limit_auth_per_min", &self.rate_limit_auth_per_min)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Attempt to load .env file, but don't fail if it doesn't exist
        // (env vars may be set directly in production)
        let _ = dotenvy::dotenv();

        let redis_url =
            env::var("REDIS_URL").map_err(|_| ConfigError::MissingVar("REDIS_URL".to_string()))?;

        // Server
        let bind_addr_str = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_addr = bind_addr_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::ParseError("BIND_ADDR".to_string(), e.to_string()))?;
        let max_body_bytes = parse_env_or_default("MAX_BODY_BYTES", 65_536)?;

        let storage_root = env::var("STORAGE_ROOT").unwrap_or_else(|_| "files".to_string());
        let storage_root = storage_root.trim_end_matches('/').to_string();
        if storage_root.is_empty() {
            return Err(ConfigError::InvalidValue(
                "STORAGE_ROOT".to_string(),
                "cannot be empty".to_string(),
            ));
        }

        // Sessions
        let session_ttl_secs: u64 = parse_env_or_default("SESSION_TTL_SECS", 86_400)?;
        if session_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_TTL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let cookie_secure = parse_env_or_default("COOKIE_SECURE", true)?;

        // Password hashing (Argon2id, OWASP baseline by default)
        let password = PasswordParams {
            memory_kib: parse_env_or_default("HASH_MEMORY_KIB", 19_456)?,
            iterations: parse_env_or_default("HASH_ITERATIONS", 2)?,
            parallelism: parse_env_or_default("HASH_PARALLELISM", 1)?,
        };
        password
            .validate()
            .map_err(|e| ConfigError::InvalidValue("HASH_*".to_string(), e))?;

        // Rate limiting
        let rate_limit_auth_per_min = parse_env_or_default("RATE_LIMIT_AUTH_PER_MIN", 10)?;

        Ok(Config {
            redis_url,
            bind_addr,
            max_body_bytes,
            storage_root,
            session_ttl_secs,
            cookie_secure,
            password,
            rate_limit_auth_per_min,
        })
    }
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}
