/*
 * Responsibility
 * - Load settings from the environment (.env supported)
 * - Validate them; missing/invalid values fail startup
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

// HS256 secrets shorter than the hash output weaken the MAC.
const MIN_SECRET_BYTES: usize = 32;

/// Tolerated issuer clock skew for `iat`. Never applied to `exp`.
pub const DEFAULT_ACCESS_TOKEN_LEEWAY_SECONDS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: Option<String>) -> Self {
        match value
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,

    // Ownership oracle
    pub database_url: String,
    pub ownership_function: String,

    // Refresh store
    pub cache_url: String,
    pub cache_timeout: Duration,
    pub refresh_token_prefix: String,

    // Access tokens
    pub access_jwt_secret: Vec<u8>,
    pub auth_issuer: String,
    pub auth_audience: String,
    pub access_token_ttl_seconds: u64,
    pub access_token_leeway_seconds: u64,

    // Refresh tokens
    pub refresh_token_ttl_seconds: u64,
    pub refresh_token_rotation: bool,
    pub refresh_token_cookie: Option<String>,

    pub allow_direct_issue: bool,
}

/// Key lookup over an environment-like source.
struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key)),
            None => Ok(default),
        }
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(key))
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup (`from_env` passes the process environment).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let port: u16 = vars.parse_or("PORT", 3000)?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(vars.get("APP_ENV"));

        let cors_allowed_origins = vars
            .or("CORS_ALLOWED_ORIGINS", "")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let request_timeout = Duration::from_secs(vars.parse_or("REQUEST_TIMEOUT_SECONDS", 30)?);
        let max_body_bytes = vars.parse_or("MAX_BODY_BYTES", 1024 * 1024)?;

        let database_url = vars.required("DATABASE_URL")?;
        let ownership_function = vars.or("OWNERSHIP_FUNCTION", "user_owns_all");

        let cache_url = vars.or("CACHE_URL", "redis://127.0.0.1:6379");
        let cache_timeout = Duration::from_millis(vars.parse_or("CACHE_TIMEOUT_MS", 2000)?);
        let refresh_token_prefix = vars.or("REFRESH_TOKEN_PREFIX", "refresh");

        let access_jwt_secret = vars.required("ACCESS_JWT_SECRET")?.into_bytes();
        if access_jwt_secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::Invalid("ACCESS_JWT_SECRET"));
        }

        let auth_issuer = vars.required("AUTH_ISSUER")?;
        let auth_audience = vars.required("AUTH_AUDIENCE")?;

        let access_token_ttl_seconds = vars.parse_or("ACCESS_TOKEN_TTL_SECONDS", 600)?; // 10 min
        let access_token_leeway_seconds = vars.parse_or(
            "ACCESS_TOKEN_LEEWAY_SECONDS",
            DEFAULT_ACCESS_TOKEN_LEEWAY_SECONDS,
        )?;

        let refresh_token_ttl_seconds = vars.parse_or("REFRESH_TOKEN_TTL_SECONDS", 2_592_000)?; // 30 days
        let refresh_token_rotation = vars.parse_or("REFRESH_TOKEN_ROTATION", true)?;
        let refresh_token_cookie = vars
            .get("REFRESH_TOKEN_COOKIE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let allow_direct_issue = vars.parse_or("ALLOW_DIRECT_ISSUE", !app_env.is_production())?;

        if access_token_ttl_seconds == 0 {
            return Err(ConfigError::Invalid("ACCESS_TOKEN_TTL_SECONDS"));
        }
        if refresh_token_ttl_seconds == 0 {
            return Err(ConfigError::Invalid("REFRESH_TOKEN_TTL_SECONDS"));
        }

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            request_timeout,
            max_body_bytes,
            database_url,
            ownership_function,
            cache_url,
            cache_timeout,
            refresh_token_prefix,
            access_jwt_secret,
            auth_issuer,
            auth_audience,
            access_token_ttl_seconds,
            access_token_leeway_seconds,
            refresh_token_ttl_seconds,
            refresh_token_rotation,
            refresh_token_cookie,
            allow_direct_issue,
        })
    }

    /// `CACHE_URL=memory://` selects the in-process cache.
    pub fn uses_memory_cache(&self) -> bool {
        self.cache_url.starts_with("memory://")
    }
}
