/// Configuration for the API server
///
/// Loaded from environment variables (a `.env` file is read first when
/// present).
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `JWT_SECRET`: session signing key, at least 32 characters (required)
/// - `API_HOST`: host to bind to (default: 0.0.0.0)
/// - `API_PORT`: port to bind to (default: 8080)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `CORS_ORIGINS`: comma-separated origins, `*` for any (default: `*`)
/// - `PRODUCTION`: `true` enables HSTS and `Secure` cookies (default: false)
/// - `SESSION_COOKIE_NAME`: session cookie name (default: churchflow_session)
/// - `PUBLIC_RATE_LIMIT_PER_MINUTE`: public form submissions per client IP
///   (default: 10)
/// - `TRUST_FORWARDED_FOR`: `true` when every request arrives through a
///   reverse proxy that appends `X-Forwarded-For` (default: false)
///
/// # Example
///
/// ```no_run
/// use churchflow_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_SESSION_COOKIE: &str = "churchflow_session";
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `["*"]` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS, secure cookies)
    pub production: bool,

    /// Public form submissions allowed per client per minute
    pub public_rate_limit_per_minute: u32,

    /// Identify clients by the proxy-appended `X-Forwarded-For` hop
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HS256 signing key
    ///
    /// Keep it secret; generate with `openssl rand -hex 32`.
    #[serde(skip_serializing)]
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,

    /// Adds the `Secure` attribute to the cookie
    pub secure: bool,
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Fails when a required variable is missing, a number does not parse,
    /// or `JWT_SECRET` is shorter than 32 characters.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            anyhow::bail!("JWT_SECRET must be at least {} characters long", MIN_JWT_SECRET_LENGTH);
        }

        let cors_origins = parse_origins(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()));
        let production = env::var("PRODUCTION").map(|v| parse_bool(&v)).unwrap_or(false);

        let cookie_name = env::var("SESSION_COOKIE_NAME")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_string());

        let public_rate_limit_per_minute = env::var("PUBLIC_RATE_LIMIT_PER_MINUTE")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;
        let trust_forwarded_for = env::var("TRUST_FORWARDED_FOR")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
                production,
                public_rate_limit_per_minute,
                trust_forwarded_for,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig { secret: jwt_secret },
            session: SessionConfig {
                cookie_name,
                secure: production,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Settings for tests and local tooling
    pub fn for_tests(database_url: impl Into<String>) -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
                production: false,
                public_rate_limit_per_minute: 10,
                trust_forwarded_for: false,
            },
            database: DatabaseConfig {
                url: database_url.into(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: "test-secret-key-at-least-32-bytes-long".to_string(),
            },
            session: SessionConfig {
                cookie_name: DEFAULT_SESSION_COOKIE.to_string(),
                secure: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        let mut config = Config::for_tests("postgresql://localhost/test");
        config.api.port = 8080;
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("https://a.org, https://b.org ,"),
            vec!["https://a.org".to_string(), "https://b.org".to_string()]
        );
        assert_eq!(parse_origins("*"), vec!["*".to_string()]);
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" 1 "));
        assert!(parse_bool("YES"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_secret_not_serialized() {
        let json = serde_json::to_string(&Config::for_tests("postgresql://localhost/test")).unwrap();
        assert!(!json.contains("test-secret-key"));
    }
}
