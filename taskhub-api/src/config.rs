/// Configuration management for the API server
///
/// Loads configuration from environment variables (and `.env` in
/// development) into a typed struct.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma-separated allowed origins (default: `*`)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: Token signing key, at least 32 characters (required)
/// - `ACCESS_TOKEN_EXPIRE_MINUTES`: Token lifetime (default: 30)
/// - `REDIS_URL`: Notification outbox; notifications are only logged when unset
/// - `NOTIFICATION_QUEUE_CAPACITY`: In-process queue size (default: 1024)
/// - `ADMIN_USERNAME`, `ADMIN_EMAIL`, `ADMIN_PASSWORD`: optional bootstrap admin
///
/// # Example
///
/// ```no_run
/// use taskhub_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use taskhub_shared::auth::jwt::DEFAULT_EXPIRE_MINUTES;
use taskhub_shared::notify::DEFAULT_QUEUE_CAPACITY;
use taskhub_shared::service::AdminSeed;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub notifications: NotificationConfig,

    /// Seed admin ensured at start-up
    pub admin: Option<AdminSeed>,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for token signing
    ///
    /// Must be at least 32 bytes. Generate with: `openssl rand -hex 32`
    pub secret: String,

    /// Access token lifetime in minutes
    pub expire_minutes: i64,
}

/// Notification pipeline configuration
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// Redis outbox URL
    pub redis_url: Option<String>,

    /// Capacity of the in-process queue
    pub queue_capacity: usize,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value can't
    /// be parsed.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;
        let cors_origins = parse_origins(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".into()));

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }
        let expire_minutes = env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
            .unwrap_or_else(|_| DEFAULT_EXPIRE_MINUTES.to_string())
            .parse::<i64>()?;
        if expire_minutes <= 0 {
            anyhow::bail!("ACCESS_TOKEN_EXPIRE_MINUTES must be positive");
        }

        let redis_url = env::var("REDIS_URL").ok().filter(|url| !url.is_empty());
        let queue_capacity = env::var("NOTIFICATION_QUEUE_CAPACITY")
            .unwrap_or_else(|_| DEFAULT_QUEUE_CAPACITY.to_string())
            .parse::<usize>()?;

        let admin = match (
            env::var("ADMIN_USERNAME"),
            env::var("ADMIN_EMAIL"),
            env::var("ADMIN_PASSWORD"),
        ) {
            (Ok(username), Ok(email), Ok(password)) => Some(AdminSeed {
                username,
                email,
                password,
            }),
            (Err(_), Err(_), Err(_)) => None,
            _ => anyhow::bail!(
                "ADMIN_USERNAME, ADMIN_EMAIL and ADMIN_PASSWORD must be set together"
            ),
        };

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                expire_minutes,
            },
            notifications: NotificationConfig {
                redis_url,
                queue_capacity,
            },
            admin,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Token lifetime as a duration
    pub fn token_lifetime(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.jwt.expire_minutes)
    }

    /// Configuration for tests, with no external services
    pub fn for_tests(secret: &str) -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 1,
            },
            jwt: JwtConfig {
                secret: secret.to_string(),
                expire_minutes: DEFAULT_EXPIRE_MINUTES,
            },
            notifications: NotificationConfig {
                redis_url: None,
                queue_capacity: 16,
            },
            admin: None,
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}
