/// Worker configuration
///
/// # Environment Variables
///
/// - `REDIS_URL`: Notification outbox (required)
/// - `OUTBOX_POP_TIMEOUT_SECS`: How long one `BRPOP` waits (default: 5)
/// - `MAIL_SERVER`: SMTP relay host (default: localhost)
/// - `MAIL_PORT`: SMTP port (default: 587)
/// - `MAIL_USERNAME`, `MAIL_PASSWORD`: SMTP credentials, set together or not at all
/// - `MAIL_FROM`: Sender address (required)
/// - `MAIL_STARTTLS`: Upgrade the connection with STARTTLS (default: true)

use std::env;
use std::time::Duration;

/// Default `BRPOP` wait
pub const DEFAULT_POP_TIMEOUT_SECS: u64 = 5;

/// Default submission port
pub const DEFAULT_MAIL_PORT: u16 = 587;

/// Complete worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Redis outbox URL
    pub redis_url: String,

    /// Wait per outbox poll; also bounds shutdown latency
    pub pop_timeout: Duration,

    pub smtp: SmtpConfig,
}

/// SMTP relay configuration
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,

    /// Sender mailbox, e.g. `taskhub <noreply@example.com>`
    pub from: String,

    pub starttls: bool,
}

impl SmtpConfig {
    /// Username and password when both are configured
    pub fn credentials(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        }
    }
}

impl WorkerConfig {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value can't
    /// be parsed.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let redis_url = env::var("REDIS_URL")
            .map_err(|_| anyhow::anyhow!("REDIS_URL environment variable is required"))?;
        let pop_timeout_secs = env::var("OUTBOX_POP_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_POP_TIMEOUT_SECS.to_string())
            .parse::<u64>()?;
        if pop_timeout_secs == 0 {
            anyhow::bail!("OUTBOX_POP_TIMEOUT_SECS must be at least 1");
        }

        let server = env::var("MAIL_SERVER").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("MAIL_PORT")
            .unwrap_or_else(|_| DEFAULT_MAIL_PORT.to_string())
            .parse::<u16>()?;
        let username = env::var("MAIL_USERNAME").ok().filter(|v| !v.is_empty());
        let password = env::var("MAIL_PASSWORD").ok().filter(|v| !v.is_empty());
        if username.is_some() != password.is_some() {
            anyhow::bail!("MAIL_USERNAME and MAIL_PASSWORD must be set together");
        }
        let from = env::var("MAIL_FROM")
            .map_err(|_| anyhow::anyhow!("MAIL_FROM environment variable is required"))?;
        let starttls = parse_flag(&env::var("MAIL_STARTTLS").unwrap_or_else(|_| "true".into()))?;

        Ok(Self {
            redis_url,
            pop_timeout: Duration::from_secs(pop_timeout_secs),
            smtp: SmtpConfig {
                server,
                port,
                username,
                password,
                from,
                starttls,
            },
        })
    }
}

fn parse_flag(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("Invalid boolean value: {}", other),
    }
}
