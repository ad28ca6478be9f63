use std::fmt;

use anyhow::Context;
use tracing::warn;

/// Placeholder secret shipped in sample env files. Anyone who has seen it can
/// forge tokens, so it is never accepted in production.
pub const PLACEHOLDER_JWT_SECRET: &str = "your_jwt_secret_key";

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    pub environment: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
        };
        let port = std::env::var("APP_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse::<u16>()
            .context("APP_PORT must be a valid port number")?;
        let config = Self {
            database_url,
            jwt,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(10),
            environment: std::env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
        };
        config.check_jwt_secret()?;
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Refuses to run without a usable signing secret.
    pub fn check_jwt_secret(&self) -> anyhow::Result<()> {
        if self.jwt.secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }
        if self.jwt.secret == PLACEHOLDER_JWT_SECRET {
            if self.is_production() {
                anyhow::bail!("JWT_SECRET is set to the placeholder value; refusing to start in production");
            }
            warn!("JWT_SECRET is set to the placeholder value; tokens are forgeable, do not deploy this configuration");
        }
        Ok(())
    }
}
