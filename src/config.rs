use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
    pub cookie_ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    /// Base URL advertised in password-reset emails.
    pub public_url: String,
    /// Development mode returns verbose error bodies.
    pub development: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(90 * 24 * 60),
            cookie_ttl_days: std::env::var("JWT_COOKIE_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(90),
        };
        let public_url = std::env::var("PUBLIC_URL").unwrap_or_else(|_| {
            format!(
                "http://{}:{}",
                std::env::var("APP_HOST").unwrap_or_else(|_| "localhost".into()),
                std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
            )
        });
        let development = std::env::var("APP_ENV")
            .map(|v| v == "development")
            .unwrap_or(true);
        Ok(Self {
            database_url,
            jwt,
            public_url,
            development,
        })
    }
}
