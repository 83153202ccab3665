use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Upper bound for multipart media uploads, in bytes.
    pub media_max_bytes: usize,
    pub development: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://courier.db".into());
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| crate::error::AppError::Config("JWT_SECRET missing".into()))?;
        let media_max_bytes = env::var("MEDIA_MAX_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(25 * 1024 * 1024);
        let development = matches!(
            env::var("APP_ENV").as_deref(),
            Ok("development") | Ok("dev")
        );

        Ok(Self {
            database_url,
            port,
            jwt_secret,
            media_max_bytes,
            development,
        })
    }

    pub fn test_defaults() -> Self {
        Self {
            database_url: "sqlite::memory:".into(),
            port: 3000,
            jwt_secret: "test-secret".into(),
            media_max_bytes: 25 * 1024 * 1024,
            development: true,
        }
    }
}
