use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub reset_ttl_minutes: i64,
}

/// Bootstrap administrator credentials. The admin is not a user row; it only
/// manages the roster and the data file.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub session: SessionConfig,
    pub admin: AdminConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_path = PathBuf::from(
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "glicotrack.db".into()),
        );
        let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = std::env::var("APP_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(5000);

        let session = SessionConfig {
            secret: std::env::var("SESSION_SECRET").unwrap_or_else(|_| "dev-secret-key".into()),
            issuer: std::env::var("SESSION_ISSUER").unwrap_or_else(|_| "glicotrack".into()),
            audience: std::env::var("SESSION_AUDIENCE")
                .unwrap_or_else(|_| "glicotrack-users".into()),
            ttl_minutes: std::env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(12 * 60),
            reset_ttl_minutes: std::env::var("SESSION_RESET_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(15),
        };

        let admin = AdminConfig {
            username: std::env::var("ADMIN_USERNAME").unwrap_or_else(|_| "adm".into()),
            password: std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "adm".into()),
        };

        Ok(Self {
            database_path,
            host,
            port,
            session,
            admin,
        })
    }
}
