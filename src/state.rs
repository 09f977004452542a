use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::AppConfig;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

#[derive(Clone)]
pub struct AppState {
    /// The pool is behind a lock so the admin data-file swap can retire it
    /// atomically; handlers clone the pool out under a read lock.
    db: Arc<RwLock<SqlitePool>>,
    pub config: Arc<AppConfig>,
}

pub async fn open_pool(path: &Path) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("open database at {}", path.display()))?;
    Ok(pool)
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let pool = open_pool(&config.database_path).await?;
        Ok(Self {
            db: Arc::new(RwLock::new(pool)),
            config,
        })
    }

    pub fn from_parts(pool: SqlitePool, config: Arc<AppConfig>) -> Self {
        Self {
            db: Arc::new(RwLock::new(pool)),
            config,
        }
    }

    pub async fn db(&self) -> SqlitePool {
        self.db.read().await.clone()
    }

    /// Replaces the live data file with `data`.
    ///
    /// The upload lands in a temp file next to the live one and is probed as
    /// a SQLite database before anything is touched. The swap itself runs
    /// under the write lock: snapshot the live file to `<path>.bak`, rename
    /// the temp file over it, reopen the pool, run migrations. Any failure
    /// past the snapshot restores the backup, so readers either see the old
    /// store or the complete new one.
    pub async fn replace_database(&self, data: &[u8]) -> anyhow::Result<()> {
        let path = self.config.database_path.clone();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("glicotrack.db");
        let tmp = path.with_file_name(format!("{file_name}.upload-{}", Uuid::new_v4()));

        tokio::fs::write(&tmp, data)
            .await
            .context("write uploaded file")?;

        if let Err(e) = probe_database(&tmp).await {
            tokio::fs::remove_file(&tmp).await.ok();
            return Err(e.context("uploaded file is not a usable SQLite database"));
        }

        let mut guard = self.db.write().await;
        guard.close().await;

        let backup = path.with_file_name(format!("{file_name}.bak"));
        let had_previous = tokio::fs::try_exists(&path).await.unwrap_or(false);
        if had_previous {
            if let Err(e) = tokio::fs::copy(&path, &backup).await {
                tokio::fs::remove_file(&tmp).await.ok();
                *guard = open_pool(&path).await?;
                return Err(anyhow::Error::new(e).context("snapshot current database"));
            }
        }

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            tokio::fs::remove_file(&tmp).await.ok();
            *guard = open_pool(&path).await?;
            return Err(anyhow::Error::new(e).context("swap database file"));
        }

        match open_and_migrate(&path).await {
            Ok(pool) => {
                *guard = pool;
                tracing::info!(path = %path.display(), "data file replaced");
                Ok(())
            }
            Err(e) => {
                if had_previous {
                    tokio::fs::copy(&backup, &path)
                        .await
                        .context("restore backup after failed swap")?;
                }
                *guard = open_pool(&path).await?;
                Err(e.context("activate replacement database"))
            }
        }
    }
}

async fn probe_database(path: &Path) -> anyhow::Result<()> {
    let options = SqliteConnectOptions::new().filename(path).read_only(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .context("open uploaded file")?;
    let check: Result<i64, sqlx::Error> =
        sqlx::query_scalar("SELECT count(*) FROM sqlite_master")
            .fetch_one(&pool)
            .await;
    pool.close().await;
    check.context("read uploaded file")?;
    Ok(())
}

async fn open_and_migrate(path: &Path) -> anyhow::Result<SqlitePool> {
    let pool = open_pool(path).await?;
    if let Err(e) = MIGRATOR.run(&pool).await {
        pool.close().await;
        return Err(anyhow::Error::new(e).context("migrate replacement database"));
    }
    Ok(pool)
}
