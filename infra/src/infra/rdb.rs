use anyhow::{Context, Result};
use flowdesk_base::error::FlowdeskError;
use serde::Deserialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::Pool;
use std::str::FromStr;
use std::time::Duration;

pub type Rdb = sqlx::Sqlite;
pub type RdbPool = Pool<Rdb>;

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct RdbConfig {
    /// sqlite file path, or ":memory:"
    #[serde(default = "default_dbname")]
    pub dbname: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_dbname() -> String {
    "./flowdesk.sqlite3".to_string()
}

fn default_max_connections() -> u32 {
    10
}

impl Default for RdbConfig {
    fn default() -> Self {
        tracing::info!("Use default RdbConfig (./flowdesk.sqlite3).");
        Self {
            dbname: default_dbname(),
            max_connections: default_max_connections(),
        }
    }
}

impl RdbConfig {
    pub fn is_memory(&self) -> bool {
        self.dbname == ":memory:"
    }
    pub fn url(&self) -> String {
        if self.is_memory() {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}", self.dbname)
        }
    }
}

pub trait UseRdbPool {
    fn db_pool(&self) -> &RdbPool;
}

// create pool and apply schema (idempotent ddl)
pub async fn new_rdb_pool(config: &RdbConfig, init_schema: Option<&str>) -> Result<RdbPool> {
    let options = SqliteConnectOptions::from_str(&config.url())
        .map_err(FlowdeskError::from)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));
    let options = if config.is_memory() {
        options
    } else {
        options.journal_mode(SqliteJournalMode::Wal)
    };
    let pool_options = SqlitePoolOptions::new().max_connections(config.max_connections.max(1));
    let pool_options = if config.is_memory() {
        // closing the last connection drops an in-memory database
        pool_options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        pool_options
    };
    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(FlowdeskError::from)
        .context(format!("cannot connect to rdb: {}", config.url()))?;
    if let Some(schema) = init_schema {
        sqlx::raw_sql(schema)
            .execute(&pool)
            .await
            .map_err(FlowdeskError::from)
            .context("error in applying schema")?;
    }
    tracing::debug!("rdb pool created: {}", config.url());
    Ok(pool)
}
