use super::rdb::{RdbConfig, RdbPool};
use anyhow::Result;
use flowdesk_base::error::FlowdeskError;

pub const SQLITE_SCHEMA: &str = include_str!("../../sql/sqlite/001_schema.sql");

static RDB_POOL: tokio::sync::OnceCell<RdbPool> = tokio::sync::OnceCell::const_new();

// new rdb pool and store as static
pub async fn setup_rdb(db_config: &RdbConfig) -> Result<&'static RdbPool> {
    RDB_POOL
        .get_or_try_init(|| async { super::rdb::new_rdb_pool(db_config, Some(SQLITE_SCHEMA)).await })
        .await
}

pub fn load_db_config_from_env() -> Result<RdbConfig> {
    envy::prefixed("SQLITE_")
        .from_env::<RdbConfig>()
        .map_err(|e| {
            FlowdeskError::RuntimeError(format!("cannot read sqlite config from env: {e:?}"))
                .into()
        })
}
