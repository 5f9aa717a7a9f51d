use anyhow::Context;
use sqlx::MySqlPool;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::utils::db_utils::{connect_options, ping, pool_options};

pub async fn init_db(config: &DatabaseConfig) -> anyhow::Result<MySqlPool> {
    let pool = pool_options(config)
        .connect_with(connect_options(config)?)
        .await
        .context("Failed to connect to database")?;
    ping(&pool).await.context("Database did not answer")?;
    info!(max_connections = config.max_connections, "Database pool ready");

    if config.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;
        info!("Migrations applied");
    }

    Ok(pool)
}
