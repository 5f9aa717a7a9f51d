use std::str::FromStr;

use anyhow::Context;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::MySqlPool;

use crate::config::DatabaseConfig;

/// SQLSTATE 23000 covers MySQL's 1062 duplicate-entry error.
pub fn is_duplicate_key(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23000"),
        _ => false,
    }
}

pub fn connect_options(config: &DatabaseConfig) -> anyhow::Result<MySqlConnectOptions> {
    if let Some(url) = &config.url {
        return MySqlConnectOptions::from_str(url).context("DATABASE_URL is not a valid MySQL URL");
    }

    Ok(MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.username)
        .password(&config.password)
        .database(&config.name)
        .charset("utf8mb4"))
}

pub fn pool_options(config: &DatabaseConfig) -> MySqlPoolOptions {
    MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(5))
}

pub async fn ping(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}
