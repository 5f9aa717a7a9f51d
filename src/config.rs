use std::{env, fmt::Display, str::FromStr};

use anyhow::{Context, Result, anyhow};
use chrono::{FixedOffset, NaiveDateTime, Utc};
use dotenvy::dotenv;

use crate::repository::schema::SchemaMap;

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    /// Full connection string; wins over the split fields when present.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    pub password: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub from_email: String,
    pub from_name: String,
}

#[derive(Clone, Debug)]
pub struct HolidayApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Default)]
pub struct QrConfig {
    pub static_payload: Option<String>,
    pub static_hash: Option<String>,
    pub static_id: Option<String>,
    pub require_qr: bool,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: String,
    pub database: DatabaseConfig,
    pub jwt_secret: String,
    pub token_ttl: usize,
    pub utc_offset: FixedOffset,
    pub dev_mode: bool,
    pub log_level: tracing::Level,
    pub log_dir: String,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_otp_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub default_country_code: String,
    pub holiday_api: HolidayApiConfig,
    pub mail: MailConfig,
    pub qr: QrConfig,
    pub schema: SchemaMap,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or_else(|| anyhow!("JWT_SECRET must be set"))?;

        let offset_minutes: i32 = parse_or(&get, "APP_UTC_OFFSET_MINUTES", 330)?;
        let utc_offset = FixedOffset::east_opt(offset_minutes * 60)
            .ok_or_else(|| anyhow!("APP_UTC_OFFSET_MINUTES out of range: {offset_minutes}"))?;

        let default_country_code = get("DEFAULT_COUNTRY_CODE")
            .unwrap_or_else(|| "IN".to_string())
            .to_uppercase();

        Ok(Self {
            server_addr: get("SERVER_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            database: DatabaseConfig {
                url: get("DATABASE_URL"),
                host: get("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
                port: parse_or(&get, "DB_PORT", 3306)?,
                name: get("DB_NAME").unwrap_or_else(|| "attendance".to_string()),
                username: get("DB_USERNAME").unwrap_or_else(|| "root".to_string()),
                password: get("DB_PASSWORD").unwrap_or_default(),
                max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10)?,
                run_migrations: parse_or(&get, "RUN_MIGRATIONS", true)?,
            },
            jwt_secret,
            token_ttl: parse_or(&get, "TOKEN_TTL", 86_400)?, // 24 hours
            utc_offset,
            dev_mode: parse_or(&get, "DEV_MODE", false)?,
            log_level: parse_or(&get, "LOG_LEVEL", tracing::Level::DEBUG)?,
            log_dir: get("LOG_DIR").unwrap_or_else(|| "logs".to_string()),

            rate_login_per_min: parse_or(&get, "RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: parse_or(&get, "RATE_REGISTER_PER_MIN", 30)?,
            rate_otp_per_min: parse_or(&get, "RATE_OTP_PER_MIN", 10)?,
            rate_protected_per_min: parse_or(&get, "RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: get("API_PREFIX").unwrap_or_default(),
            default_country_code,
            holiday_api: HolidayApiConfig {
                base_url: get("HOLIDAY_API_URL")
                    .unwrap_or_else(|| "https://date.nager.at/api/v3".to_string()),
                timeout_secs: parse_or(&get, "HOLIDAY_API_TIMEOUT_SECS", 5)?,
            },
            mail: MailConfig {
                api_key: get("SENDGRID_API_KEY"),
                api_url: get("SENDGRID_API_URL")
                    .unwrap_or_else(|| "https://api.sendgrid.com/v3/mail/send".to_string()),
                from_email: get("SENDGRID_FROM_EMAIL")
                    .unwrap_or_else(|| "noreply@yourdomain.com".to_string()),
                from_name: get("SENDGRID_FROM_NAME")
                    .unwrap_or_else(|| "Smart Attendance System".to_string()),
            },
            qr: QrConfig {
                static_payload: get("STATIC_QR_PAYLOAD"),
                static_hash: get("STATIC_QR_HASH"),
                static_id: get("STATIC_QR_ID"),
                require_qr: parse_or(&get, "REQUIRE_QR", false)?,
            },
            schema: SchemaMap::from_lookup(&get).context("invalid users-table mapping")?,
        })
    }

    /// Wall-clock time in the configured office timezone.
    pub fn local_now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.utc_offset).naive_local()
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow!("invalid {key} value {raw:?}: {e}")),
        None => Ok(default),
    }
}
