#![allow(async_fn_in_trait)]

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::model::{
    attendance::{AttendanceRecord, NewCheckIn, TodayEntry},
    holiday::{Holiday, HolidayPatch, HolidayStats, HolidayType, NewHoliday},
    password_reset::PasswordReset,
    qr_code::{NewQrCode, QrCode, ScanLog},
    user::User,
};
use crate::utils::db_utils::is_duplicate_key;

#[cfg(test)]
pub mod memory;
pub mod mysql;
pub mod schema;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// A unique constraint rejected the write.
    #[error("duplicate key")]
    Duplicate,
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        if is_duplicate_key(&err) {
            RepoError::Duplicate
        } else {
            RepoError::Database(err)
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

pub trait UserRepository {
    /// Case-insensitive match on the e-mail column.
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn find_user_by_id(&self, id: u64) -> RepoResult<Option<User>>;
    async fn email_taken_by_other(&self, email: &str, user_id: u64) -> RepoResult<bool>;
    async fn create_user(&self, name: &str, email: &str, password_hash: &str) -> RepoResult<u64>;
    /// Stores a new hash and clears the first-login flag.
    async fn set_password_hash(&self, user_id: u64, password_hash: &str) -> RepoResult<()>;
    async fn update_profile(&self, user_id: u64, name: &str, email: &str) -> RepoResult<()>;
    async fn touch_last_login(&self, user_id: u64) -> RepoResult<()>;
    async fn count_users(&self) -> RepoResult<i64>;
}

pub trait AttendanceRepository {
    async fn find_for_day(&self, user_id: u64, date: NaiveDate)
    -> RepoResult<Option<AttendanceRecord>>;
    /// Fails with [`RepoError::Duplicate`] when the user already has a row for the date.
    async fn insert_check_in(&self, check_in: &NewCheckIn) -> RepoResult<u64>;
    /// Returns `false` when the row was already checked out.
    async fn complete_check_out(
        &self,
        id: u64,
        check_out_time: NaiveTime,
        total_hours: f64,
    ) -> RepoResult<bool>;
    async fn recent_for_user(&self, user_id: u64, limit: u32) -> RepoResult<Vec<AttendanceRecord>>;
    async fn range_for_user(
        &self,
        user_id: u64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepoResult<Vec<AttendanceRecord>>;
    async fn checked_in_on(&self, date: NaiveDate) -> RepoResult<Vec<TodayEntry>>;
}

pub trait QrCodeRepository {
    async fn find_qr_code(&self, qr_id: &str) -> RepoResult<Option<QrCode>>;
    async fn create_qr_code(&self, code: &NewQrCode) -> RepoResult<()>;
    async fn log_scan(&self, scan: &ScanLog) -> RepoResult<()>;
}

pub trait PasswordResetRepository {
    /// One row per e-mail; a new request replaces the code and resets `used`.
    async fn upsert_reset(&self, email: &str, otp: &str, expires_at: NaiveDateTime)
    -> RepoResult<()>;
    async fn latest_unused_reset(&self, email: &str) -> RepoResult<Option<PasswordReset>>;
    /// Returns `false` when another request consumed the row first.
    async fn mark_reset_used(&self, id: u64) -> RepoResult<bool>;
    /// A used (verified) row that has not expired yet.
    async fn has_verified_reset(&self, email: &str, now: NaiveDateTime) -> RepoResult<bool>;
    async fn delete_resets(&self, email: &str) -> RepoResult<()>;
}

#[derive(Debug, Clone)]
pub struct HolidayFilter {
    pub country_code: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub holiday_type: Option<HolidayType>,
}

pub trait HolidayRepository {
    /// Insert or update by `(holiday_date, country_code)`; the row ends up active.
    async fn upsert_holiday(&self, holiday: &NewHoliday) -> RepoResult<()>;
    async fn find_holiday(&self, id: u64) -> RepoResult<Option<Holiday>>;
    async fn update_holiday(&self, id: u64, patch: &HolidayPatch) -> RepoResult<()>;
    async fn deactivate_holiday(&self, id: u64) -> RepoResult<()>;
    async fn list_holidays(&self, filter: &HolidayFilter) -> RepoResult<Vec<Holiday>>;
    async fn active_holiday_on(
        &self,
        country_code: &str,
        date: NaiveDate,
    ) -> RepoResult<Option<Holiday>>;
    async fn holiday_stats(&self) -> RepoResult<Vec<HolidayStats>>;
}
