use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::{MySql, MySqlPool, QueryBuilder};

use super::schema::{SchemaMap, UserQueries};
use super::{
    AttendanceRepository, HolidayFilter, HolidayRepository, PasswordResetRepository,
    QrCodeRepository, RepoResult, UserRepository,
};
use crate::model::{
    attendance::{AttendanceRecord, AttendanceType, NewCheckIn, TodayEntry},
    holiday::{Holiday, HolidayPatch, HolidayStats, NewHoliday},
    password_reset::PasswordReset,
    qr_code::{NewQrCode, QrCode, ScanLog},
    user::{User, UserRow},
};

const ATTENDANCE_COLUMNS: &str = "id, user_id, date, check_in_time, check_out_time, total_hours, \
     status, attendance_type, qr_id, location";

const HOLIDAY_COLUMNS: &str =
    "id, holiday_date, holiday_name, holiday_type, country_code, description, is_active";

/// MySQL-backed implementation of every repository trait.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
    users: UserQueries,
    attendance_table: String,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool, schema: &SchemaMap) -> Self {
        Self {
            pool,
            users: schema.user_queries(),
            attendance_table: schema.attendance_table().to_string(),
        }
    }
}

impl UserRepository for MySqlStore {
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&self.users.select_by_email)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_id(&self, id: u64) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&self.users.select_by_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn email_taken_by_other(&self, email: &str, user_id: u64) -> RepoResult<bool> {
        let count: i64 = sqlx::query_scalar(&self.users.select_other_with_email)
            .bind(email)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn create_user(&self, name: &str, email: &str, password_hash: &str) -> RepoResult<u64> {
        let mut query = sqlx::query(&self.users.insert);
        if self.users.binds_name {
            query = query.bind(name);
        }
        let result = query
            .bind(email)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_id())
    }

    async fn set_password_hash(&self, user_id: u64, password_hash: &str) -> RepoResult<()> {
        sqlx::query(&self.users.update_password)
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_profile(&self, user_id: u64, name: &str, email: &str) -> RepoResult<()> {
        let mut query = sqlx::query(&self.users.update_profile);
        if self.users.binds_name {
            query = query.bind(name);
        }
        query.bind(email).bind(user_id).execute(&self.pool).await?;
        Ok(())
    }

    async fn touch_last_login(&self, user_id: u64) -> RepoResult<()> {
        if let Some(sql) = &self.users.touch_last_login {
            sqlx::query(sql).bind(user_id).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn count_users(&self) -> RepoResult<i64> {
        let count: i64 = sqlx::query_scalar(&self.users.count)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

impl AttendanceRepository for MySqlStore {
    async fn find_for_day(
        &self,
        user_id: u64,
        date: NaiveDate,
    ) -> RepoResult<Option<AttendanceRecord>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM `{}` WHERE user_id = ? AND date = ? LIMIT 1",
            self.attendance_table
        );
        let record = sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(user_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn insert_check_in(&self, check_in: &NewCheckIn) -> RepoResult<u64> {
        let sql = format!(
            "INSERT INTO `{}` (user_id, date, check_in_time, status, attendance_type, qr_id, location) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            self.attendance_table
        );
        let result = sqlx::query(&sql)
            .bind(check_in.user_id)
            .bind(check_in.date)
            .bind(check_in.check_in_time)
            .bind(check_in.status.to_string())
            .bind(AttendanceType::CheckIn.to_string())
            .bind(&check_in.qr_id)
            .bind(&check_in.location)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_id())
    }

    async fn complete_check_out(
        &self,
        id: u64,
        check_out_time: NaiveTime,
        total_hours: f64,
    ) -> RepoResult<bool> {
        let sql = format!(
            "UPDATE `{}` SET check_out_time = ?, total_hours = ?, attendance_type = ? \
             WHERE id = ? AND check_out_time IS NULL",
            self.attendance_table
        );
        let result = sqlx::query(&sql)
            .bind(check_out_time)
            .bind(total_hours)
            .bind(AttendanceType::FullDay.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn recent_for_user(&self, user_id: u64, limit: u32) -> RepoResult<Vec<AttendanceRecord>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM `{}` WHERE user_id = ? ORDER BY date DESC LIMIT ?",
            self.attendance_table
        );
        let records = sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn range_for_user(
        &self,
        user_id: u64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepoResult<Vec<AttendanceRecord>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM `{}` \
             WHERE user_id = ? AND date BETWEEN ? AND ? ORDER BY date DESC",
            self.attendance_table
        );
        let records = sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn checked_in_on(&self, date: NaiveDate) -> RepoResult<Vec<TodayEntry>> {
        let entries = sqlx::query_as::<_, TodayEntry>(&self.users.today_checked_in)
            .bind(date)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }
}

impl QrCodeRepository for MySqlStore {
    async fn find_qr_code(&self, qr_id: &str) -> RepoResult<Option<QrCode>> {
        let code = sqlx::query_as::<_, QrCode>(
            r#"
            SELECT qr_id, qr_type, location, valid_date, valid_time, is_active
            FROM qr_codes
            WHERE qr_id = ?
            "#,
        )
        .bind(qr_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(code)
    }

    async fn create_qr_code(&self, code: &NewQrCode) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO qr_codes (qr_id, qr_type, location, valid_date, valid_time, qr_data, is_active)
            VALUES (?, ?, ?, ?, ?, ?, TRUE)
            "#,
        )
        .bind(&code.qr_id)
        .bind(&code.qr_type)
        .bind(&code.location)
        .bind(code.valid_date)
        .bind(&code.valid_time)
        .bind(&code.qr_data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn log_scan(&self, scan: &ScanLog) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO qr_scan_logs (user_id, qr_id, location, ip_address, scanned_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(scan.user_id)
        .bind(&scan.qr_id)
        .bind(&scan.location)
        .bind(&scan.ip_address)
        .bind(scan.scanned_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl PasswordResetRepository for MySqlStore {
    async fn upsert_reset(
        &self,
        email: &str,
        otp: &str,
        expires_at: NaiveDateTime,
    ) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO password_resets (email, otp, expires_at, used)
            VALUES (?, ?, ?, FALSE)
            ON DUPLICATE KEY UPDATE
                otp = VALUES(otp),
                expires_at = VALUES(expires_at),
                used = FALSE,
                created_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(email)
        .bind(otp)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_unused_reset(&self, email: &str) -> RepoResult<Option<PasswordReset>> {
        let reset = sqlx::query_as::<_, PasswordReset>(
            r#"
            SELECT id, email, otp, expires_at, used, created_at
            FROM password_resets
            WHERE email = ? AND used = FALSE
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(reset)
    }

    async fn mark_reset_used(&self, id: u64) -> RepoResult<bool> {
        let result =
            sqlx::query("UPDATE password_resets SET used = TRUE WHERE id = ? AND used = FALSE")
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn has_verified_reset(&self, email: &str, now: NaiveDateTime) -> RepoResult<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM password_resets
            WHERE email = ? AND used = TRUE AND expires_at >= ?
            "#,
        )
        .bind(email)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn delete_resets(&self, email: &str) -> RepoResult<()> {
        sqlx::query("DELETE FROM password_resets WHERE email = ?")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

impl HolidayRepository for MySqlStore {
    async fn upsert_holiday(&self, holiday: &NewHoliday) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO holidays (holiday_date, holiday_name, holiday_type, country_code, description, is_active)
            VALUES (?, ?, ?, ?, ?, TRUE)
            ON DUPLICATE KEY UPDATE
                holiday_name = VALUES(holiday_name),
                holiday_type = VALUES(holiday_type),
                description = VALUES(description),
                is_active = TRUE
            "#,
        )
        .bind(holiday.holiday_date)
        .bind(&holiday.holiday_name)
        .bind(holiday.holiday_type.to_string())
        .bind(&holiday.country_code)
        .bind(&holiday.description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_holiday(&self, id: u64) -> RepoResult<Option<Holiday>> {
        let sql = format!("SELECT {HOLIDAY_COLUMNS} FROM holidays WHERE id = ?");
        let holiday = sqlx::query_as::<_, Holiday>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(holiday)
    }

    async fn update_holiday(&self, id: u64, patch: &HolidayPatch) -> RepoResult<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<MySql> = QueryBuilder::new("UPDATE holidays SET ");
        let mut fields = builder.separated(", ");
        if let Some(name) = &patch.holiday_name {
            fields.push("holiday_name = ").push_bind_unseparated(name.clone());
        }
        if let Some(kind) = patch.holiday_type {
            fields
                .push("holiday_type = ")
                .push_bind_unseparated(kind.to_string());
        }
        if let Some(description) = &patch.description {
            fields
                .push("description = ")
                .push_bind_unseparated(description.clone());
        }
        if let Some(active) = patch.is_active {
            fields.push("is_active = ").push_bind_unseparated(active);
        }
        builder.push(" WHERE id = ").push_bind(id);

        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn deactivate_holiday(&self, id: u64) -> RepoResult<()> {
        sqlx::query("UPDATE holidays SET is_active = FALSE WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_holidays(&self, filter: &HolidayFilter) -> RepoResult<Vec<Holiday>> {
        let mut builder: QueryBuilder<MySql> = QueryBuilder::new(format!(
            "SELECT {HOLIDAY_COLUMNS} FROM holidays WHERE is_active = TRUE AND country_code = "
        ));
        builder
            .push_bind(filter.country_code.clone())
            .push(" AND holiday_date BETWEEN ")
            .push_bind(filter.start)
            .push(" AND ")
            .push_bind(filter.end);
        if let Some(kind) = filter.holiday_type {
            builder.push(" AND holiday_type = ").push_bind(kind.to_string());
        }
        builder.push(" ORDER BY holiday_date ASC");

        let holidays = builder
            .build_query_as::<Holiday>()
            .fetch_all(&self.pool)
            .await?;
        Ok(holidays)
    }

    async fn active_holiday_on(
        &self,
        country_code: &str,
        date: NaiveDate,
    ) -> RepoResult<Option<Holiday>> {
        let sql = format!(
            "SELECT {HOLIDAY_COLUMNS} FROM holidays \
             WHERE country_code = ? AND holiday_date = ? AND is_active = TRUE LIMIT 1"
        );
        let holiday = sqlx::query_as::<_, Holiday>(&sql)
            .bind(country_code)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        Ok(holiday)
    }

    async fn holiday_stats(&self) -> RepoResult<Vec<HolidayStats>> {
        let stats = sqlx::query_as::<_, HolidayStats>(
            r#"
            SELECT country_code,
                   COUNT(*) AS total_holidays,
                   MIN(holiday_date) AS first_date,
                   MAX(holiday_date) AS last_date
            FROM holidays
            WHERE is_active = TRUE
            GROUP BY country_code
            ORDER BY country_code
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(stats)
    }
}
