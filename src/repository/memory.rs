//! In-process store used by the service tests. It enforces the same unique
//! keys as the migrations so duplicate handling is exercised.

use std::sync::Mutex;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::{
    AttendanceRepository, HolidayFilter, HolidayRepository, PasswordResetRepository,
    QrCodeRepository, RepoError, RepoResult, UserRepository,
};
use crate::model::{
    attendance::{AttendanceRecord, AttendanceType, NewCheckIn, TodayEntry},
    holiday::{Holiday, HolidayPatch, HolidayStats, NewHoliday},
    password_reset::PasswordReset,
    qr_code::{NewQrCode, QrCode, ScanLog},
    user::User,
};

#[derive(Default)]
pub struct MemoryStore {
    pub users: Mutex<Vec<User>>,
    pub attendance: Mutex<Vec<AttendanceRecord>>,
    pub qr_codes: Mutex<Vec<QrCode>>,
    pub scans: Mutex<Vec<ScanLog>>,
    pub resets: Mutex<Vec<PasswordReset>>,
    pub holidays: Mutex<Vec<Holiday>>,
    pub fail_scan_log: bool,
}

fn next_id(len: usize) -> u64 {
    len as u64 + 1
}

impl MemoryStore {
    pub fn with_user(self, name: &str, email: &str, password: Option<&str>, first_login: bool) -> Self {
        {
            let mut users = self.users.lock().unwrap();
            let id = next_id(users.len());
            users.push(User {
                id,
                name: Some(name.to_string()),
                email: email.to_string(),
                password: password.map(str::to_string),
                is_first_login: first_login,
            });
        }
        self
    }

    pub fn active_holidays(&self) -> Vec<Holiday> {
        self.holidays
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.is_active)
            .cloned()
            .collect()
    }
}

impl UserRepository for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_id(&self, id: u64) -> RepoResult<Option<User>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn email_taken_by_other(&self, email: &str, user_id: u64) -> RepoResult<bool> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .any(|u| u.id != user_id && u.email.eq_ignore_ascii_case(email)))
    }

    async fn create_user(&self, name: &str, email: &str, password_hash: &str) -> RepoResult<u64> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(RepoError::Duplicate);
        }
        let id = next_id(users.len());
        users.push(User {
            id,
            name: Some(name.to_string()),
            email: email.to_string(),
            password: Some(password_hash.to_string()),
            is_first_login: false,
        });
        Ok(id)
    }

    async fn set_password_hash(&self, user_id: u64, password_hash: &str) -> RepoResult<()> {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.iter_mut().find(|u| u.id == user_id) {
            user.password = Some(password_hash.to_string());
            user.is_first_login = false;
        }
        Ok(())
    }

    async fn update_profile(&self, user_id: u64, name: &str, email: &str) -> RepoResult<()> {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.iter_mut().find(|u| u.id == user_id) {
            user.name = Some(name.to_string());
            user.email = email.to_string();
        }
        Ok(())
    }

    async fn touch_last_login(&self, _user_id: u64) -> RepoResult<()> {
        Ok(())
    }

    async fn count_users(&self) -> RepoResult<i64> {
        Ok(self.users.lock().unwrap().len() as i64)
    }
}

impl AttendanceRepository for MemoryStore {
    async fn find_for_day(
        &self,
        user_id: u64,
        date: NaiveDate,
    ) -> RepoResult<Option<AttendanceRecord>> {
        let rows = self.attendance.lock().unwrap();
        Ok(rows
            .iter()
            .find(|r| r.user_id == user_id && r.date == date)
            .cloned())
    }

    async fn insert_check_in(&self, check_in: &NewCheckIn) -> RepoResult<u64> {
        let mut rows = self.attendance.lock().unwrap();
        if rows
            .iter()
            .any(|r| r.user_id == check_in.user_id && r.date == check_in.date)
        {
            return Err(RepoError::Duplicate);
        }
        let id = next_id(rows.len());
        rows.push(AttendanceRecord {
            id,
            user_id: check_in.user_id,
            date: check_in.date,
            check_in_time: Some(check_in.check_in_time),
            check_out_time: None,
            total_hours: None,
            status: check_in.status,
            attendance_type: AttendanceType::CheckIn,
            qr_id: check_in.qr_id.clone(),
            location: check_in.location.clone(),
        });
        Ok(id)
    }

    async fn complete_check_out(
        &self,
        id: u64,
        check_out_time: NaiveTime,
        total_hours: f64,
    ) -> RepoResult<bool> {
        let mut rows = self.attendance.lock().unwrap();
        match rows
            .iter_mut()
            .find(|r| r.id == id && r.check_out_time.is_none())
        {
            Some(row) => {
                row.check_out_time = Some(check_out_time);
                row.total_hours = Some(total_hours);
                row.attendance_type = AttendanceType::FullDay;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn recent_for_user(&self, user_id: u64, limit: u32) -> RepoResult<Vec<AttendanceRecord>> {
        let mut rows: Vec<_> = self
            .attendance
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn range_for_user(
        &self,
        user_id: u64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepoResult<Vec<AttendanceRecord>> {
        let mut rows: Vec<_> = self
            .attendance
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id && r.date >= start && r.date <= end)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(rows)
    }

    async fn checked_in_on(&self, date: NaiveDate) -> RepoResult<Vec<TodayEntry>> {
        let users = self.users.lock().unwrap();
        let rows = self.attendance.lock().unwrap();
        let mut entries: Vec<_> = rows
            .iter()
            .filter(|r| r.date == date && r.check_in_time.is_some())
            .map(|r| TodayEntry {
                user_id: r.user_id,
                name: users
                    .iter()
                    .find(|u| u.id == r.user_id)
                    .and_then(|u| u.name.clone()),
                date: r.date,
                check_in_time: r.check_in_time,
                check_out_time: r.check_out_time,
                attendance_type: r.attendance_type.to_string(),
                status: r.status.to_string(),
            })
            .collect();
        entries.sort_by_key(|e| e.check_in_time);
        Ok(entries)
    }
}

impl QrCodeRepository for MemoryStore {
    async fn find_qr_code(&self, qr_id: &str) -> RepoResult<Option<QrCode>> {
        let codes = self.qr_codes.lock().unwrap();
        Ok(codes.iter().find(|c| c.qr_id == qr_id).cloned())
    }

    async fn create_qr_code(&self, code: &NewQrCode) -> RepoResult<()> {
        let mut codes = self.qr_codes.lock().unwrap();
        if codes.iter().any(|c| c.qr_id == code.qr_id) {
            return Err(RepoError::Duplicate);
        }
        codes.push(QrCode {
            qr_id: code.qr_id.clone(),
            qr_type: code.qr_type.clone(),
            location: code.location.clone(),
            valid_date: code.valid_date,
            valid_time: Some(code.valid_time.clone()),
            is_active: true,
        });
        Ok(())
    }

    async fn log_scan(&self, scan: &ScanLog) -> RepoResult<()> {
        if self.fail_scan_log {
            return Err(RepoError::Database(sqlx::Error::PoolTimedOut));
        }
        self.scans.lock().unwrap().push(scan.clone());
        Ok(())
    }
}

impl PasswordResetRepository for MemoryStore {
    async fn upsert_reset(
        &self,
        email: &str,
        otp: &str,
        expires_at: NaiveDateTime,
    ) -> RepoResult<()> {
        let mut resets = self.resets.lock().unwrap();
        let created_at = expires_at - chrono::Duration::minutes(10);
        match resets.iter_mut().find(|r| r.email == email) {
            Some(row) => {
                row.otp = otp.to_string();
                row.expires_at = expires_at;
                row.used = false;
                row.created_at = created_at;
            }
            None => {
                let id = next_id(resets.len());
                resets.push(PasswordReset {
                    id,
                    email: email.to_string(),
                    otp: otp.to_string(),
                    expires_at,
                    used: false,
                    created_at,
                });
            }
        }
        Ok(())
    }

    async fn latest_unused_reset(&self, email: &str) -> RepoResult<Option<PasswordReset>> {
        let resets = self.resets.lock().unwrap();
        Ok(resets
            .iter()
            .filter(|r| r.email == email && !r.used)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn mark_reset_used(&self, id: u64) -> RepoResult<bool> {
        let mut resets = self.resets.lock().unwrap();
        match resets.iter_mut().find(|r| r.id == id && !r.used) {
            Some(row) => {
                row.used = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn has_verified_reset(&self, email: &str, now: NaiveDateTime) -> RepoResult<bool> {
        let resets = self.resets.lock().unwrap();
        Ok(resets
            .iter()
            .any(|r| r.email == email && r.used && r.expires_at >= now))
    }

    async fn delete_resets(&self, email: &str) -> RepoResult<()> {
        self.resets.lock().unwrap().retain(|r| r.email != email);
        Ok(())
    }
}

impl HolidayRepository for MemoryStore {
    async fn upsert_holiday(&self, holiday: &NewHoliday) -> RepoResult<()> {
        let mut rows = self.holidays.lock().unwrap();
        match rows.iter_mut().find(|h| {
            h.holiday_date == holiday.holiday_date && h.country_code == holiday.country_code
        }) {
            Some(row) => {
                row.holiday_name = holiday.holiday_name.clone();
                row.holiday_type = holiday.holiday_type;
                row.description = holiday.description.clone();
                row.is_active = true;
            }
            None => {
                let id = next_id(rows.len());
                rows.push(Holiday {
                    id,
                    holiday_date: holiday.holiday_date,
                    holiday_name: holiday.holiday_name.clone(),
                    holiday_type: holiday.holiday_type,
                    country_code: holiday.country_code.clone(),
                    description: holiday.description.clone(),
                    is_active: true,
                });
            }
        }
        Ok(())
    }

    async fn find_holiday(&self, id: u64) -> RepoResult<Option<Holiday>> {
        Ok(self.holidays.lock().unwrap().iter().find(|h| h.id == id).cloned())
    }

    async fn update_holiday(&self, id: u64, patch: &HolidayPatch) -> RepoResult<()> {
        let mut rows = self.holidays.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|h| h.id == id) {
            if let Some(name) = &patch.holiday_name {
                row.holiday_name = name.clone();
            }
            if let Some(kind) = patch.holiday_type {
                row.holiday_type = kind;
            }
            if let Some(description) = &patch.description {
                row.description = Some(description.clone());
            }
            if let Some(active) = patch.is_active {
                row.is_active = active;
            }
        }
        Ok(())
    }

    async fn deactivate_holiday(&self, id: u64) -> RepoResult<()> {
        let mut rows = self.holidays.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|h| h.id == id) {
            row.is_active = false;
        }
        Ok(())
    }

    async fn list_holidays(&self, filter: &HolidayFilter) -> RepoResult<Vec<Holiday>> {
        let mut rows: Vec<_> = self
            .holidays
            .lock()
            .unwrap()
            .iter()
            .filter(|h| {
                h.is_active
                    && h.country_code == filter.country_code
                    && h.holiday_date >= filter.start
                    && h.holiday_date <= filter.end
                    && filter.holiday_type.is_none_or(|t| t == h.holiday_type)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|h| h.holiday_date);
        Ok(rows)
    }

    async fn active_holiday_on(
        &self,
        country_code: &str,
        date: NaiveDate,
    ) -> RepoResult<Option<Holiday>> {
        let rows = self.holidays.lock().unwrap();
        Ok(rows
            .iter()
            .find(|h| h.is_active && h.country_code == country_code && h.holiday_date == date)
            .cloned())
    }

    async fn holiday_stats(&self) -> RepoResult<Vec<HolidayStats>> {
        let rows = self.active_holidays();
        let mut countries: Vec<String> = rows.iter().map(|h| h.country_code.clone()).collect();
        countries.sort();
        countries.dedup();
        Ok(countries
            .into_iter()
            .map(|country_code| {
                let dates: Vec<_> = rows
                    .iter()
                    .filter(|h| h.country_code == country_code)
                    .map(|h| h.holiday_date)
                    .collect();
                HolidayStats {
                    total_holidays: dates.len() as i64,
                    first_date: dates.iter().min().copied(),
                    last_date: dates.iter().max().copied(),
                    country_code,
                }
            })
            .collect())
    }
}
