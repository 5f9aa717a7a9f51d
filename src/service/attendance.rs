use chrono::{NaiveDateTime, NaiveTime, Timelike};
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::model::attendance::{AttendanceStatus, NewCheckIn};
use crate::model::qr_code::QrInfo;
use crate::repository::{AttendanceRepository, RepoError};

/// Result of one `mark` call for a user and day.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkOutcome {
    CheckedIn {
        status: AttendanceStatus,
        time: NaiveTime,
    },
    CheckedOut {
        check_in_time: NaiveTime,
        check_out_time: NaiveTime,
        total_hours: f64,
    },
    /// The day already has both timestamps.
    AlreadyCompleted {
        check_in_time: Option<NaiveTime>,
        check_out_time: Option<NaiveTime>,
    },
    /// Lost the insert race against a concurrent check-in.
    AlreadyMarked,
}

/// 09:00-09:59 is Present, 10:00-11:59 is Late. Any other hour keeps the
/// status the caller asked for.
pub fn derive_status(now: NaiveTime, requested: AttendanceStatus) -> AttendanceStatus {
    match now.hour() {
        9 => AttendanceStatus::Present,
        10 | 11 => AttendanceStatus::Late,
        _ => requested,
    }
}

/// Whole hours plus minutes as a fraction, rounded to two decimals.
pub fn total_hours(check_in: NaiveTime, check_out: NaiveTime) -> f64 {
    let seconds = (check_out - check_in).num_seconds();
    if seconds < 0 {
        warn!(%check_in, %check_out, "Check-out precedes check-in, recording 0 hours");
        return 0.0;
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    round2(hours as f64 + minutes as f64 / 60.0)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Moves the user's day one step along NoRecord -> CheckedIn -> CheckedOut.
pub async fn mark<R: AttendanceRepository>(
    repo: &R,
    user_id: u64,
    requested: AttendanceStatus,
    qr: Option<&QrInfo>,
    now: NaiveDateTime,
) -> Result<MarkOutcome, AppError> {
    let date = now.date();
    let time = now.time().with_nanosecond(0).unwrap_or(now.time());

    let Some(record) = repo.find_for_day(user_id, date).await? else {
        let status = derive_status(time, requested);
        let check_in = NewCheckIn {
            user_id,
            date,
            check_in_time: time,
            status,
            qr_id: qr.map(|q| q.id.clone()),
            location: qr.map(|q| q.location.clone()),
        };

        return match repo.insert_check_in(&check_in).await {
            Ok(_) => {
                info!(user_id, %date, %time, %status, "Checked in");
                Ok(MarkOutcome::CheckedIn { status, time })
            }
            Err(RepoError::Duplicate) => {
                warn!(user_id, %date, "Concurrent check-in rejected by unique key");
                Ok(MarkOutcome::AlreadyMarked)
            }
            Err(e) => Err(e.into()),
        };
    };

    if record.check_out_time.is_some() {
        return Ok(MarkOutcome::AlreadyCompleted {
            check_in_time: record.check_in_time,
            check_out_time: record.check_out_time,
        });
    }

    let hours = match record.check_in_time {
        Some(check_in) => total_hours(check_in, time),
        None => {
            error!(user_id, record_id = record.id, "Attendance row has no check-in time");
            0.0
        }
    };

    if !repo.complete_check_out(record.id, time, hours).await? {
        // Another request closed the day between the read and the update.
        let current = repo.find_for_day(user_id, date).await?;
        return Ok(MarkOutcome::AlreadyCompleted {
            check_in_time: current.as_ref().and_then(|r| r.check_in_time),
            check_out_time: current.and_then(|r| r.check_out_time),
        });
    }

    info!(user_id, %date, %time, total_hours = hours, "Checked out");
    Ok(MarkOutcome::CheckedOut {
        check_in_time: record.check_in_time.unwrap_or(time),
        check_out_time: time,
        total_hours: hours,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::{AttendanceRecord, AttendanceType, TodayEntry};
    use crate::repository::RepoResult;
    use crate::repository::memory::MemoryStore;
    use chrono::NaiveDate;

    /// Replays a concurrent request landing between `mark`'s read and write.
    #[derive(Default)]
    struct Interleaved {
        inner: MemoryStore,
        /// `find_for_day` misses rows that already exist.
        stale_reads: bool,
        /// Closes the day at this time just before our own check-out.
        rival_check_out: Option<NaiveTime>,
    }

    impl AttendanceRepository for Interleaved {
        async fn find_for_day(
            &self,
            user_id: u64,
            date: NaiveDate,
        ) -> RepoResult<Option<AttendanceRecord>> {
            if self.stale_reads {
                return Ok(None);
            }
            self.inner.find_for_day(user_id, date).await
        }

        async fn insert_check_in(&self, check_in: &NewCheckIn) -> RepoResult<u64> {
            self.inner.insert_check_in(check_in).await
        }

        async fn complete_check_out(
            &self,
            id: u64,
            check_out_time: NaiveTime,
            total_hours: f64,
        ) -> RepoResult<bool> {
            if let Some(rival) = self.rival_check_out {
                self.inner.complete_check_out(id, rival, 8.0).await?;
            }
            self.inner.complete_check_out(id, check_out_time, total_hours).await
        }

        async fn recent_for_user(&self, user_id: u64, limit: u32) -> RepoResult<Vec<AttendanceRecord>> {
            self.inner.recent_for_user(user_id, limit).await
        }

        async fn range_for_user(
            &self,
            user_id: u64,
            start: NaiveDate,
            end: NaiveDate,
        ) -> RepoResult<Vec<AttendanceRecord>> {
            self.inner.range_for_user(user_id, start, end).await
        }

        async fn checked_in_on(&self, date: NaiveDate) -> RepoResult<Vec<TodayEntry>> {
            self.inner.checked_in_on(date).await
        }
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn status_follows_the_clock_inside_the_window() {
        assert_eq!(derive_status(t(9, 15), AttendanceStatus::Absent), AttendanceStatus::Present);
        assert_eq!(derive_status(t(10, 0), AttendanceStatus::Present), AttendanceStatus::Late);
        assert_eq!(derive_status(t(11, 59), AttendanceStatus::Present), AttendanceStatus::Late);
    }

    #[test]
    fn status_outside_the_window_is_the_requested_one() {
        assert_eq!(derive_status(t(8, 30), AttendanceStatus::OnLeave), AttendanceStatus::OnLeave);
        assert_eq!(derive_status(t(12, 0), AttendanceStatus::Absent), AttendanceStatus::Absent);
    }

    #[test]
    fn hours_between_nine_and_half_past_five() {
        assert_eq!(total_hours(t(9, 0), t(17, 30)), 8.5);
        assert_eq!(total_hours(t(9, 10), t(9, 30)), 0.33);
        assert_eq!(total_hours(t(18, 0), t(9, 0)), 0.0);
    }

    #[actix_web::test]
    async fn first_mark_checks_in_second_checks_out() {
        let store = MemoryStore::default();

        let first = mark(&store, 1, AttendanceStatus::Present, None, at(9, 15)).await.unwrap();
        assert_eq!(
            first,
            MarkOutcome::CheckedIn {
                status: AttendanceStatus::Present,
                time: t(9, 15)
            }
        );

        let second = mark(&store, 1, AttendanceStatus::Present, None, at(17, 45)).await.unwrap();
        assert_eq!(
            second,
            MarkOutcome::CheckedOut {
                check_in_time: t(9, 15),
                check_out_time: t(17, 45),
                total_hours: 8.5
            }
        );

        let rows = store.attendance.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].attendance_type, AttendanceType::FullDay);
        assert_eq!(rows[0].total_hours, Some(8.5));
    }

    #[actix_web::test]
    async fn check_in_at_ten_is_late() {
        let store = MemoryStore::default();
        let outcome = mark(&store, 3, AttendanceStatus::Present, None, at(10, 5)).await.unwrap();
        assert!(matches!(
            outcome,
            MarkOutcome::CheckedIn {
                status: AttendanceStatus::Late,
                ..
            }
        ));
    }

    #[actix_web::test]
    async fn completed_day_is_terminal() {
        let store = MemoryStore::default();
        mark(&store, 1, AttendanceStatus::Present, None, at(9, 0)).await.unwrap();
        mark(&store, 1, AttendanceStatus::Present, None, at(17, 0)).await.unwrap();

        let third = mark(&store, 1, AttendanceStatus::Present, None, at(18, 0)).await.unwrap();
        assert_eq!(
            third,
            MarkOutcome::AlreadyCompleted {
                check_in_time: Some(t(9, 0)),
                check_out_time: Some(t(17, 0))
            }
        );
        assert_eq!(store.attendance.lock().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn second_check_in_never_creates_a_second_row() {
        let store = MemoryStore::default();
        let check_in = NewCheckIn {
            user_id: 5,
            date: at(9, 0).date(),
            check_in_time: t(9, 0),
            status: AttendanceStatus::Present,
            qr_id: None,
            location: None,
        };
        store.insert_check_in(&check_in).await.unwrap();

        let err = store.insert_check_in(&check_in).await.unwrap_err();
        assert!(matches!(err, RepoError::Duplicate));
        assert_eq!(store.attendance.lock().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn qr_location_is_stored_on_check_in() {
        let store = MemoryStore::default();
        let qr = QrInfo {
            id: "QR-OFFICE-01".into(),
            qr_type: "attendance".into(),
            location: "Head Office".into(),
            valid_date: None,
            valid_time: None,
        };
        mark(&store, 2, AttendanceStatus::Present, Some(&qr), at(9, 5)).await.unwrap();

        let rows = store.attendance.lock().unwrap();
        assert_eq!(rows[0].qr_id.as_deref(), Some("QR-OFFICE-01"));
        assert_eq!(rows[0].location.as_deref(), Some("Head Office"));
    }

    #[actix_web::test]
    async fn check_in_that_loses_the_insert_race_is_already_marked() {
        let store = Interleaved {
            stale_reads: true,
            ..Interleaved::default()
        };
        mark(&store.inner, 4, AttendanceStatus::Present, None, at(9, 0)).await.unwrap();

        let outcome = mark(&store, 4, AttendanceStatus::Present, None, at(9, 1)).await.unwrap();
        assert_eq!(outcome, MarkOutcome::AlreadyMarked);

        let rows = store.inner.attendance.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].check_in_time, Some(t(9, 0)));
    }

    #[actix_web::test]
    async fn check_out_that_loses_the_update_race_reports_the_winner() {
        let store = Interleaved {
            rival_check_out: Some(t(17, 0)),
            ..Interleaved::default()
        };
        mark(&store, 6, AttendanceStatus::Present, None, at(9, 0)).await.unwrap();

        let outcome = mark(&store, 6, AttendanceStatus::Present, None, at(17, 30)).await.unwrap();
        assert_eq!(
            outcome,
            MarkOutcome::AlreadyCompleted {
                check_in_time: Some(t(9, 0)),
                check_out_time: Some(t(17, 0))
            }
        );
        assert_eq!(store.inner.attendance.lock().unwrap()[0].total_hours, Some(8.0));
    }
}
