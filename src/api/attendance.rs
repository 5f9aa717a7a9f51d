use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    model::attendance::{AttendanceRecord, AttendanceStatus},
    repository::{AttendanceRepository, mysql::MySqlStore},
    service::{
        attendance::{self, MarkOutcome},
        qr::{QrSource, ScanContext},
        report::{AttendanceSummary, summarize},
    },
};
use actix_web::{HttpRequest, HttpResponse, web};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_HISTORY_LIMIT: u32 = 30;
pub const MAX_HISTORY_LIMIT: u32 = 365;

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkAttendanceReq {
    #[schema(example = 1)]
    pub user_id: u64,
    #[schema(example = "Present")]
    pub status: String,
    /// Raw text decoded from the scanned QR code.
    #[schema(example = r#"{"id":"QR-OFFICE-01","location":"Head Office","date":"2026-03-02","time":"all_day"}"#)]
    pub qr_data: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Defaults to the caller.
    pub user_id: Option<u64>,
    /// Rows to return, newest first (1-365, default 30).
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReportQuery {
    pub user_id: Option<u64>,
    /// YYYY-MM-DD, defaults to the first day of the current month.
    #[param(value_type = Option<String>, format = Date)]
    pub start_date: Option<NaiveDate>,
    /// YYYY-MM-DD, defaults to today.
    #[param(value_type = Option<String>, format = Date)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct ReportResponse {
    pub success: bool,
    pub user_id: u64,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<AttendanceRecord>,
    pub summary: AttendanceSummary,
}

fn parse_status(raw: &str) -> Result<AttendanceStatus, AppError> {
    raw.trim().parse().map_err(|_| {
        AppError::Validation("Invalid status. Use Present, Late, Absent or On Leave.".into())
    })
}

/// Check in, or check out when today's check-in already exists
#[utoipa::path(
    post,
    path = "/attendance/mark",
    request_body = MarkAttendanceReq,
    responses(
        (status = 200, description = "Checked in or checked out", body = Object, example = json!({
            "success": true,
            "action": "check_in",
            "message": "Checked in successfully",
            "status": "Present",
            "time": "09:12:44"
        })),
        (status = 400, description = "Invalid status or rejected QR code"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "user_id does not match the token"),
        (status = 409, description = "Attendance already completed for today"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn mark(
    req: HttpRequest,
    auth: AuthUser,
    body: web::Json<MarkAttendanceReq>,
    store: web::Data<MySqlStore>,
    config: web::Data<Config>,
    qr_source: web::Data<QrSource>,
) -> Result<HttpResponse, AppError> {
    auth.require_self(body.user_id)?;
    let requested = parse_status(&body.status)?;
    let now = config.local_now();

    let qr_data = body.qr_data.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let qr_info = match qr_data {
        Some(raw) => {
            let scan = ScanContext {
                user_id: auth.user_id,
                ip_address: req.connection_info().realip_remote_addr().map(str::to_string),
            };
            let verdict = qr_source.validate(store.get_ref(), raw, Some(&scan), now).await?;
            if !verdict.valid {
                debug!(user_id = auth.user_id, email = %auth.email, reason = %verdict.message, "QR code rejected");
                return Ok(HttpResponse::BadRequest().json(json!({
                    "success": false,
                    "message": verdict.message,
                    "qr_info": verdict.qr_info,
                })));
            }
            verdict.qr_info
        }
        None if config.qr.require_qr => {
            return Err(AppError::Validation(
                "QR code is required to mark attendance.".into(),
            ));
        }
        None => None,
    };

    let outcome =
        attendance::mark(store.get_ref(), auth.user_id, requested, qr_info.as_ref(), now).await?;

    Ok(match outcome {
        MarkOutcome::CheckedIn { status, time } => HttpResponse::Ok().json(json!({
            "success": true,
            "action": "check_in",
            "message": "Checked in successfully",
            "status": status,
            "date": now.date(),
            "time": time,
            "qr_info": qr_info,
        })),
        MarkOutcome::CheckedOut {
            check_in_time,
            check_out_time,
            total_hours,
        } => HttpResponse::Ok().json(json!({
            "success": true,
            "action": "check_out",
            "message": "Checked out successfully",
            "date": now.date(),
            "check_in_time": check_in_time,
            "check_out_time": check_out_time,
            "total_hours": total_hours,
        })),
        MarkOutcome::AlreadyCompleted {
            check_in_time,
            check_out_time,
        } => HttpResponse::Conflict().json(json!({
            "success": false,
            "message": "Attendance already completed for today",
            "check_in_time": check_in_time,
            "check_out_time": check_out_time,
        })),
        MarkOutcome::AlreadyMarked => HttpResponse::Conflict().json(json!({
            "success": false,
            "message": "Attendance already marked for today",
        })),
    })
}

/// Recent attendance rows with a 30-day summary
#[utoipa::path(
    get,
    path = "/attendance/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Newest rows first", body = Object),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn history(
    auth: AuthUser,
    query: web::Query<HistoryQuery>,
    store: web::Data<MySqlStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let user_id = query.user_id.unwrap_or(auth.user_id);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let today = config.local_now().date();
    let records = store.recent_for_user(user_id, limit).await?;
    let last_30 = store
        .range_for_user(user_id, today - Duration::days(29), today)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user_id": user_id,
        "data": records,
        "summary": summarize(&last_30),
    })))
}

/// Attendance rows and totals for a date range
#[utoipa::path(
    get,
    path = "/attendance/report",
    params(ReportQuery),
    responses(
        (status = 200, description = "Report for the range", body = ReportResponse),
        (status = 400, description = "start_date after end_date"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn report(
    auth: AuthUser,
    query: web::Query<ReportQuery>,
    store: web::Data<MySqlStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let today = config.local_now().date();
    let user_id = query.user_id.unwrap_or(auth.user_id);
    let start_date = query
        .start_date
        .unwrap_or_else(|| today.with_day(1).unwrap_or(today));
    let end_date = query.end_date.unwrap_or(today);

    if start_date > end_date {
        return Err(AppError::Validation(
            "start_date must not be after end_date.".into(),
        ));
    }

    let data = store.range_for_user(user_id, start_date, end_date).await?;
    let summary = summarize(&data);

    Ok(HttpResponse::Ok().json(ReportResponse {
        success: true,
        user_id,
        start_date,
        end_date,
        data,
        summary,
    }))
}

/// Everyone who has checked in today
#[utoipa::path(
    get,
    path = "/attendance/today",
    responses(
        (status = 200, description = "Today's check-ins, earliest first", body = Object),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today(
    _auth: AuthUser,
    store: web::Data<MySqlStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let date = config.local_now().date();
    let entries = store.checked_in_on(date).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "date": date,
        "count": entries.len(),
        "data": entries,
    })))
}
