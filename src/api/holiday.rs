use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    model::holiday::{Holiday, HolidayPatch},
    repository::{HolidayFilter, HolidayRepository, mysql::MySqlStore},
    service::holiday::{self, parse_country_code, parse_date, parse_holiday_type},
    utils::holiday_api::NagerDateClient,
};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct HolidayListQuery {
    /// YYYY-MM-DD, defaults to the first day of the current month.
    pub start_date: Option<String>,
    /// YYYY-MM-DD, defaults to the last day of the current month.
    pub end_date: Option<String>,
    /// ISO 3166-1 alpha-2, defaults to the configured country.
    pub country_code: Option<String>,
    /// National, Regional or Festival.
    #[serde(rename = "type")]
    pub holiday_type: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HolidayCheckQuery {
    /// YYYY-MM-DD, defaults to today.
    pub date: Option<String>,
    pub country_code: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateHoliday {
    #[schema(example = "2026-10-02")]
    pub holiday_date: String,
    #[schema(example = "Gandhi Jayanti")]
    pub holiday_name: String,
    #[schema(example = "National")]
    pub holiday_type: Option<String>,
    #[schema(example = "IN")]
    pub country_code: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateHoliday {
    #[schema(example = 1)]
    pub id: Option<u64>,
    pub holiday_name: Option<String>,
    #[schema(example = "Festival")]
    pub holiday_type: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteHoliday {
    #[schema(example = 1)]
    pub id: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SyncHolidaysReq {
    #[schema(example = "IN")]
    pub country_code: Option<String>,
    /// Defaults to the current year.
    #[schema(example = 2026)]
    pub year: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct HolidayListResponse {
    pub success: bool,
    pub country_code: String,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub count: usize,
    pub data: Vec<Holiday>,
}

fn month_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = today.with_day(1).unwrap_or(today);
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    let last = next_month.map(|d| d - Duration::days(1)).unwrap_or(today);
    (first, last)
}

fn require_id(id: Option<u64>) -> Result<u64, AppError> {
    id.ok_or_else(|| AppError::Validation("Missing holiday ID".into()))
}

fn country_or_default(raw: Option<&str>, config: &Config) -> Result<String, AppError> {
    match raw.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => parse_country_code(code),
        None => Ok(config.default_country_code.clone()),
    }
}

/// Active holidays in a date range
#[utoipa::path(
    get,
    path = "/attendance/holidays",
    params(HolidayListQuery),
    responses(
        (status = 200, description = "Holidays ordered by date", body = HolidayListResponse),
        (status = 400, description = "Bad date, type or country code"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Holiday"
)]
pub async fn list_holidays(
    _auth: AuthUser,
    query: web::Query<HolidayListQuery>,
    store: web::Data<MySqlStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let (month_start, month_end) = month_bounds(config.local_now().date());
    let start_date = query.start_date.as_deref().map(parse_date).transpose()?.unwrap_or(month_start);
    let end_date = query.end_date.as_deref().map(parse_date).transpose()?.unwrap_or(month_end);
    let country_code = country_or_default(query.country_code.as_deref(), &config)?;
    let holiday_type = query
        .holiday_type
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .map(parse_holiday_type)
        .transpose()?;

    let data = store
        .list_holidays(&HolidayFilter {
            country_code: country_code.clone(),
            start: start_date,
            end: end_date,
            holiday_type,
        })
        .await?;

    Ok(HttpResponse::Ok().json(HolidayListResponse {
        success: true,
        country_code,
        start_date,
        end_date,
        count: data.len(),
        data,
    }))
}

/// Whether a date is a holiday
#[utoipa::path(
    get,
    path = "/attendance/holidays/check",
    params(HolidayCheckQuery),
    responses(
        (status = 200, description = "Lookup result", body = Object, example = json!({
            "success": true,
            "date": "2026-01-26",
            "is_holiday": true,
            "holiday": {"holiday_name": "Republic Day"}
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Holiday"
)]
pub async fn check_holiday(
    _auth: AuthUser,
    query: web::Query<HolidayCheckQuery>,
    store: web::Data<MySqlStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let date = match query.date.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => config.local_now().date(),
    };
    let country_code = country_or_default(query.country_code.as_deref(), &config)?;
    let holiday = store.active_holiday_on(&country_code, date).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "date": date,
        "country_code": country_code,
        "is_holiday": holiday.is_some(),
        "holiday": holiday,
    })))
}

/// Active holiday counts per country
#[utoipa::path(
    get,
    path = "/attendance/holidays/stats",
    responses(
        (status = 200, description = "One entry per country", body = Vec<crate::model::holiday::HolidayStats>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Holiday"
)]
pub async fn holiday_stats(
    _auth: AuthUser,
    store: web::Data<MySqlStore>,
) -> Result<HttpResponse, AppError> {
    let stats = store.holiday_stats().await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": stats,
    })))
}

/// Add a holiday, or overwrite and re-activate the one on the same date
#[utoipa::path(
    post,
    path = "/attendance/manage_holidays",
    request_body = CreateHoliday,
    responses(
        (status = 200, description = "Holiday stored", body = Holiday),
        (status = 400, description = "Missing name, bad date, type or country"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Holiday"
)]
pub async fn create_holiday(
    auth: AuthUser,
    body: web::Json<CreateHoliday>,
    store: web::Data<MySqlStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let country_code = country_or_default(body.country_code.as_deref(), &config)?;
    let new = holiday::new_holiday(
        &body.holiday_date,
        &body.holiday_name,
        body.holiday_type.as_deref(),
        &country_code,
        body.description,
    )?;

    let saved = holiday::save_holiday(store.get_ref(), &new).await?;
    info!(user_id = auth.user_id, holiday_id = saved.id, "Holiday added");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Holiday saved successfully",
        "data": saved,
    })))
}

/// Change any of name, type, description or active flag
#[utoipa::path(
    put,
    path = "/attendance/manage_holidays",
    request_body = UpdateHoliday,
    responses(
        (status = 200, description = "Holiday updated", body = Holiday),
        (status = 400, description = "Missing id or nothing to update"),
        (status = 404, description = "Unknown holiday id"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Holiday"
)]
pub async fn update_holiday(
    auth: AuthUser,
    body: web::Json<UpdateHoliday>,
    store: web::Data<MySqlStore>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let id = require_id(body.id)?;
    let patch = HolidayPatch {
        holiday_name: body.holiday_name.map(|n| n.trim().to_string()),
        holiday_type: body.holiday_type.as_deref().map(parse_holiday_type).transpose()?,
        description: body.description,
        is_active: body.is_active,
    };

    let updated = holiday::update_holiday(store.get_ref(), id, &patch).await?;
    info!(user_id = auth.user_id, holiday_id = id, "Holiday updated");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Holiday updated successfully",
        "data": updated,
    })))
}

/// Soft-delete a holiday
#[utoipa::path(
    delete,
    path = "/attendance/manage_holidays",
    request_body = DeleteHoliday,
    responses(
        (status = 200, description = "Holiday deactivated"),
        (status = 400, description = "Missing id"),
        (status = 404, description = "Unknown holiday id"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Holiday"
)]
pub async fn delete_holiday(
    auth: AuthUser,
    body: web::Json<DeleteHoliday>,
    store: web::Data<MySqlStore>,
) -> Result<HttpResponse, AppError> {
    let id = require_id(body.id)?;
    holiday::delete_holiday(store.get_ref(), id).await?;
    info!(user_id = auth.user_id, holiday_id = id, "Holiday deleted");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Holiday deleted successfully",
    })))
}

/// Import a year of public holidays from Nager.Date
#[utoipa::path(
    post,
    path = "/attendance/sync_holidays",
    request_body = SyncHolidaysReq,
    responses(
        (status = 200, description = "Per-row outcome of the import", body = crate::service::holiday::SyncReport),
        (status = 400, description = "Bad country code or year"),
        (status = 404, description = "Source has no data for the country and year"),
        (status = 500, description = "Holiday API unavailable")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Holiday"
)]
pub async fn sync_holidays(
    auth: AuthUser,
    body: web::Json<SyncHolidaysReq>,
    store: web::Data<MySqlStore>,
    source: web::Data<NagerDateClient>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let country_code = body
        .country_code
        .clone()
        .unwrap_or_else(|| config.default_country_code.clone());
    let year = body.year.unwrap_or_else(|| config.local_now().year());

    info!(user_id = auth.user_id, %country_code, year, "Holiday sync requested");
    let report = holiday::sync_holidays(store.get_ref(), source.get_ref(), &country_code, year).await?;

    let message = if report.failed == 0 {
        format!("Synced {} holidays for {} {}", report.synced, report.country_code, report.year)
    } else {
        format!(
            "Synced {} of {} holidays for {} {}",
            report.synced, report.total_holidays, report.country_code, report.year
        )
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": message,
        "data": report,
    })))
}
