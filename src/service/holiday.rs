use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::model::holiday::{Holiday, HolidayPatch, HolidayType, NewHoliday};
use crate::repository::HolidayRepository;
use crate::utils::holiday_api::{HolidayApiError, HolidaySource};

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncReport {
    #[schema(example = "IN")]
    pub country_code: String,
    #[schema(example = 2026)]
    pub year: i32,
    pub total_holidays: usize,
    pub synced: usize,
    pub failed: usize,
    /// `name (date)` for each row that could not be stored.
    pub errors: Vec<String>,
}

/// Two ASCII letters, returned upper-cased.
pub fn parse_country_code(raw: &str) -> Result<String, AppError> {
    let code = raw.trim().to_uppercase();
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::Validation(
            "Country code must be a 2-letter ISO code.".into(),
        ));
    }
    Ok(code)
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation("Invalid date format. Use YYYY-MM-DD.".into()))
}

pub fn parse_holiday_type(raw: &str) -> Result<HolidayType, AppError> {
    raw.trim().parse().map_err(|_| {
        AppError::Validation("Invalid holiday type. Use National, Regional or Festival.".into())
    })
}

pub fn new_holiday(
    date: &str,
    name: &str,
    kind: Option<&str>,
    country_code: &str,
    description: Option<String>,
) -> Result<NewHoliday, AppError> {
    let holiday_name = name.trim();
    if holiday_name.is_empty() {
        return Err(AppError::Validation("Holiday name is required.".into()));
    }
    Ok(NewHoliday {
        holiday_date: parse_date(date)?,
        holiday_name: holiday_name.to_string(),
        holiday_type: kind.map(parse_holiday_type).transpose()?.unwrap_or(HolidayType::National),
        country_code: parse_country_code(country_code)?,
        description: description.filter(|d| !d.trim().is_empty()),
    })
}

/// Upserts one holiday and returns the stored row.
pub async fn save_holiday<R: HolidayRepository>(
    repo: &R,
    holiday: &NewHoliday,
) -> Result<Holiday, AppError> {
    repo.upsert_holiday(holiday).await?;
    info!(
        country_code = %holiday.country_code,
        date = %holiday.holiday_date,
        "Holiday saved"
    );
    repo.active_holiday_on(&holiday.country_code, holiday.holiday_date)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("holiday missing after upsert")))
}

pub async fn update_holiday<R: HolidayRepository>(
    repo: &R,
    id: u64,
    patch: &HolidayPatch,
) -> Result<Holiday, AppError> {
    if patch.is_empty() {
        return Err(AppError::Validation("No fields to update.".into()));
    }
    if patch.holiday_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::Validation("Holiday name cannot be empty.".into()));
    }
    if repo.find_holiday(id).await?.is_none() {
        return Err(AppError::NotFound("Holiday not found.".into()));
    }

    repo.update_holiday(id, patch).await?;
    repo.find_holiday(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Holiday not found.".into()))
}

pub async fn delete_holiday<R: HolidayRepository>(repo: &R, id: u64) -> Result<(), AppError> {
    if repo.find_holiday(id).await?.is_none() {
        return Err(AppError::NotFound("Holiday not found.".into()));
    }
    repo.deactivate_holiday(id).await?;
    info!(holiday_id = id, "Holiday deactivated");
    Ok(())
}

/// Pulls one year from the external calendar and upserts row by row. A failed
/// row is reported and the rest still land.
pub async fn sync_holidays<R, S>(
    repo: &R,
    source: &S,
    country_code: &str,
    year: i32,
) -> Result<SyncReport, AppError>
where
    R: HolidayRepository,
    S: HolidaySource,
{
    let country_code = parse_country_code(country_code)?;
    if !(1900..=2100).contains(&year) {
        return Err(AppError::Validation("Year must be between 1900 and 2100.".into()));
    }

    let entries = match source.public_holidays(&country_code, year).await {
        Ok(entries) => entries,
        Err(HolidayApiError::NoData { .. }) => {
            return Err(AppError::NotFound(format!(
                "No holiday data available for {country_code} in {year}."
            )));
        }
        Err(e) => {
            warn!(error = %e, %country_code, year, "Holiday API call failed");
            return Err(AppError::Upstream(
                "Failed to fetch holidays from the holiday API.".into(),
            ));
        }
    };

    let total_holidays = entries.len();
    let mut synced = 0;
    let mut errors = Vec::new();

    for entry in entries {
        let holiday = entry.into_new_holiday(&country_code);
        match repo.upsert_holiday(&holiday).await {
            Ok(()) => synced += 1,
            Err(e) => {
                warn!(error = %e, %country_code, date = %holiday.holiday_date, "Holiday upsert failed");
                errors.push(format!("{} ({})", holiday.holiday_name, holiday.holiday_date));
            }
        }
    }

    info!(%country_code, year, total_holidays, synced, failed = errors.len(), "Holiday sync finished");
    Ok(SyncReport {
        country_code,
        year,
        total_holidays,
        synced,
        failed: errors.len(),
        errors,
    })
}
