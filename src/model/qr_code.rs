use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use utoipa::ToSchema;

/// `valid_time` value meaning "any time on `valid_date`".
pub const ALL_DAY: &str = "all_day";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QrCode {
    pub qr_id: String,
    pub qr_type: String,
    pub location: String,
    pub valid_date: NaiveDate,
    pub valid_time: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct NewQrCode {
    pub qr_id: String,
    pub qr_type: String,
    pub location: String,
    pub valid_date: NaiveDate,
    pub valid_time: String,
    pub qr_data: String,
}

#[derive(Debug, Clone)]
pub struct ScanLog {
    pub user_id: u64,
    pub qr_id: String,
    pub location: String,
    pub ip_address: Option<String>,
    pub scanned_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct QrInfo {
    #[schema(example = "QR-OFFICE-01")]
    pub id: String,
    #[serde(rename = "type")]
    #[schema(example = "attendance")]
    pub qr_type: String,
    #[schema(example = "Head Office")]
    pub location: String,
    #[schema(value_type = Option<String>, format = "date", example = "2026-01-01")]
    pub valid_date: Option<NaiveDate>,
    #[schema(example = "all_day")]
    pub valid_time: Option<String>,
}

impl From<&QrCode> for QrInfo {
    fn from(code: &QrCode) -> Self {
        Self {
            id: code.qr_id.clone(),
            qr_type: code.qr_type.clone(),
            location: code.location.clone(),
            valid_date: Some(code.valid_date),
            valid_time: code.valid_time.clone(),
        }
    }
}
