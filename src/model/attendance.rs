use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    #[serde(rename = "On Leave")]
    #[strum(serialize = "On Leave")]
    OnLeave,
}

impl TryFrom<String> for AttendanceStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// `check_in` until the matching check-out lands, then `full_day`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceType {
    CheckIn,
    FullDay,
}

impl TryFrom<String> for AttendanceType {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: u64,
    pub user_id: u64,
    pub date: NaiveDate,
    pub check_in_time: Option<NaiveTime>,
    pub check_out_time: Option<NaiveTime>,
    pub total_hours: Option<f64>,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    #[sqlx(try_from = "String")]
    pub attendance_type: AttendanceType,
    pub qr_id: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCheckIn {
    pub user_id: u64,
    pub date: NaiveDate,
    pub check_in_time: NaiveTime,
    pub status: AttendanceStatus,
    pub qr_id: Option<String>,
    pub location: Option<String>,
}

/// Row of the "who is in today" board.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TodayEntry {
    pub user_id: u64,
    pub name: Option<String>,
    pub date: NaiveDate,
    pub check_in_time: Option<NaiveTime>,
    pub check_out_time: Option<NaiveTime>,
    pub attendance_type: String,
    pub status: String,
}
