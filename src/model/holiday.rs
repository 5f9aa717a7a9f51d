use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
pub enum HolidayType {
    National,
    Regional,
    Festival,
}

impl TryFrom<String> for HolidayType {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Holiday {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(value_type = String, format = "date", example = "2026-01-26")]
    pub holiday_date: NaiveDate,
    #[schema(example = "Republic Day")]
    pub holiday_name: String,
    #[sqlx(try_from = "String")]
    pub holiday_type: HolidayType,
    #[schema(example = "IN")]
    pub country_code: String,
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewHoliday {
    pub holiday_date: NaiveDate,
    pub holiday_name: String,
    pub holiday_type: HolidayType,
    pub country_code: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HolidayPatch {
    pub holiday_name: Option<String>,
    pub holiday_type: Option<HolidayType>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl HolidayPatch {
    pub fn is_empty(&self) -> bool {
        self.holiday_name.is_none()
            && self.holiday_type.is_none()
            && self.description.is_none()
            && self.is_active.is_none()
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct HolidayStats {
    pub country_code: String,
    pub total_holidays: i64,
    #[schema(value_type = Option<String>, format = "date")]
    pub first_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "date")]
    pub last_date: Option<NaiveDate>,
}
