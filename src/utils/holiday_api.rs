#![allow(async_fn_in_trait)]

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::{StatusCode, header};
use serde::Deserialize;

use crate::config::HolidayApiConfig;
use crate::model::holiday::{HolidayType, NewHoliday};

#[derive(Debug, thiserror::Error)]
pub enum HolidayApiError {
    /// 204 or 404: the source has nothing for this country and year.
    #[error("no holiday data for {country_code} {year}")]
    NoData { country_code: String, year: i32 },
    #[error("holiday API request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("holiday API answered HTTP {0}")]
    Status(u16),
}

/// One entry of the Nager.Date `PublicHolidays` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceHoliday {
    pub date: NaiveDate,
    #[serde(default)]
    pub local_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub global: Option<bool>,
    #[serde(default)]
    pub counties: Option<Vec<String>>,
    #[serde(default)]
    pub types: Option<Vec<String>>,
}

impl SourceHoliday {
    fn has_type(&self, name: &str) -> bool {
        self.types.iter().flatten().any(|t| t == name)
    }

    pub fn classify(&self) -> HolidayType {
        let mut kind = if self.has_type("Public") {
            HolidayType::National
        } else if self.has_type("Bank") {
            HolidayType::Regional
        } else if self.has_type("Optional") {
            HolidayType::Festival
        } else {
            HolidayType::National
        };

        if self.global == Some(true) {
            kind = HolidayType::National;
        } else if self.counties.as_ref().is_some_and(|c| !c.is_empty()) {
            kind = HolidayType::Regional;
        }
        kind
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.local_name.clone())
            .unwrap_or_default()
    }

    pub fn into_new_holiday(self, country_code: &str) -> NewHoliday {
        let holiday_name = self.display_name();
        let description = self
            .local_name
            .clone()
            .filter(|local| *local != holiday_name && !local.trim().is_empty());
        NewHoliday {
            holiday_date: self.date,
            holiday_type: self.classify(),
            holiday_name,
            country_code: country_code.to_uppercase(),
            description,
        }
    }
}

pub trait HolidaySource {
    async fn public_holidays(
        &self,
        country_code: &str,
        year: i32,
    ) -> Result<Vec<SourceHoliday>, HolidayApiError>;
}

#[derive(Clone)]
pub struct NagerDateClient {
    client: reqwest::Client,
    base_url: String,
}

impl NagerDateClient {
    pub fn new(config: &HolidayApiConfig) -> Result<Self, HolidayApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("AttendanceSystem/1.0")
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl HolidaySource for NagerDateClient {
    async fn public_holidays(
        &self,
        country_code: &str,
        year: i32,
    ) -> Result<Vec<SourceHoliday>, HolidayApiError> {
        let url = format!("{}/PublicHolidays/{year}/{}", self.base_url, country_code.to_uppercase());
        tracing::debug!(%url, "Fetching public holidays");

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json::<Vec<SourceHoliday>>().await?),
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Err(HolidayApiError::NoData {
                country_code: country_code.to_uppercase(),
                year,
            }),
            other => Err(HolidayApiError::Status(other.as_u16())),
        }
    }
}
