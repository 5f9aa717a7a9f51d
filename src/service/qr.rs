//! QR payload validation. A deployment either trusts one static code
//! configured in the environment or checks per-day codes stored in
//! `qr_codes`; the choice is made once at start-up.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::config::QrConfig;
use crate::error::AppError;
use crate::model::qr_code::{ALL_DAY, NewQrCode, QrCode, QrInfo, ScanLog};
use crate::repository::{QrCodeRepository, RepoError};

/// Seconds either side of `valid_time` during which a timed code is accepted.
const TIME_WINDOW_SECS: i64 = 2 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct QrVerdict {
    pub valid: bool,
    pub message: String,
    pub qr_info: Option<QrInfo>,
}

impl QrVerdict {
    fn accepted(info: QrInfo) -> Self {
        Self {
            valid: true,
            message: "QR code is valid".into(),
            qr_info: Some(info),
        }
    }

    fn rejected(message: impl Into<String>, info: Option<QrInfo>) -> Self {
        Self {
            valid: false,
            message: message.into(),
            qr_info: info,
        }
    }
}

/// Who scanned, for the audit trail.
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub user_id: u64,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StaticAllowList {
    payload: Option<String>,
    hash: Option<String>,
    id: Option<String>,
    reference: Option<Map<String, Value>>,
}

#[derive(Debug, Clone)]
pub enum QrSource {
    StaticAllowList(StaticAllowList),
    DatabaseBacked,
}

impl QrSource {
    pub fn from_config(config: &QrConfig) -> Self {
        if config.static_payload.is_none() && config.static_hash.is_none() && config.static_id.is_none() {
            return QrSource::DatabaseBacked;
        }

        let reference = config
            .static_payload
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
            .and_then(|v| match v {
                Value::Object(map) if !map.is_empty() => Some(map),
                _ => None,
            });

        QrSource::StaticAllowList(StaticAllowList {
            payload: config.static_payload.as_ref().map(|p| p.trim().to_string()),
            hash: config.static_hash.as_ref().map(|h| h.trim().to_lowercase()),
            id: config.static_id.clone(),
            reference,
        })
    }

    pub async fn validate<R: QrCodeRepository>(
        &self,
        repo: &R,
        raw: &str,
        scan: Option<&ScanContext>,
        now: NaiveDateTime,
    ) -> Result<QrVerdict, AppError> {
        let raw = raw.trim();
        let Ok(payload) = serde_json::from_str::<Value>(raw) else {
            return Ok(QrVerdict::rejected("Invalid QR code format", None));
        };

        let verdict = match self {
            QrSource::StaticAllowList(list) => list.check(raw, &payload, now.date()),
            QrSource::DatabaseBacked => validate_against_store(repo, raw, &payload, now).await?,
        };

        if let (true, Some(info), Some(scan)) = (verdict.valid, &verdict.qr_info, scan) {
            let log = ScanLog {
                user_id: scan.user_id,
                qr_id: info.id.clone(),
                location: info.location.clone(),
                ip_address: scan.ip_address.clone(),
                scanned_at: now,
            };
            if let Err(e) = repo.log_scan(&log).await {
                warn!(error = %e, qr_id = %info.id, user_id = scan.user_id, "Failed to log QR scan");
            }
        }

        Ok(verdict)
    }
}

pub fn payload_hash(raw: &str) -> String {
    let digest = Sha256::digest(raw.trim().as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Strings compare as-is; numbers and booleans by their JSON text.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn field(payload: &Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(as_text)
        .filter(|s| !s.trim().is_empty())
}

impl StaticAllowList {
    fn matches(&self, raw: &str, payload: &Value) -> bool {
        if self.payload.as_deref() == Some(raw) {
            return true;
        }
        if self.hash.as_deref() == Some(payload_hash(raw).as_str()) {
            return true;
        }
        if let Some(id) = &self.id {
            let scanned_id = field(payload, "id").or_else(|| as_text(payload));
            if scanned_id.as_deref() == Some(id.as_str()) {
                return true;
            }
        }
        if let Some(reference) = &self.reference {
            return reference
                .iter()
                .all(|(key, expected)| payload.get(key).and_then(as_text) == as_text(expected));
        }
        false
    }

    fn check(&self, raw: &str, payload: &Value, today: NaiveDate) -> QrVerdict {
        if !self.matches(raw, payload) {
            debug!("Scanned payload does not match the static QR code");
            return QrVerdict::rejected("Invalid QR code", None);
        }

        QrVerdict::accepted(QrInfo {
            id: field(payload, "id")
                .or_else(|| self.id.clone())
                .unwrap_or_else(|| "static".to_string()),
            qr_type: field(payload, "type").unwrap_or_else(|| "attendance".to_string()),
            location: field(payload, "location").unwrap_or_else(|| "Office".to_string()),
            valid_date: Some(today),
            valid_time: Some(ALL_DAY.to_string()),
        })
    }
}

async fn validate_against_store<R: QrCodeRepository>(
    repo: &R,
    raw: &str,
    payload: &Value,
    now: NaiveDateTime,
) -> Result<QrVerdict, AppError> {
    let (Some(qr_id), Some(location)) = (field(payload, "id"), field(payload, "location")) else {
        return Ok(QrVerdict::rejected("Missing required field: id or location", None));
    };

    let code = match repo.find_qr_code(&qr_id).await? {
        Some(code) => code,
        None => {
            let Some(valid_date) = field(payload, "date")
                .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
            else {
                return Ok(QrVerdict::rejected("Missing or invalid field: date", None));
            };
            let new_code = NewQrCode {
                qr_id: qr_id.clone(),
                qr_type: field(payload, "type").unwrap_or_else(|| "attendance".to_string()),
                location,
                valid_date,
                valid_time: field(payload, "time").unwrap_or_else(|| ALL_DAY.to_string()),
                qr_data: raw.to_string(),
            };
            register(repo, &new_code).await?
        }
    };

    Ok(check_constraints(&code, now))
}

/// Inserts an unseen code; if another scan registered it first, reads that row.
async fn register<R: QrCodeRepository>(repo: &R, code: &NewQrCode) -> Result<QrCode, AppError> {
    match repo.create_qr_code(code).await {
        Ok(()) | Err(RepoError::Duplicate) => {}
        Err(e) => return Err(e.into()),
    }
    repo.find_qr_code(&code.qr_id).await?.ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("QR code {} missing after registration", code.qr_id))
    })
}

fn parse_valid_time(value: &str) -> Option<NaiveTime> {
    ["%H:%M:%S", "%H:%M", "%I:%M %p", "%I:%M%p"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(value.trim(), fmt).ok())
}

pub fn check_constraints(code: &QrCode, now: NaiveDateTime) -> QrVerdict {
    let info = QrInfo::from(code);
    let today = now.date();

    if !code.is_active {
        return QrVerdict::rejected("This QR code has been deactivated", Some(info));
    }
    if code.valid_date < today {
        return QrVerdict::rejected("This QR code has expired", Some(info));
    }
    if code.valid_date > today {
        return QrVerdict::rejected("This QR code is not valid yet", Some(info));
    }

    match code.valid_time.as_deref().map(str::trim) {
        None | Some("") | Some(ALL_DAY) => {}
        Some(slot) => {
            let Some(slot_time) = parse_valid_time(slot) else {
                return QrVerdict::rejected("QR code has an invalid time window", Some(info));
            };
            let diff = (now.time() - slot_time).num_seconds().abs();
            if diff > TIME_WINDOW_SECS {
                return QrVerdict::rejected(
                    format!("QR code is only valid around {}", slot_time.format("%-I:%M %p")),
                    Some(info),
                );
            }
        }
    }

    QrVerdict::accepted(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::MemoryStore;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn payload(id: &str, date: &str, time: &str) -> String {
        serde_json::json!({
            "type": "attendance",
            "id": id,
            "location": "Head Office",
            "date": date,
            "time": time,
        })
        .to_string()
    }

    fn stored(id: &str, valid_date: NaiveDate, valid_time: &str, is_active: bool) -> QrCode {
        QrCode {
            qr_id: id.into(),
            qr_type: "attendance".into(),
            location: "Head Office".into(),
            valid_date,
            valid_time: Some(valid_time.into()),
            is_active,
        }
    }

    #[actix_web::test]
    async fn unparseable_payload_is_rejected() {
        let store = MemoryStore::default();
        let verdict = QrSource::DatabaseBacked
            .validate(&store, "not json {", None, now())
            .await
            .unwrap();
        assert!(!verdict.valid);
        assert_eq!(verdict.message, "Invalid QR code format");
    }

    #[actix_web::test]
    async fn static_hash_match_ignores_database() {
        let raw = r#"{"id":"OFFICE","location":"HQ"}"#;
        let source = QrSource::from_config(&QrConfig {
            static_hash: Some(payload_hash(raw).to_uppercase()),
            ..QrConfig::default()
        });
        let store = MemoryStore {
            fail_scan_log: true,
            ..MemoryStore::default()
        };
        let scan = ScanContext {
            user_id: 1,
            ip_address: None,
        };

        let verdict = source.validate(&store, raw, Some(&scan), now()).await.unwrap();
        assert!(verdict.valid);
        assert_eq!(verdict.qr_info.unwrap().location, "HQ");
        assert!(store.qr_codes.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn static_reference_subset_match() {
        let source = QrSource::from_config(&QrConfig {
            static_payload: Some(r#"{"id":"OFFICE","version":1}"#.into()),
            ..QrConfig::default()
        });
        let store = MemoryStore::default();

        let ok = source
            .validate(&store, r#"{"id":"OFFICE","version":"1","location":"HQ"}"#, None, now())
            .await
            .unwrap();
        assert!(ok.valid);

        let bad = source
            .validate(&store, r#"{"id":"OTHER","version":1}"#, None, now())
            .await
            .unwrap();
        assert!(!bad.valid);
    }

    #[actix_web::test]
    async fn static_id_matches_payload_id() {
        let source = QrSource::from_config(&QrConfig {
            static_id: Some("OFFICE-QR".into()),
            ..QrConfig::default()
        });
        let store = MemoryStore::default();
        let verdict = source
            .validate(&store, r#"{"id":"OFFICE-QR"}"#, None, now())
            .await
            .unwrap();
        assert!(verdict.valid);
        assert_eq!(verdict.qr_info.unwrap().id, "OFFICE-QR");
    }

    #[actix_web::test]
    async fn unseen_code_is_registered_and_scan_logged() {
        let store = MemoryStore::default();
        let scan = ScanContext {
            user_id: 9,
            ip_address: Some("10.0.0.5".into()),
        };

        let verdict = QrSource::DatabaseBacked
            .validate(&store, &payload("QR-1", "2026-03-02", "all_day"), Some(&scan), now())
            .await
            .unwrap();

        assert!(verdict.valid, "{}", verdict.message);
        assert_eq!(store.qr_codes.lock().unwrap().len(), 1);
        let scans = store.scans.lock().unwrap();
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].user_id, 9);
        assert_eq!(scans[0].ip_address.as_deref(), Some("10.0.0.5"));
    }

    #[actix_web::test]
    async fn failed_scan_log_does_not_reject() {
        let store = MemoryStore {
            fail_scan_log: true,
            ..MemoryStore::default()
        };
        let scan = ScanContext {
            user_id: 9,
            ip_address: None,
        };
        let verdict = QrSource::DatabaseBacked
            .validate(&store, &payload("QR-2", "2026-03-02", "all_day"), Some(&scan), now())
            .await
            .unwrap();
        assert!(verdict.valid);
    }

    #[test]
    fn yesterday_is_expired_and_tomorrow_not_yet_valid() {
        let today = now().date();
        let yesterday = stored("Y", today.pred_opt().unwrap(), ALL_DAY, true);
        let tomorrow = stored("T", today.succ_opt().unwrap(), ALL_DAY, true);

        assert_eq!(check_constraints(&yesterday, now()).message, "This QR code has expired");
        assert_eq!(
            check_constraints(&tomorrow, now()).message,
            "This QR code is not valid yet"
        );
    }

    #[test]
    fn inactive_code_is_rejected() {
        let code = stored("X", now().date(), ALL_DAY, false);
        let verdict = check_constraints(&code, now());
        assert!(!verdict.valid);
        assert_eq!(verdict.message, "This QR code has been deactivated");
    }

    #[test]
    fn timed_code_accepts_two_hours_either_side() {
        let code = stored("X", now().date(), "09:00", true);
        assert!(check_constraints(&code, now()).valid);

        let late = now().date().and_hms_opt(11, 1, 0).unwrap();
        let verdict = check_constraints(&code, late);
        assert!(!verdict.valid);
        assert_eq!(verdict.message, "QR code is only valid around 9:00 AM");
    }

    #[actix_web::test]
    async fn missing_location_is_rejected() {
        let store = MemoryStore::default();
        let verdict = QrSource::DatabaseBacked
            .validate(&store, r#"{"id":"QR-3","date":"2026-03-02"}"#, None, now())
            .await
            .unwrap();
        assert!(!verdict.valid);
        assert!(store.qr_codes.lock().unwrap().is_empty());
    }
}
