use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    repository::mysql::MySqlStore,
    service::qr::QrSource,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidateQrReq {
    #[schema(example = r#"{"id":"QR-OFFICE-01","location":"Head Office","date":"2026-03-02","time":"09:00"}"#)]
    pub qr_data: String,
}

/// Check a scanned QR payload without marking attendance
#[utoipa::path(
    post,
    path = "/qr/validate",
    request_body = ValidateQrReq,
    responses(
        (status = 200, description = "QR code accepted", body = crate::service::qr::QrVerdict),
        (status = 400, description = "QR code rejected", body = crate::service::qr::QrVerdict),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "QR"
)]
pub async fn validate(
    _auth: AuthUser,
    body: web::Json<ValidateQrReq>,
    store: web::Data<MySqlStore>,
    config: web::Data<Config>,
    qr_source: web::Data<QrSource>,
) -> Result<HttpResponse, AppError> {
    if body.qr_data.trim().is_empty() {
        return Err(AppError::Validation("QR data is required".into()));
    }

    let verdict = qr_source
        .validate(store.get_ref(), &body.qr_data, None, config.local_now())
        .await?;

    let mut resp = if verdict.valid {
        HttpResponse::Ok()
    } else {
        HttpResponse::BadRequest()
    };
    Ok(resp.json(json!({
        "success": verdict.valid,
        "valid": verdict.valid,
        "message": verdict.message,
        "qr_info": verdict.qr_info,
    })))
}
