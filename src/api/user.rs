use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    models::UpdateProfileReqDto,
    repository::{AttendanceRepository, UserRepository, mysql::MySqlStore},
    service::{account, report::summarize},
};
use actix_web::{HttpResponse, web};
use chrono::Duration;
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ProfileQuery {
    /// Defaults to the caller.
    pub user_id: Option<u64>,
}

/// Profile with the last 30 days of attendance
#[utoipa::path(
    get,
    path = "/user/profile",
    params(ProfileQuery),
    responses(
        (status = 200, description = "User profile", body = Object, example = json!({
            "success": true,
            "user": {"id": 1, "name": "Asha Rao", "email": "asha@company.com"},
            "stats": {"present_days": 18, "late_days": 2}
        })),
        (status = 404, description = "User not found"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "User"
)]
pub async fn profile(
    auth: AuthUser,
    query: web::Query<ProfileQuery>,
    store: web::Data<MySqlStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let user_id = query.user_id.unwrap_or(auth.user_id);
    let user = store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".into()))?;

    let today = config.local_now().date();
    let last_30 = store
        .range_for_user(user_id, today - Duration::days(29), today)
        .await?;
    let summary = summarize(&last_30);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": user.summary(),
        "stats": {
            "present_days": summary.present_days,
            "late_days": summary.late_days,
        },
    })))
}

/// Change the caller's name and e-mail
#[utoipa::path(
    put,
    path = "/user/update",
    request_body = UpdateProfileReqDto,
    responses(
        (status = 200, description = "Profile updated", body = crate::model::user::UserSummary),
        (status = 400, description = "Missing or malformed fields"),
        (status = 409, description = "E-mail belongs to another account"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "User"
)]
pub async fn update(
    auth: AuthUser,
    body: web::Json<UpdateProfileReqDto>,
    store: web::Data<MySqlStore>,
) -> Result<HttpResponse, AppError> {
    let user = account::update_profile(store.get_ref(), auth.user_id, &body).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Profile updated successfully",
        "user": user,
    })))
}

/// Number of registered users
#[utoipa::path(
    get,
    path = "/user/count",
    responses(
        (status = 200, description = "User count", body = Object, example = json!({
            "success": true,
            "count": 42
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "User"
)]
pub async fn count(_auth: AuthUser, store: web::Data<MySqlStore>) -> Result<HttpResponse, AppError> {
    let count = store.count_users().await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": count,
    })))
}
