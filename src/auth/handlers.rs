use crate::{
    config::Config,
    error::AppError,
    models::{
        AuthResponse, ForgotPasswordReqDto, LoginReqDto, RegisterReqDto, ResetPasswordReqDto,
        SetPasswordReqDto, VerifyOtpReqDto,
    },
    repository::mysql::MySqlStore,
    service::{
        account::{self, LoginOutcome, validation_message},
        otp,
    },
    utils::mailer::SendGridMailer,
};
use actix_web::{HttpResponse, web};
use serde_json::json;
use tracing::{debug, info, instrument};
use validator::Validate;

// auth end points

/// Log in with e-mail and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token issued, or first-login password change required", body = AuthResponse),
        (status = 401, description = "Invalid password"),
        (status = 403, description = "Account has no password yet", body = Object, example = json!({
            "success": false,
            "action": "set_password",
            "message": "Please set your password first."
        })),
        (status = 404, description = "No user with this e-mail")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(store, config, req), fields(email = %req.email))]
pub async fn login(
    req: web::Json<LoginReqDto>,
    store: web::Data<MySqlStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    let outcome = account::login(store.get_ref(), &req.email, &req.password, &config).await?;

    Ok(login_response(outcome))
}

fn login_response(outcome: LoginOutcome) -> HttpResponse {
    match outcome {
        LoginOutcome::Authenticated { token, user } => HttpResponse::Ok().json(AuthResponse {
            success: true,
            message: "Login successful.".into(),
            token,
            user,
        }),
        LoginOutcome::FirstLogin { user } => {
            debug!(user_id = user.id, "First login, password change required");
            HttpResponse::Ok().json(json!({
                "success": true,
                "action": "set_password",
                "message": "Please set a new password to continue.",
                "user": user,
            }))
        }
        LoginOutcome::PasswordNotSet { user } => HttpResponse::Forbidden().json(json!({
            "success": false,
            "action": "set_password",
            "message": "Please set your password first.",
            "user": user,
        })),
    }
}

/// Create an account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReqDto,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Missing or malformed fields"),
        (status = 409, description = "E-mail already registered")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip(store, mailer, config, req), fields(email = %req.email))]
pub async fn register(
    req: web::Json<RegisterReqDto>,
    store: web::Data<MySqlStore>,
    mailer: web::Data<SendGridMailer>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let (token, user) = account::register(store.get_ref(), mailer.get_ref(), &req, &config).await?;

    Ok(HttpResponse::Created().json(AuthResponse {
        success: true,
        message: "User registered successfully.".into(),
        token,
        user,
    }))
}

/// Start a password reset
///
/// Always answers with the same message whether or not the address is known.
#[utoipa::path(
    post,
    path = "/auth/forgot_password",
    request_body = ForgotPasswordReqDto,
    responses(
        (status = 200, description = "Request accepted", body = Object, example = json!({
            "success": true,
            "message": "If an account exists for this email, an OTP has been sent."
        })),
        (status = 400, description = "Invalid e-mail"),
        (status = 500, description = "Mail delivery failed")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_forgot_password", skip(store, mailer, config, req))]
pub async fn forgot_password(
    req: web::Json<ForgotPasswordReqDto>,
    store: web::Data<MySqlStore>,
    mailer: web::Data<SendGridMailer>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    req.validate()
        .map_err(|e| AppError::Validation(validation_message(&e)))?;

    let outcome = otp::request_otp(
        store.get_ref(),
        mailer.get_ref(),
        &req.email,
        &config,
        config.local_now(),
    )
    .await?;

    let mut body = json!({
        "success": true,
        "message": "If an account exists for this email, an OTP has been sent.",
    });
    if let Some(code) = outcome.dev_otp {
        body["otp"] = json!(code);
    }
    Ok(HttpResponse::Ok().json(body))
}

/// Check a one-time code
#[utoipa::path(
    post,
    path = "/auth/verify_otp",
    request_body = VerifyOtpReqDto,
    responses(
        (status = 200, description = "Code accepted", body = Object, example = json!({
            "success": true,
            "message": "OTP verified successfully."
        })),
        (status = 400, description = "Missing, expired, used or wrong code")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_verify_otp", skip(store, config, req))]
pub async fn verify_otp(
    req: web::Json<VerifyOtpReqDto>,
    store: web::Data<MySqlStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    otp::verify_otp(store.get_ref(), &req.email, &req.otp, config.local_now()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "OTP verified successfully.",
    })))
}

/// Choose a new password after a verified code
#[utoipa::path(
    post,
    path = "/auth/reset_password",
    request_body = ResetPasswordReqDto,
    responses(
        (status = 200, description = "Password replaced", body = AuthResponse),
        (status = 400, description = "Missing or short password"),
        (status = 403, description = "No verified code for this e-mail"),
        (status = 404, description = "User not found")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_reset_password", skip(store, config, req))]
pub async fn reset_password(
    req: web::Json<ResetPasswordReqDto>,
    store: web::Data<MySqlStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let (token, user) = otp::reset_password(
        store.get_ref(),
        &req.email,
        &req.password,
        &config,
        config.local_now(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        success: true,
        message: "Password reset successfully.".into(),
        token,
        user,
    }))
}

/// Set or change a password
///
/// `old_password` is checked only when the account already has one.
#[utoipa::path(
    post,
    path = "/auth/set_password",
    request_body = SetPasswordReqDto,
    responses(
        (status = 200, description = "Password stored", body = AuthResponse),
        (status = 400, description = "Mismatch or too short"),
        (status = 401, description = "Current password is incorrect"),
        (status = 404, description = "User not found")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_set_password", skip(store, config, req))]
pub async fn set_password(
    req: web::Json<SetPasswordReqDto>,
    store: web::Data<MySqlStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let (token, user) = account::set_password(store.get_ref(), &req, &config).await?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        success: true,
        message: "Password set successfully.".into(),
        token,
        user,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::user::UserSummary;
    use actix_web::{body::to_bytes, http::StatusCode};

    fn asha() -> UserSummary {
        UserSummary {
            id: 1,
            name: Some("Asha".into()),
            email: "asha@company.com".into(),
        }
    }

    async fn body_of(resp: HttpResponse) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[actix_web::test]
    async fn account_without_password_is_forbidden_with_an_action() {
        let resp = login_response(LoginOutcome::PasswordNotSet { user: asha() });
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let body = body_of(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["action"], "set_password");
        assert_eq!(body["message"], "Please set your password first.");
        assert_eq!(body["user"]["email"], "asha@company.com");
        assert!(body.get("token").is_none());
    }

    #[actix_web::test]
    async fn first_login_succeeds_without_a_token() {
        let resp = login_response(LoginOutcome::FirstLogin { user: asha() });
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_of(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["action"], "set_password");
        assert!(body.get("token").is_none());
    }

    #[actix_web::test]
    async fn authenticated_login_carries_the_token() {
        let resp = login_response(LoginOutcome::Authenticated {
            token: "signed".into(),
            user: asha(),
        });
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_of(resp).await["token"], "signed");
    }
}
