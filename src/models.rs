use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::model::user::UserSummary;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub email: String,
    pub exp: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "asha@company.com")]
    pub email: String,
    #[schema(example = "secret123")]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterReqDto {
    #[validate(length(min = 1, message = "Name is required."))]
    #[schema(example = "Asha Rao")]
    pub name: String,
    #[validate(email(message = "A valid email is required."))]
    #[schema(example = "asha@company.com")]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters."))]
    #[schema(example = "secret123")]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordReqDto {
    #[validate(email(message = "A valid email is required."))]
    #[schema(example = "asha@company.com")]
    pub email: String,
}

/// Clients that treat the code as a number drop its leading zeros.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OtpInput {
    Number(u64),
    Text(String),
}

impl OtpInput {
    /// Zero-padded four digit form, or `None` when the input is not a code.
    pub fn normalized(&self) -> Option<String> {
        let digits = match self {
            OtpInput::Number(n) => n.to_string(),
            OtpInput::Text(s) => s.trim().to_string(),
        };
        if digits.is_empty() || digits.len() > 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(format!("{digits:0>4}"))
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOtpReqDto {
    #[schema(example = "asha@company.com")]
    pub email: String,
    #[schema(value_type = String, example = "0427")]
    pub otp: OtpInput,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordReqDto {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetPasswordReqDto {
    pub email: String,
    pub old_password: Option<String>,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileReqDto {
    #[validate(length(min = 1, message = "Name is required."))]
    #[schema(example = "Asha Rao")]
    pub name: String,
    #[validate(email(message = "A valid email is required."))]
    #[schema(example = "asha.rao@company.com")]
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: UserSummary,
}
