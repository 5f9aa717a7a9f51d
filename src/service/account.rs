use tracing::{info, warn};
use validator::Validate;

use crate::auth::jwt::generate_token;
use crate::auth::password::{hash_password, needs_rehash, verify_password};
use crate::config::Config;
use crate::error::AppError;
use crate::model::user::{User, UserSummary};
use crate::models::{RegisterReqDto, SetPasswordReqDto, UpdateProfileReqDto};
use crate::repository::{PasswordResetRepository, RepoError, UserRepository};
use crate::utils::mailer::Mailer;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug)]
pub enum LoginOutcome {
    Authenticated { token: String, user: UserSummary },
    /// Correct password, but the account must choose a new one first.
    FirstLogin { user: UserSummary },
    /// The account has never had a password.
    PasswordNotSet { user: UserSummary },
}

/// Account e-mails are matched case-insensitively and stored trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn issue_token(user: &User, config: &Config) -> Result<String, AppError> {
    generate_token(user.id, &user.email, &config.jwt_secret, config.token_ttl)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to sign token: {e}")))
}

pub fn hash(password: &str) -> Result<String, AppError> {
    hash_password(password).map_err(|e| AppError::Internal(anyhow::anyhow!("failed to hash password: {e}")))
}

pub fn validation_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Invalid request.".to_string())
}

pub async fn login<R: UserRepository>(
    repo: &R,
    email: &str,
    password: &str,
    config: &Config,
) -> Result<LoginOutcome, AppError> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AppError::Validation("Email and password are required.".into()));
    }

    let user = repo
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("No user exists with this email ID.".into()))?;

    let Some(stored) = user.password.as_deref() else {
        info!(user_id = user.id, "Login attempt before password was set");
        return Ok(LoginOutcome::PasswordNotSet { user: user.summary() });
    };

    if !verify_password(password, stored) {
        return Err(AppError::Unauthorized("Invalid password.".into()));
    }

    if user.is_first_login {
        return Ok(LoginOutcome::FirstLogin { user: user.summary() });
    }

    if needs_rehash(stored) {
        match repo.set_password_hash(user.id, &hash(password)?).await {
            Ok(()) => info!(user_id = user.id, "Legacy password hash upgraded"),
            Err(e) => warn!(error = %e, user_id = user.id, "Failed to upgrade legacy password hash"),
        }
    }

    if let Err(e) = repo.touch_last_login(user.id).await {
        warn!(error = %e, user_id = user.id, "Failed to record last login");
    }

    let token = issue_token(&user, config)?;
    info!(user_id = user.id, "Login successful");
    Ok(LoginOutcome::Authenticated {
        token,
        user: user.summary(),
    })
}

pub async fn register<R: UserRepository, M: Mailer>(
    repo: &R,
    mailer: &M,
    req: &RegisterReqDto,
    config: &Config,
) -> Result<(String, UserSummary), AppError> {
    req.validate()
        .map_err(|e| AppError::Validation(validation_message(&e)))?;

    let name = req.name.trim();
    let email = normalize_email(&req.email);

    if repo.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("User with this email already exists.".into()));
    }

    let password_hash = hash(&req.password)?;
    let id = match repo.create_user(name, &email, &password_hash).await {
        Ok(id) => id,
        Err(RepoError::Duplicate) => {
            return Err(AppError::Conflict("User with this email already exists.".into()));
        }
        Err(e) => return Err(e.into()),
    };

    let user = User {
        id,
        name: Some(name.to_string()),
        email: email.clone(),
        password: Some(password_hash),
        is_first_login: false,
    };

    if let Err(e) = mailer.send_welcome(&email, name).await {
        warn!(error = %e, user_id = id, "Welcome email not sent");
    }

    let token = issue_token(&user, config)?;
    info!(user_id = id, "User registered");
    Ok((token, user.summary()))
}

/// Sets a new password, proving the old one when the account has any.
/// Outstanding reset codes for the address are discarded.
pub async fn set_password<R: UserRepository + PasswordResetRepository>(
    repo: &R,
    req: &SetPasswordReqDto,
    config: &Config,
) -> Result<(String, UserSummary), AppError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.new_password.is_empty() {
        return Err(AppError::Validation("Email and password are required.".into()));
    }
    if req.new_password != req.confirm_password {
        return Err(AppError::Validation("Passwords do not match.".into()));
    }
    if req.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters."
        )));
    }

    let user = repo
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".into()))?;

    if let Some(stored) = user.password.as_deref() {
        let old = req.old_password.as_deref().unwrap_or_default();
        if old.is_empty() {
            return Err(AppError::Validation("Current password is required.".into()));
        }
        if !verify_password(old, stored) {
            return Err(AppError::Unauthorized("Current password is incorrect.".into()));
        }
    }

    repo.set_password_hash(user.id, &hash(&req.new_password)?).await?;
    repo.delete_resets(&email).await?;
    info!(user_id = user.id, "Password set");

    let token = issue_token(&user, config)?;
    Ok((token, user.summary()))
}

/// Changes the caller's name and e-mail. The new address must not belong to
/// another account.
pub async fn update_profile<R: UserRepository>(
    repo: &R,
    user_id: u64,
    req: &UpdateProfileReqDto,
) -> Result<UserSummary, AppError> {
    req.validate()
        .map_err(|e| AppError::Validation(validation_message(&e)))?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required.".into()));
    }
    let email = normalize_email(&req.email);

    if repo.find_user_by_id(user_id).await?.is_none() {
        return Err(AppError::NotFound("User not found.".into()));
    }
    if repo.email_taken_by_other(&email, user_id).await? {
        return Err(AppError::Conflict("Email is already used by another account.".into()));
    }

    match repo.update_profile(user_id, name, &email).await {
        Ok(()) => {}
        Err(RepoError::Duplicate) => {
            return Err(AppError::Conflict("Email is already used by another account.".into()));
        }
        Err(e) => return Err(e.into()),
    }
    info!(user_id, "Profile updated");

    Ok(UserSummary {
        id: user_id,
        name: Some(name.to_string()),
        email,
    })
}
