use chrono::{Duration, NaiveDateTime};
use rand::Rng;
use tracing::{info, warn};

use super::account::{MIN_PASSWORD_LEN, hash, issue_token, normalize_email};
use crate::config::Config;
use crate::error::AppError;
use crate::model::user::UserSummary;
use crate::models::OtpInput;
use crate::repository::{PasswordResetRepository, UserRepository};
use crate::utils::mailer::Mailer;

pub const OTP_TTL_MINUTES: i64 = 10;

pub fn generate_otp() -> String {
    format!("{:04}", rand::thread_rng().gen_range(0..10_000))
}

/// What the forgot-password endpoint may reveal.
#[derive(Debug, Default)]
pub struct OtpRequestOutcome {
    /// Only filled in dev mode.
    pub dev_otp: Option<String>,
}

pub async fn request_otp<S, M>(
    store: &S,
    mailer: &M,
    email: &str,
    config: &Config,
    now: NaiveDateTime,
) -> Result<OtpRequestOutcome, AppError>
where
    S: UserRepository + PasswordResetRepository,
    M: Mailer,
{
    let email = normalize_email(email);

    let Some(user) = store.find_user_by_email(&email).await? else {
        info!("Password reset requested for unknown email");
        return Ok(OtpRequestOutcome::default());
    };

    let otp = generate_otp();
    store
        .upsert_reset(&email, &otp, now + Duration::minutes(OTP_TTL_MINUTES))
        .await?;

    if config.dev_mode {
        warn!(user_id = user.id, otp = %otp, "Dev mode OTP");
    }

    let name = user.name.clone().unwrap_or_else(|| email.clone());
    if let Err(e) = mailer.send_otp(&email, &name, &otp).await {
        if !config.dev_mode {
            return Err(AppError::Upstream(
                "Failed to send OTP email. Please check server configuration.".into(),
            ));
        }
        warn!(error = %e, user_id = user.id, "OTP email not sent, continuing in dev mode");
    }

    info!(user_id = user.id, "OTP issued");
    Ok(OtpRequestOutcome {
        dev_otp: config.dev_mode.then_some(otp),
    })
}

pub async fn verify_otp<S: PasswordResetRepository>(
    store: &S,
    email: &str,
    otp: &OtpInput,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    let email = normalize_email(email);
    let code = otp.normalized();
    if email.is_empty() || code.is_none() {
        return Err(AppError::Validation("Email and OTP are required.".into()));
    }

    let reset = store
        .latest_unused_reset(&email)
        .await?
        .ok_or_else(|| AppError::Validation("No valid OTP found for this email.".into()))?;

    if reset.is_expired(now) {
        return Err(AppError::Validation("OTP has expired. Please request a new one.".into()));
    }
    if code.as_deref() != Some(reset.otp.as_str()) {
        return Err(AppError::Validation("Invalid OTP. Please check and try again.".into()));
    }
    if !store.mark_reset_used(reset.id).await? {
        return Err(AppError::Validation("No valid OTP found for this email.".into()));
    }

    info!("OTP verified");
    Ok(())
}

pub async fn reset_password<S>(
    store: &S,
    email: &str,
    password: &str,
    config: &Config,
    now: NaiveDateTime,
) -> Result<(String, UserSummary), AppError>
where
    S: UserRepository + PasswordResetRepository,
{
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AppError::Validation("Email and new password are required.".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters."
        )));
    }
    if !store.has_verified_reset(&email, now).await? {
        return Err(AppError::Forbidden("Please verify your OTP first.".into()));
    }

    let user = store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".into()))?;

    store.set_password_hash(user.id, &hash(password)?).await?;
    store.delete_resets(&email).await?;
    info!(user_id = user.id, "Password reset");

    let token = issue_token(&user, config)?;
    Ok((token, user.summary()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::verify_password;
    use crate::repository::memory::MemoryStore;
    use crate::service::account::tests::config;
    use crate::utils::mailer::testing::RecordingMailer;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap()
    }

    fn store() -> MemoryStore {
        MemoryStore::default().with_user("Asha", "asha@company.com", Some("old-hash"), false)
    }

    async fn seed(store: &MemoryStore, otp: &str) {
        store
            .upsert_reset("asha@company.com", otp, now() + Duration::minutes(OTP_TTL_MINUTES))
            .await
            .unwrap();
    }

    #[test]
    fn generated_codes_are_four_digits() {
        for _ in 0..50 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 4);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[actix_web::test]
    async fn unknown_email_gets_the_same_answer() {
        let store = store();
        let mailer = RecordingMailer::default();
        let outcome = request_otp(&store, &mailer, "ghost@company.com", &config(), now())
            .await
            .unwrap();
        assert!(outcome.dev_otp.is_none());
        assert!(mailer.otps.lock().unwrap().is_empty());
        assert!(store.resets.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn request_mails_the_stored_code() {
        let store = store();
        let mailer = RecordingMailer::default();
        request_otp(&store, &mailer, "ASHA@company.com", &config(), now()).await.unwrap();

        let sent = mailer.otps.lock().unwrap();
        let resets = store.resets.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, resets[0].otp);
        assert_eq!(resets[0].expires_at, now() + Duration::minutes(10));
    }

    #[actix_web::test]
    async fn mail_failure_is_hard_outside_dev_mode() {
        let store = store();
        let mailer = RecordingMailer {
            fail: true,
            ..RecordingMailer::default()
        };
        let err = request_otp(&store, &mailer, "asha@company.com", &config(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));

        let mut dev = config();
        dev.dev_mode = true;
        let outcome = request_otp(&store, &mailer, "asha@company.com", &dev, now())
            .await
            .unwrap();
        assert_eq!(outcome.dev_otp.unwrap().len(), 4);
    }

    #[actix_web::test]
    async fn integer_input_matches_zero_padded_code() {
        let store = store();
        seed(&store, "0007").await;
        verify_otp(&store, "asha@company.com", &OtpInput::Number(7), now())
            .await
            .unwrap();
    }

    #[actix_web::test]
    async fn expired_code_fails_even_when_correct() {
        let store = store();
        seed(&store, "1234").await;
        let later = now() + Duration::minutes(11);
        let err = verify_otp(&store, "asha@company.com", &OtpInput::Text("1234".into()), later)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[actix_web::test]
    async fn code_verifies_only_once() {
        let store = store();
        seed(&store, "4321").await;
        let otp = OtpInput::Text("4321".into());

        verify_otp(&store, "asha@company.com", &otp, now()).await.unwrap();
        let err = verify_otp(&store, "asha@company.com", &otp, now()).await.unwrap_err();
        assert_eq!(err.to_string(), "No valid OTP found for this email.");
    }

    #[actix_web::test]
    async fn wrong_code_is_rejected() {
        let store = store();
        seed(&store, "4321").await;
        let err = verify_otp(&store, "asha@company.com", &OtpInput::Number(1234), now())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid OTP. Please check and try again.");
    }

    #[actix_web::test]
    async fn reset_requires_a_verified_code() {
        let store = store();
        seed(&store, "1111").await;

        let err = reset_password(&store, "asha@company.com", "brandnew", &config(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        verify_otp(&store, "asha@company.com", &OtpInput::Number(1111), now())
            .await
            .unwrap();
        reset_password(&store, "asha@company.com", "brandnew", &config(), now())
            .await
            .unwrap();

        let user = store.find_user_by_email("asha@company.com").await.unwrap().unwrap();
        assert!(verify_password("brandnew", user.password.as_deref().unwrap()));
        assert!(store.resets.lock().unwrap().is_empty());
    }
}
