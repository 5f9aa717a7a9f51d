#![allow(async_fn_in_trait)]

use std::time::Duration;

use serde_json::{Value, json};

use crate::config::MailConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SendGrid API key not configured")]
    NotConfigured,
    #[error("mail request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail provider answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

pub trait Mailer {
    async fn send_otp(&self, to: &str, name: &str, otp: &str) -> Result<(), MailError>;
    async fn send_welcome(&self, to: &str, name: &str) -> Result<(), MailError>;
}

/// SendGrid v3 `mail/send` client.
#[derive(Clone)]
pub struct SendGridMailer {
    client: reqwest::Client,
    config: MailConfig,
}

impl SendGridMailer {
    pub fn new(config: MailConfig) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, config })
    }

    fn message(&self, to: &str, name: &str, subject: &str, html: String) -> Value {
        json!({
            "personalizations": [{
                "to": [{ "email": to, "name": name }],
                "subject": subject,
            }],
            "from": {
                "email": self.config.from_email,
                "name": self.config.from_name,
            },
            "content": [{ "type": "text/html", "value": html }],
        })
    }

    async fn send(&self, message: Value) -> Result<(), MailError> {
        let api_key = self.config.api_key.as_deref().ok_or(MailError::NotConfigured)?;

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(MailError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

impl Mailer for SendGridMailer {
    async fn send_otp(&self, to: &str, name: &str, otp: &str) -> Result<(), MailError> {
        let message = self.message(to, name, "Your OTP for Password Recovery", otp_template(name, otp));
        self.send(message).await
    }

    async fn send_welcome(&self, to: &str, name: &str) -> Result<(), MailError> {
        let message = self.message(
            to,
            name,
            "Welcome to Smart Attendance System",
            welcome_template(name),
        );
        self.send(message).await
    }
}

/// Names are user-supplied and end up inside HTML bodies.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn otp_template(name: &str, otp: &str) -> String {
    let name = escape_html(name);
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; color: #333;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2>Password Recovery</h2>
    <p>Hello {name},</p>
    <p>Use the code below to reset your password. It expires in 10 minutes.</p>
    <p style="font-size: 32px; font-weight: bold; letter-spacing: 5px; color: #00bcd4;">{otp}</p>
    <p>If you did not request this, you can ignore this email.</p>
  </div>
</body>
</html>"#
    )
}

fn welcome_template(name: &str) -> String {
    let name = escape_html(name);
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; color: #333;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2>Welcome to Smart Attendance System</h2>
    <p>Hello {name},</p>
    <p>Your account is ready. Scan the office QR code to mark your attendance.</p>
  </div>
</body>
</html>"#
    )
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every message instead of sending it.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub fail: bool,
        pub otps: Mutex<Vec<(String, String)>>,
        pub welcomes: Mutex<Vec<String>>,
    }

    impl Mailer for RecordingMailer {
        async fn send_otp(&self, to: &str, _name: &str, otp: &str) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError::NotConfigured);
            }
            self.otps.lock().unwrap().push((to.to_string(), otp.to_string()));
            Ok(())
        }

        async fn send_welcome(&self, to: &str, _name: &str) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError::NotConfigured);
            }
            self.welcomes.lock().unwrap().push(to.to_string());
            Ok(())
        }
    }
}
