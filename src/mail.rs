use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::config::MailConfig;

#[derive(Debug, Clone)]
pub struct Mailer {
    http: reqwest::Client,
    config: MailConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail provider responded with {0}")]
    Rejected(reqwest::StatusCode),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl ContactMessage {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() || self.email.trim().is_empty() || self.message.trim().is_empty() {
            return Err("Please fill in your name, email and message.");
        }
        Ok(())
    }
}

impl Mailer {
    pub fn new(config: MailConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Sends the message to the site, then a confirmation back to the sender.
    pub async fn send_contact(&self, message: &ContactMessage) -> Result<(), MailError> {
        self.send(&self.config.template_id, json!(message)).await?;

        let now = Local::now();
        self.send(
            &self.config.confirmation_template_id,
            json!({
                "name": message.name,
                "email": message.email,
                "message": message.message,
                "time": now.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string(),
                "year": now.year(),
            }),
        )
        .await?;

        info!("contact message from {} delivered", message.email);
        Ok(())
    }

    async fn send(&self, template_id: &str, params: serde_json::Value) -> Result<(), MailError> {
        let response = self
            .http
            .post(&self.config.url)
            .json(&json!({
                "service_id": self.config.service_id,
                "template_id": template_id,
                "user_id": self.config.user_id,
                "template_params": params,
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            warn!("mail template {} rejected with {}", template_id, response.status());
            return Err(MailError::Rejected(response.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_messages_are_rejected() {
        let mut message = ContactMessage {
            name: "Rafi".into(),
            email: "rafi@example.com".into(),
            subject: String::new(),
            message: "  ".into(),
        };
        assert!(message.validate().is_err());
        message.message = "Hello".into();
        assert!(message.validate().is_ok());
    }
}
