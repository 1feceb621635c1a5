//! Outbound emergency alerts over Twilio's WhatsApp channel.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::AlertsConfig;

#[async_trait]
pub trait AlertSender: Send + Sync {
    /// Deliver `body` to a phone number. Returns the provider's delivery id.
    async fn send(&self, to: &str, body: &str) -> Result<String, AlertError>;
}

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing Twilio credentials")]
    MissingCredentials,
}

/// Twilio credentials. Supplied from the environment only.
#[derive(Debug, Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
}

impl TwilioCredentials {
    pub fn new(account_sid: String, auth_token: String) -> Result<Self, AlertError> {
        if account_sid.trim().is_empty() || auth_token.trim().is_empty() {
            return Err(AlertError::MissingCredentials);
        }
        Ok(Self {
            account_sid,
            auth_token,
        })
    }

    /// Read `TWILIO_ACCOUNT_SID` / `TWILIO_AUTH_TOKEN`.
    pub fn from_env() -> Result<Self, AlertError> {
        let sid = std::env::var(crate::config::TWILIO_ACCOUNT_SID_ENV).unwrap_or_default();
        let token = std::env::var(crate::config::TWILIO_AUTH_TOKEN_ENV).unwrap_or_default();
        Self::new(sid, token)
    }
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TwilioAlertSender {
    client: Client,
    credentials: TwilioCredentials,
    from: String,
    base_url: String,
}

impl TwilioAlertSender {
    pub fn new(config: &AlertsConfig, credentials: TwilioCredentials) -> Result<Self, AlertError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            credentials,
            from: config.from.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Prefix a bare phone number with the WhatsApp channel scheme.
pub fn whatsapp_address(number: &str) -> String {
    let number = number.trim();
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{}", number)
    }
}

#[async_trait]
impl AlertSender for TwilioAlertSender {
    async fn send(&self, to: &str, body: &str) -> Result<String, AlertError> {
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            self.base_url, self.credentials.account_sid
        );
        let to = whatsapp_address(to);
        let from = whatsapp_address(&self.from);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.account_sid, Some(&self.credentials.auth_token))
            .form(&[("To", to.as_str()), ("From", from.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TwilioErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or(error_body);
            tracing::error!(code = status.as_u16(), to = %to, message = %message, "Twilio API error");
            return Err(AlertError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let msg: MessageResponse = response.json().await?;
        tracing::info!(to = %to, sid = %msg.sid, "Alert delivered");
        Ok(msg.sid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sender(base_url: String) -> TwilioAlertSender {
        let config = AlertsConfig {
            enabled: true,
            base_url,
            ..Default::default()
        };
        let creds = TwilioCredentials::new("AC123".to_string(), "secret".to_string()).unwrap();
        TwilioAlertSender::new(&config, creds).unwrap()
    }

    #[tokio::test]
    async fn test_send_posts_whatsapp_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Accounts/AC123/Messages.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("To=whatsapp%3A%2B15551234567"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "sid": "SM42", "status": "queued"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sid = sender(server.uri()).send("+15551234567", "Emergency").await.unwrap();
        assert_eq!(sid, "SM42");
    }

    #[tokio::test]
    async fn test_send_surfaces_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": 21211, "message": "Invalid 'To' Phone Number"
            })))
            .mount(&server)
            .await;

        let err = sender(server.uri()).send("bogus", "x").await.unwrap_err();
        match err {
            AlertError::Api { code, message } => {
                assert_eq!(code, 400);
                assert!(message.contains("Invalid"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_credentials_rejected() {
        assert!(matches!(
            TwilioCredentials::new("AC1".into(), " ".into()),
            Err(AlertError::MissingCredentials)
        ));
    }

    #[test]
    fn test_whatsapp_address_is_idempotent() {
        assert_eq!(whatsapp_address("+1555"), "whatsapp:+1555");
        assert_eq!(whatsapp_address("whatsapp:+1555"), "whatsapp:+1555");
    }
}
