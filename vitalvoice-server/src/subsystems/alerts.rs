//! Emergency alert fan-out to a user's contacts.

use serde::Serialize;
use serde_json::Value;

use vitalvoice_core::alerts::AlertSender;

/// Outcome for one contact. Serialises as `{to, sid}` or `{to, error}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeliveryResult {
    Sent { to: String, sid: String },
    Failed { to: String, error: String },
}

impl DeliveryResult {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryResult::Sent { .. })
    }
}

pub fn location_url(latitude: &str, longitude: &str) -> String {
    format!("https://maps.google.com/?q={},{}", latitude, longitude)
}

pub fn alert_body(latitude: &str, longitude: &str) -> String {
    format!(
        "🚨 Emergency Alert!\nThe user is at: {}",
        location_url(latitude, longitude)
    )
}

/// Coordinates arrive as numbers or strings.
pub fn coordinate(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Phone numbers from a `contacts` field: plain strings, or objects carrying
/// a `phone` (as saved contacts are shaped).
pub fn contact_numbers(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(obj) => obj.get("phone").and_then(Value::as_str),
            _ => None,
        })
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Send `body` to every number in order. A failed delivery does not stop
/// the remaining ones.
pub async fn fan_out(sender: &dyn AlertSender, numbers: &[String], body: &str) -> Vec<DeliveryResult> {
    let mut results = Vec::with_capacity(numbers.len());
    for number in numbers {
        let result = match sender.send(number, body).await {
            Ok(sid) => DeliveryResult::Sent {
                to: number.clone(),
                sid,
            },
            Err(e) => {
                tracing::warn!(to = %number, error = %e, "Emergency alert delivery failed");
                DeliveryResult::Failed {
                    to: number.clone(),
                    error: e.to_string(),
                }
            }
        };
        results.push(result);
    }
    let sent = results.iter().filter(|r| r.is_sent()).count();
    tracing::info!(sent, total = numbers.len(), "Emergency alerts processed");
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use vitalvoice_core::alerts::AlertError;

    struct Flaky;

    #[async_trait]
    impl AlertSender for Flaky {
        async fn send(&self, to: &str, _body: &str) -> Result<String, AlertError> {
            if to.ends_with('0') {
                Err(AlertError::Api {
                    code: 400,
                    message: "invalid number".into(),
                })
            } else {
                Ok(format!("SM-{}", to))
            }
        }
    }

    #[tokio::test]
    async fn test_fan_out_continues_after_failure() {
        let numbers = vec!["+1550".to_string(), "+1551".to_string()];
        let results = fan_out(&Flaky, &numbers, "hi").await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].is_sent());
        assert_eq!(
            serde_json::to_value(&results[1]).unwrap(),
            json!({"to": "+1551", "sid": "SM-+1551"})
        );
        assert_eq!(
            serde_json::to_value(&results[0]).unwrap(),
            json!({"to": "+1550", "error": "API error (400): invalid number"})
        );
    }

    #[test]
    fn test_alert_body_links_location() {
        let body = alert_body("12.97", "77.59");
        assert!(body.starts_with("🚨 Emergency Alert!"));
        assert!(body.ends_with("https://maps.google.com/?q=12.97,77.59"));
    }

    #[test]
    fn test_contact_numbers_accepts_strings_and_objects() {
        let v = json!(["+1555", {"name": "Ana", "phone": "+1666"}, 42, " "]);
        assert_eq!(contact_numbers(Some(&v)), vec!["+1555", "+1666"]);
        assert!(contact_numbers(None).is_empty());
    }

    #[test]
    fn test_coordinate_accepts_number_or_string() {
        assert_eq!(coordinate(Some(&json!(12.5))), Some("12.5".to_string()));
        assert_eq!(coordinate(Some(&json!(" 7.1 "))), Some("7.1".to_string()));
        assert_eq!(coordinate(Some(&json!(null))), None);
        assert_eq!(coordinate(None), None);
    }
}
