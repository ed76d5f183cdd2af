use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiClient, ApiError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(default)]
    pub user_email: String,
    pub amount: f64,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub club_name: Option<String>,
    pub event_name: Option<String>,
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: String,
}

impl Payment {
    /// Name of whatever the payment was for, club or event.
    pub fn subject(&self) -> &str {
        self.club_name
            .as_deref()
            .or(self.event_name.as_deref())
            .unwrap_or("-")
    }
}

impl ApiClient {
    pub async fn my_payments(&self, token: &str) -> Result<Vec<Payment>, ApiError> {
        self.get("/my-payments", Some(token)).await
    }

    pub async fn admin_payments(&self, token: &str) -> Result<Vec<Payment>, ApiError> {
        self.get("/admin/payments", Some(token)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subject_prefers_club_then_event() {
        let payment: Payment = serde_json::from_value(json!({
            "userEmail": "a@b.c",
            "amount": 20,
            "type": "event",
            "eventName": "Gala",
            "date": "2025-12-01T00:00:00Z",
            "status": "paid"
        }))
        .unwrap();
        assert_eq!(payment.subject(), "Gala");
        assert_eq!(payment.kind, "event");

        let payment: Payment = serde_json::from_value(json!({ "amount": 5 })).unwrap();
        assert_eq!(payment.subject(), "-");
    }
}
