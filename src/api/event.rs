use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::{ApiClient, ApiError, membership::Registration, segment};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: String,
    pub club_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub event_date: DateTime<Utc>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub event_fee: f64,
    pub max_attendees: Option<u32>,
    pub club_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    pub club_id: String,
    pub title: String,
    pub description: String,
    pub event_date: DateTime<Utc>,
    pub location: String,
    pub is_paid: bool,
    pub event_fee: f64,
    pub max_attendees: Option<u32>,
}

impl ApiClient {
    pub async fn all_events(&self) -> Result<Vec<Event>, ApiError> {
        self.get("/all-events", None).await
    }

    pub async fn event(&self, id: &str) -> Result<Event, ApiError> {
        self.get(&format!("/event/{}", segment(id)), None).await
    }

    pub async fn managed_event(&self, token: &str, id: &str) -> Result<Event, ApiError> {
        self.get(&format!("/events/{}", segment(id)), Some(token))
            .await
    }

    pub async fn manager_events(&self, token: &str) -> Result<Vec<Event>, ApiError> {
        self.get("/manager/events", Some(token)).await
    }

    pub async fn create_event(&self, token: &str, draft: &EventDraft) -> Result<(), ApiError> {
        let body = serde_json::to_value(draft).map_err(|e| ApiError::Unexpected(e.to_string()))?;
        self.send_empty(Method::POST, "/events", Some(token), Some(&body))
            .await
    }

    pub async fn update_event(&self, token: &str, id: &str, draft: &EventDraft) -> Result<(), ApiError> {
        let body = serde_json::to_value(draft).map_err(|e| ApiError::Unexpected(e.to_string()))?;
        self.send_empty(
            Method::PATCH,
            &format!("/events/{}", segment(id)),
            Some(token),
            Some(&body),
        )
        .await
    }

    pub async fn delete_event(&self, token: &str, id: &str) -> Result<(), ApiError> {
        self.send_empty(
            Method::DELETE,
            &format!("/events/{}", segment(id)),
            Some(token),
            None,
        )
        .await
    }

    pub async fn event_registrations(&self, token: &str, event_id: &str) -> Result<Vec<Registration>, ApiError> {
        self.get(
            &format!("/manager/events/{}/registrations", segment(event_id)),
            Some(token),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_paid_event() {
        let event: Event = serde_json::from_value(json!({
            "_id": "e1",
            "clubId": "c1",
            "title": "Spring Tournament",
            "eventDate": "2026-03-14T18:00:00Z",
            "location": "Hall A",
            "isPaid": true,
            "eventFee": 12.0,
            "maxAttendees": 40
        }))
        .unwrap();

        assert!(event.is_paid);
        assert_eq!(event.max_attendees, Some(40));
        assert_eq!(event.club_name, None);
    }

    #[test]
    fn draft_serializes_camel_case() {
        let draft = EventDraft {
            club_id: "c1".into(),
            title: "Meetup".into(),
            description: "Say hi".into(),
            event_date: "2026-01-01T10:00:00Z".parse().unwrap(),
            location: "Cafe".into(),
            is_paid: false,
            event_fee: 0.0,
            max_attendees: None,
        };
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["clubId"], "c1");
        assert_eq!(value["isPaid"], false);
        assert!(value["maxAttendees"].is_null());
    }
}
