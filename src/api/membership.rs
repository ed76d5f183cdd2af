use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiClient, ApiError, read_json, segment};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub user_email: String,
    pub club_id: String,
    pub status: MembershipStatus,
    pub joined_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub club_name: Option<String>,
    pub banner_image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Active,
    Expired,
}

/// State of a principal's registration for one event.
///
/// The status check answers `none` when no registration exists; any status
/// this client does not know is treated the same way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegistrationStatus {
    Registered,
    PendingPayment,
    #[default]
    #[serde(rename = "none", other)]
    Unregistered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub user_email: String,
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub status: RegistrationStatus,
    pub registered_at: Option<DateTime<Utc>>,
}

/// Row of the "my events" view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredEvent {
    pub registration_id: String,
    pub event_title: Option<String>,
    pub club_name: Option<String>,
    pub event_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: RegistrationStatus,
}

/// Answer to a join or register request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum JoinResponse {
    Checkout {
        #[serde(rename = "checkoutUrl")]
        checkout_url: String,
    },
    Free {
        free: bool,
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveCheck {
    has_active: bool,
}

#[derive(Debug, Deserialize)]
struct RegistrationCheck {
    #[serde(default)]
    status: RegistrationStatus,
}

impl ApiClient {
    pub async fn join_club(&self, token: &str, club_id: &str) -> Result<JoinResponse, ApiError> {
        self.post_join(&format!("/clubs/{}/join", segment(club_id)), token)
            .await
    }

    pub async fn register_for_event(&self, token: &str, event_id: &str) -> Result<JoinResponse, ApiError> {
        self.post_join(&format!("/events/{}/register", segment(event_id)), token)
            .await
    }

    async fn post_join(&self, path: &str, token: &str) -> Result<JoinResponse, ApiError> {
        let response = self
            .request(Method::POST, path, Some(token))
            .header("Idempotency-Key", Uuid::new_v4().to_string())
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn has_active_membership(&self, token: &str, club_id: &str) -> Result<bool, ApiError> {
        let check: ActiveCheck = self
            .get(
                &format!("/clubs/{}/membership-status", segment(club_id)),
                Some(token),
            )
            .await?;
        Ok(check.has_active)
    }

    pub async fn registration_status(&self, token: &str, event_id: &str) -> Result<RegistrationStatus, ApiError> {
        let check: RegistrationCheck = self
            .get(
                &format!("/events/{}/registration-status", segment(event_id)),
                Some(token),
            )
            .await?;
        Ok(check.status)
    }

    pub async fn active_memberships(&self, token: &str) -> Result<Vec<Membership>, ApiError> {
        self.get("/active-memberships", Some(token)).await
    }

    pub async fn my_registered_events(&self, token: &str) -> Result<Vec<RegisteredEvent>, ApiError> {
        self.get("/my-registered-events", Some(token)).await
    }

    pub async fn club_members(&self, token: &str, club_id: &str) -> Result<Vec<Membership>, ApiError> {
        self.get(&format!("/club-members/{}", segment(club_id)), Some(token))
            .await
    }

    pub async fn expire_member(&self, token: &str, membership_id: &str) -> Result<(), ApiError> {
        self.send_empty(
            Method::PATCH,
            &format!("/expire-member/{}", segment(membership_id)),
            Some(token),
            None,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_response_variants() {
        let free: JoinResponse = serde_json::from_value(json!({ "free": true })).unwrap();
        assert_eq!(
            free,
            JoinResponse::Free {
                free: true,
                message: None
            }
        );

        let free: JoinResponse =
            serde_json::from_value(json!({ "free": true, "message": "Welcome aboard" })).unwrap();
        assert_eq!(
            free,
            JoinResponse::Free {
                free: true,
                message: Some("Welcome aboard".into())
            }
        );

        let paid: JoinResponse =
            serde_json::from_value(json!({ "checkoutUrl": "https://pay/x" })).unwrap();
        assert_eq!(
            paid,
            JoinResponse::Checkout {
                checkout_url: "https://pay/x".into()
            }
        );

        assert!(serde_json::from_value::<JoinResponse>(json!({ "ok": 1 })).is_err());
    }

    #[test]
    fn registration_status_parsing() {
        let parse = |s: &str| serde_json::from_value::<RegistrationStatus>(json!(s)).unwrap();
        assert_eq!(parse("registered"), RegistrationStatus::Registered);
        assert_eq!(parse("pendingPayment"), RegistrationStatus::PendingPayment);
        assert_eq!(parse("none"), RegistrationStatus::Unregistered);
        assert_eq!(parse("cancelled"), RegistrationStatus::Unregistered);
    }

    #[test]
    fn membership_status_parsing() {
        let m: Membership = serde_json::from_value(json!({
            "_id": "m1",
            "userEmail": "a@b.c",
            "clubId": "c1",
            "status": "expired",
            "joinedAt": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(m.status, MembershipStatus::Expired);
        assert!(m.expires_at.is_none());
    }
}
