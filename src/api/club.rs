use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ApiClient, ApiError, segment};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    #[serde(rename = "_id")]
    pub id: String,
    pub club_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub membership_fee: f64,
    pub banner_image: Option<String>,
    #[serde(default)]
    pub manager_email: String,
    #[serde(default)]
    pub status: ClubStatus,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub members_count: u64,
    #[serde(default)]
    pub events_count: u64,
}

impl Club {
    pub fn is_free(&self) -> bool {
        self.membership_fee <= 0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClubStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ClubStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClubStatus::Pending => "pending",
            ClubStatus::Approved => "approved",
            ClubStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for ClubStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ClubStatus::Pending),
            "approved" => Ok(ClubStatus::Approved),
            "rejected" => Ok(ClubStatus::Rejected),
            other => Err(format!("unknown club status {other:?}")),
        }
    }
}

/// Fields a manager submits when creating or editing a club.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubDraft {
    pub club_name: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub membership_fee: f64,
    pub banner_image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_email: Option<String>,
}

impl ApiClient {
    pub async fn featured_clubs(&self) -> Result<Vec<Club>, ApiError> {
        self.get("/clubs/featured", None).await
    }

    pub async fn approved_clubs(&self) -> Result<Vec<Club>, ApiError> {
        self.get("/clubs/approved", None).await
    }

    pub async fn club(&self, token: Option<&str>, id: &str) -> Result<Club, ApiError> {
        self.get(&format!("/club/{}", segment(id)), token).await
    }

    /// Club as seen by its manager (includes pending and rejected clubs).
    pub async fn managed_club(&self, token: &str, id: &str) -> Result<Club, ApiError> {
        self.get(&format!("/clubs/{}", segment(id)), Some(token))
            .await
    }

    pub async fn manager_clubs(&self, token: &str) -> Result<Vec<Club>, ApiError> {
        self.get("/manager/clubs", Some(token)).await
    }

    pub async fn manager_approved_clubs(&self, token: &str) -> Result<Vec<Club>, ApiError> {
        self.get("/manager-approved/clubs", Some(token)).await
    }

    pub async fn create_club(&self, token: &str, draft: &ClubDraft) -> Result<(), ApiError> {
        let body = serde_json::to_value(draft).map_err(|e| ApiError::Unexpected(e.to_string()))?;
        self.send_empty(Method::POST, "/manager/clubs", Some(token), Some(&body))
            .await
    }

    pub async fn update_club(&self, token: &str, id: &str, draft: &ClubDraft) -> Result<(), ApiError> {
        let body = serde_json::to_value(draft).map_err(|e| ApiError::Unexpected(e.to_string()))?;
        self.send_empty(
            Method::PATCH,
            &format!("/clubs/{}", segment(id)),
            Some(token),
            Some(&body),
        )
        .await
    }

    pub async fn delete_club(&self, token: &str, id: &str) -> Result<(), ApiError> {
        self.send_empty(
            Method::DELETE,
            &format!("/manager/clubs/{}", segment(id)),
            Some(token),
            None,
        )
        .await
    }

    pub async fn admin_clubs(&self, token: &str) -> Result<Vec<Club>, ApiError> {
        self.get("/admin/clubs", Some(token)).await
    }

    pub async fn set_club_status(&self, token: &str, id: &str, status: ClubStatus) -> Result<(), ApiError> {
        self.send_empty(
            Method::PATCH,
            &format!("/admin/clubs/{}/status", segment(id)),
            Some(token),
            Some(&json!({ "status": status })),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_backend_club() {
        let club: Club = serde_json::from_value(json!({
            "_id": "c1",
            "clubName": "Chess Circle",
            "description": "Weekly games",
            "category": "Games",
            "location": "Dhaka",
            "membershipFee": 0,
            "bannerImage": "https://img/c1.png",
            "managerEmail": "m@example.com",
            "status": "approved",
            "createdAt": "2025-11-02T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(club.id, "c1");
        assert_eq!(club.status, ClubStatus::Approved);
        assert!(club.is_free());
        assert_eq!(club.members_count, 0);
    }

    #[test]
    fn missing_status_defaults_to_pending() {
        let club: Club = serde_json::from_value(json!({
            "_id": "c2",
            "clubName": "Runners",
            "membershipFee": 15.5
        }))
        .unwrap();
        assert_eq!(club.status, ClubStatus::Pending);
        assert!(!club.is_free());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [ClubStatus::Pending, ClubStatus::Approved, ClubStatus::Rejected] {
            assert_eq!(status.as_str().parse::<ClubStatus>().unwrap(), status);
        }
        assert!("archived".parse::<ClubStatus>().is_err());
    }
}
