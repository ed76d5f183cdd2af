use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Ack, ApiClient, ApiError, segment};
use crate::access::Role;

/// A user as listed on the admin user-management page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub role: Role,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub image: &'a str,
}

#[derive(Debug, Deserialize)]
struct RoleBody {
    role: Role,
}

impl ApiClient {
    pub async fn role(&self, token: &str) -> Result<Role, ApiError> {
        let body: RoleBody = self.get("/user/role", Some(token)).await?;
        Ok(body.role)
    }

    /// Records a freshly signed-up (or federated) user with the backend.
    pub async fn save_user(&self, token: Option<&str>, user: &NewUser<'_>) -> Result<(), ApiError> {
        let body = serde_json::to_value(user).map_err(|e| ApiError::Unexpected(e.to_string()))?;
        self.send_empty(Method::POST, "/user", token, Some(&body))
            .await
    }

    pub async fn update_user_profile(&self, token: &str, name: &str, image: &str) -> Result<bool, ApiError> {
        let ack: Ack = self
            .send_json(
                Method::PATCH,
                "/user/profile",
                Some(token),
                &json!({ "name": name, "image": image }),
            )
            .await?;
        Ok(ack.success)
    }

    pub async fn users(&self, token: &str) -> Result<Vec<UserRecord>, ApiError> {
        self.get("/users", Some(token)).await
    }

    pub async fn set_user_role(&self, token: &str, id: &str, role: Role) -> Result<(), ApiError> {
        self.send_empty(
            Method::PATCH,
            &format!("/users/{}/role", segment(id)),
            Some(token),
            Some(&json!({ "role": role })),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_record_carries_role() {
        let user: UserRecord = serde_json::from_value(json!({
            "_id": "u1",
            "name": "Nadia",
            "email": "nadia@example.com",
            "role": "manager",
            "createdAt": "2025-06-01T08:30:00Z"
        }))
        .unwrap();
        assert_eq!(user.role, Role::Manager);
        assert!(user.image.is_none());
    }
}
