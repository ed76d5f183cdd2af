use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiClient, ApiError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemberOverview {
    pub total_clubs_joined: u64,
    pub total_events_registered: u64,
    pub upcoming_events: Vec<UpcomingEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingEvent {
    pub title: String,
    pub club_name: Option<String>,
    pub location: Option<String>,
    pub event_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagerOverview {
    pub total_clubs: u64,
    pub total_members: u64,
    pub total_events: u64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminOverview {
    pub total_users: u64,
    pub clubs: ClubCounts,
    pub total_memberships: u64,
    pub total_events: u64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClubCounts {
    pub total: u64,
    pub approved: u64,
    pub pending: u64,
    pub rejected: u64,
}

/// One point of the users-over-time or revenue-over-time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesPoint {
    #[serde(alias = "_id", alias = "month", alias = "date")]
    pub label: String,
    #[serde(alias = "count", alias = "revenue", alias = "total")]
    pub value: f64,
}

impl ApiClient {
    pub async fn member_overview(&self, token: &str) -> Result<MemberOverview, ApiError> {
        self.get("/member/overview", Some(token)).await
    }

    pub async fn manager_overview(&self, token: &str) -> Result<ManagerOverview, ApiError> {
        self.get("/manager/overview", Some(token)).await
    }

    pub async fn admin_overview(&self, token: &str) -> Result<AdminOverview, ApiError> {
        self.get("/admin/overview", Some(token)).await
    }

    pub async fn users_over_time(&self, token: &str) -> Result<Vec<SeriesPoint>, ApiError> {
        self.get("/admin/users-over-time", Some(token)).await
    }

    pub async fn revenue_over_time(&self, token: &str) -> Result<Vec<SeriesPoint>, ApiError> {
        self.get("/admin/revenue-over-time", Some(token)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn admin_overview_tolerates_missing_fields() {
        let overview: AdminOverview = serde_json::from_value(json!({
            "totalUsers": 12,
            "clubs": { "total": 4, "approved": 3 }
        }))
        .unwrap();
        assert_eq!(overview.total_users, 12);
        assert_eq!(overview.clubs.pending, 0);
        assert_eq!(overview.total_revenue, 0.0);
    }

    #[test]
    fn series_accepts_backend_aliases() {
        let points: Vec<SeriesPoint> = serde_json::from_value(json!([
            { "_id": "2025-10", "count": 3 },
            { "month": "2025-11", "revenue": 120.5 }
        ]))
        .unwrap();
        assert_eq!(points[0].label, "2025-10");
        assert_eq!(points[1].value, 120.5);
    }
}
