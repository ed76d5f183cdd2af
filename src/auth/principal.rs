use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;

/// The signed-in user as the identity provider knows them.
#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// What templates get to see of a principal.
#[derive(Debug, Clone, Serialize)]
pub struct PrincipalView {
    pub name: String,
    pub email: String,
    pub photo_url: Option<String>,
}

impl Principal {
    /// Tokens are refreshed a minute before they actually lapse.
    pub fn token_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(60) <= now
    }

    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.email)
    }

    pub fn view(&self) -> PrincipalView {
        PrincipalView {
            name: self.name().to_string(),
            email: self.email.clone(),
            photo_url: self.photo_url.clone(),
        }
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
