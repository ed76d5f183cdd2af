use chrono::Utc;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{
    Principal,
    provider::{IdentityError, IdentityProvider, SignInResponse, expiry_from},
};
use crate::{
    access::RoleResolver,
    api::{ApiClient, ApiError, user::NewUser},
};

pub const DEFAULT_AVATAR: &str = "https://avatar.iran.liara.run/public/11";
pub const GOOGLE_PROVIDER_ID: &str = "google.com";

/// Owner of everything the app knows about who is signed in.
///
/// Created once when the router is built and shared through `AppState`.
/// Principals are keyed by their identity uid, which is what the session
/// stores. Every change to a principal drops its cached role.
#[derive(Debug)]
pub struct IdentityContext {
    provider: IdentityProvider,
    api: ApiClient,
    roles: Arc<RoleResolver>,
    principals: RwLock<HashMap<String, Principal>>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub photo_url: Option<String>,
}

#[derive(Debug)]
pub struct ProfileUpdate {
    pub principal: Principal,
    pub backend_synced: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("failed to save user: {0}")]
    Backend(#[from] ApiError),
}

impl AccountError {
    pub fn user_message(&self) -> String {
        match self {
            AccountError::Invalid(message) => message.clone(),
            AccountError::Identity(e) => e.user_message().to_string(),
            AccountError::Backend(_) => "Failed to save user".to_string(),
        }
    }
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < 6 {
        return Err("Minimum 6 characters".into());
    }
    let lower = password.chars().any(|c| c.is_lowercase());
    let upper = password.chars().any(|c| c.is_uppercase());
    if !(lower && upper) {
        return Err("Must contain uppercase & lowercase letters".into());
    }
    Ok(())
}

fn principal_from(session: SignInResponse) -> Principal {
    Principal {
        expires_at: expiry_from(&session.expires_in, Utc::now()),
        uid: session.local_id,
        email: session.email,
        display_name: session.display_name,
        photo_url: session.photo_url,
        id_token: session.id_token,
        refresh_token: session.refresh_token,
    }
}

impl IdentityContext {
    pub fn new(provider: IdentityProvider, api: ApiClient, roles: Arc<RoleResolver>) -> Self {
        Self {
            provider,
            api,
            roles,
            principals: RwLock::new(HashMap::new()),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, IdentityError> {
        let session = self.provider.sign_in_with_password(email, password).await?;
        let mut principal = principal_from(session);

        // Password sign-in does not always echo the profile.
        match self.provider.lookup(&principal.id_token).await {
            Ok(Some(account)) => {
                principal.display_name = account.display_name.or(principal.display_name);
                principal.photo_url = account.photo_url.or(principal.photo_url);
            }
            Ok(None) => {}
            Err(e) => warn!("profile lookup for {} failed: {}", principal.email, e),
        }

        info!("{} signed in", principal.email);
        self.register(principal.clone()).await;
        Ok(principal)
    }

    pub async fn sign_up(&self, account: NewAccount) -> Result<Principal, AccountError> {
        let name = account.name.trim();
        if name.is_empty() {
            return Err(AccountError::Invalid("Full name is required".into()));
        }
        if account.email.trim().is_empty() {
            return Err(AccountError::Invalid("Email is required".into()));
        }
        validate_password(&account.password).map_err(AccountError::Invalid)?;

        let session = self
            .provider
            .sign_up(account.email.trim(), &account.password)
            .await?;
        let mut principal = principal_from(session);
        let photo_url = account
            .photo_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_AVATAR.to_string());

        let update = self
            .provider
            .update_profile(&principal.id_token, name, &photo_url)
            .await?;
        principal.display_name = update.display_name.or_else(|| Some(name.to_string()));
        principal.photo_url = update.photo_url.or(Some(photo_url));
        if let (Some(id_token), Some(refresh_token)) = (update.id_token, update.refresh_token) {
            principal.id_token = id_token;
            principal.refresh_token = refresh_token;
            if let Some(expires_in) = update.expires_in {
                principal.expires_at = expiry_from(&expires_in, Utc::now());
            }
        }

        self.api
            .save_user(
                Some(&principal.id_token),
                &NewUser {
                    name: principal.name(),
                    email: &principal.email,
                    image: principal.photo_url.as_deref().unwrap_or(DEFAULT_AVATAR),
                },
            )
            .await?;

        info!("{} signed up", principal.email);
        self.register(principal.clone()).await;
        Ok(principal)
    }

    /// Finishes a federated sign-in with an OAuth access token.
    pub async fn sign_in_with_google(&self, access_token: &str, request_uri: &str) -> Result<Principal, AccountError> {
        let session = self
            .provider
            .sign_in_with_idp(GOOGLE_PROVIDER_ID, access_token, request_uri)
            .await?;
        let principal = principal_from(session);

        self.api
            .save_user(
                Some(&principal.id_token),
                &NewUser {
                    name: principal.name(),
                    email: &principal.email,
                    image: principal.photo_url.as_deref().unwrap_or(DEFAULT_AVATAR),
                },
            )
            .await?;

        info!("{} signed in with Google", principal.email);
        self.register(principal.clone()).await;
        Ok(principal)
    }

    pub async fn sign_out(&self, uid: &str) {
        if let Some(principal) = self.principals.write().await.remove(uid) {
            self.roles.invalidate(&principal.email).await;
            info!("{} signed out", principal.email);
        }
    }

    pub async fn update_profile(&self, uid: &str, name: &str, photo_url: &str) -> Result<ProfileUpdate, AccountError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AccountError::Invalid("Name is required".into()));
        }
        let mut principal = self
            .current(uid)
            .await
            .ok_or_else(|| AccountError::Invalid("Please login first!".into()))?;

        let update = self
            .provider
            .update_profile(&principal.id_token, name, photo_url)
            .await?;
        principal.display_name = update.display_name.or_else(|| Some(name.to_string()));
        principal.photo_url = update.photo_url.or_else(|| Some(photo_url.to_string()));
        if let (Some(id_token), Some(refresh_token)) = (update.id_token, update.refresh_token) {
            principal.id_token = id_token;
            principal.refresh_token = refresh_token;
            if let Some(expires_in) = update.expires_in {
                principal.expires_at = expiry_from(&expires_in, Utc::now());
            }
        }
        self.register(principal.clone()).await;

        let backend_synced = match self
            .api
            .update_user_profile(&principal.id_token, name, photo_url)
            .await
        {
            Ok(synced) => synced,
            Err(e) => {
                warn!("backend profile update for {} failed: {}", principal.email, e);
                false
            }
        };

        Ok(ProfileUpdate {
            principal,
            backend_synced,
        })
    }

    pub async fn current(&self, uid: &str) -> Option<Principal> {
        self.principals.read().await.get(uid).cloned()
    }

    /// Trades the principal's refresh token for a new ID token.
    pub async fn refresh(&self, uid: &str) -> Result<Principal, IdentityError> {
        let mut principal = self
            .current(uid)
            .await
            .ok_or_else(|| IdentityError::Rejected {
                code: "SESSION_NOT_FOUND".into(),
            })?;

        let tokens = self.provider.refresh(&principal.refresh_token).await?;
        principal.id_token = tokens.id_token;
        principal.refresh_token = tokens.refresh_token;
        principal.expires_at = expiry_from(&tokens.expires_in, Utc::now());
        debug!("refreshed token for {}", principal.email);

        self.principals
            .write()
            .await
            .insert(principal.uid.clone(), principal.clone());
        Ok(principal)
    }

    async fn register(&self, principal: Principal) {
        self.roles.invalidate(&principal.email).await;
        self.principals
            .write()
            .await
            .insert(principal.uid.clone(), principal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_rules() {
        assert_eq!(validate_password("Ab1"), Err("Minimum 6 characters".into()));
        assert_eq!(
            validate_password("lowercase"),
            Err("Must contain uppercase & lowercase letters".into())
        );
        assert_eq!(
            validate_password("UPPERCASE"),
            Err("Must contain uppercase & lowercase letters".into())
        );
        assert_eq!(validate_password("Secret1"), Ok(()));
    }

    #[test]
    fn account_errors_have_friendly_messages() {
        let err = AccountError::Identity(IdentityError::Rejected {
            code: "EMAIL_EXISTS".into(),
        });
        assert_eq!(err.user_message(), "An account with this email already exists.");

        let err = AccountError::Backend(ApiError::Unexpected("down".into()));
        assert_eq!(err.user_message(), "Failed to save user");
    }
}
