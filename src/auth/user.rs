use async_session::async_trait;
use axum_login::{AuthUser, AuthnBackend, UserId};
use oauth2::{
    AuthorizationCode, CsrfToken, HttpClientError, Scope, TokenResponse,
    basic::BasicRequestTokenError,
};
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::{
    Principal,
    context::{AccountError, IdentityContext},
    provider::IdentityError,
};
use crate::OauthClient;

impl AuthUser for Principal {
    type Id = String;

    fn id(&self) -> Self::Id {
        self.uid.clone()
    }

    fn session_auth_hash(&self) -> &[u8] {
        self.refresh_token.as_bytes()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub enum Credentials {
    Password {
        email: String,
        password: String,
    },
    Google {
        code: String,
        old_state: CsrfToken,
        new_state: CsrfToken,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error("Google sign-in is not configured")]
    GoogleDisabled,

    #[error(transparent)]
    OAuth2(BasicRequestTokenError<HttpClientError<reqwest::Error>>),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}

impl BackendError {
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Identity(e) => e.user_message().to_string(),
            BackendError::Account(e) => e.user_message(),
            BackendError::GoogleDisabled => "Google sign-in is not available.".to_string(),
            BackendError::OAuth2(_) | BackendError::Reqwest(_) => {
                "Google sign-in failed. Please try again.".to_string()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct GoogleSignIn {
    pub client: OauthClient,
    pub redirect_url: String,
}

#[derive(Debug, Clone)]
pub struct Backend {
    pub context: Arc<IdentityContext>,
    google: Option<GoogleSignIn>,
}

impl Backend {
    pub fn new(context: Arc<IdentityContext>, google: Option<GoogleSignIn>) -> Self {
        Self { context, google }
    }

    pub fn authorize_url(&self) -> Option<(Url, CsrfToken)> {
        let google = self.google.as_ref()?;
        Some(
            google
                .client
                .authorize_url(CsrfToken::new_random)
                .add_scope(Scope::new("openid".to_string()))
                .add_scope(Scope::new("email".to_string()))
                .add_scope(Scope::new("profile".to_string()))
                .url(),
        )
    }

    async fn exchange_google_code(&self, code: String) -> Result<Principal, BackendError> {
        let google = self.google.as_ref().ok_or(BackendError::GoogleDisabled)?;

        let http_client = reqwest::ClientBuilder::new()
            // Following redirects opens the client up to SSRF vulnerabilities.
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        let token_res = google
            .client
            .exchange_code(AuthorizationCode::new(code))
            .request_async(&http_client)
            .await
            .map_err(BackendError::OAuth2)?;

        let principal = self
            .context
            .sign_in_with_google(token_res.access_token().secret(), &google.redirect_url)
            .await?;
        Ok(principal)
    }
}

#[async_trait]
impl AuthnBackend for Backend {
    type User = Principal;
    type Credentials = Credentials;
    type Error = BackendError;

    async fn authenticate(
        &self,
        creds: Self::Credentials,
    ) -> Result<Option<Self::User>, Self::Error> {
        match creds {
            Credentials::Password { email, password } => {
                debug!("password sign-in for {}", email);
                let principal = self.context.sign_in(email.trim(), &password).await?;
                Ok(Some(principal))
            }
            Credentials::Google {
                code,
                old_state,
                new_state,
            } => {
                // Ensure the CSRF state has not been tampered with.
                if old_state.secret() != new_state.secret() {
                    return Ok(None);
                }
                self.exchange_google_code(code).await.map(Some)
            }
        }
    }

    async fn get_user(&self, user_id: &UserId<Self>) -> Result<Option<Self::User>, Self::Error> {
        Ok(self.context.current(user_id).await)
    }
}

pub type AuthSession = axum_login::AuthSession<Backend>;
