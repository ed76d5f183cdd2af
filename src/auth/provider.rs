use chrono::{DateTime, Duration, Utc};
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use tracing::debug;

use crate::config::IdentityConfig;

/// REST client for the identity service (identity-toolkit style API).
#[derive(Debug, Clone)]
pub struct IdentityProvider {
    http: reqwest::Client,
    url: String,
    token_url: String,
    api_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity provider rejected the request: {code}")]
    Rejected { code: String },

    #[error("identity provider unavailable ({0})")]
    Unavailable(StatusCode),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl IdentityError {
    /// Failures worth retrying later rather than ending the session.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            IdentityError::Unavailable(_) | IdentityError::Transport(_)
        )
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            IdentityError::Rejected { code } => message_for(code),
            IdentityError::Transport(_) => "Network error. Check your internet connection.",
            IdentityError::Unavailable(_) => "Something went wrong. Please try again.",
        }
    }
}

fn message_for(code: &str) -> &'static str {
    match code {
        "EMAIL_NOT_FOUND" => "No account found with this email.",
        "INVALID_PASSWORD" => "Incorrect password. Please try again.",
        "INVALID_LOGIN_CREDENTIALS" => "Incorrect email or password.",
        "INVALID_EMAIL" => "Please enter a valid email address.",
        "USER_DISABLED" => "This account has been disabled.",
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "Too many failed attempts. Please try again later.",
        "EMAIL_EXISTS" => "An account with this email already exists.",
        "WEAK_PASSWORD" => "Password should be at least 6 characters.",
        _ => "Something went wrong. Please try again.",
    }
}

/// Identity and tokens returned by sign-in, sign-up and federated sign-in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub local_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub local_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordBody<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

/// Converts the provider's `expiresIn` (seconds, as a string) into a deadline.
pub fn expiry_from(expires_in: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let seconds = expires_in.trim().parse::<i64>().unwrap_or(3600);
    now + Duration::seconds(seconds)
}

impl IdentityProvider {
    pub fn new(config: &IdentityConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: config.url.trim_end_matches('/').to_string(),
            token_url: config.token_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<SignInResponse, IdentityError> {
        self.call(
            "signInWithPassword",
            &PasswordBody {
                email,
                password,
                return_secure_token: true,
            },
        )
        .await
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignInResponse, IdentityError> {
        self.call(
            "signUp",
            &PasswordBody {
                email,
                password,
                return_secure_token: true,
            },
        )
        .await
    }

    pub async fn lookup(&self, id_token: &str) -> Result<Option<AccountInfo>, IdentityError> {
        let response: LookupResponse = self
            .call("lookup", &json!({ "idToken": id_token }))
            .await?;
        Ok(response.users.into_iter().next())
    }

    pub async fn update_profile(
        &self,
        id_token: &str,
        display_name: &str,
        photo_url: &str,
    ) -> Result<UpdateResponse, IdentityError> {
        self.call(
            "update",
            &json!({
                "idToken": id_token,
                "displayName": display_name,
                "photoUrl": photo_url,
                "returnSecureToken": true,
            }),
        )
        .await
    }

    /// Exchanges an OAuth access token from `provider_id` for a session.
    pub async fn sign_in_with_idp(
        &self,
        provider_id: &str,
        access_token: &str,
        request_uri: &str,
    ) -> Result<SignInResponse, IdentityError> {
        self.call(
            "signInWithIdp",
            &json!({
                "postBody": format!("access_token={access_token}&providerId={provider_id}"),
                "requestUri": request_uri,
                "returnSecureToken": true,
                "returnIdpCredential": true,
            }),
        )
        .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, IdentityError> {
        let request = self
            .http
            .post(&self.token_url)
            .query(&[("key", self.api_key.as_str())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ]);
        send(request).await
    }

    async fn call<B: Serialize + ?Sized, T: DeserializeOwned>(&self, method: &str, body: &B) -> Result<T, IdentityError> {
        debug!("identity accounts:{}", method);
        let request = self
            .http
            .post(format!("{}/accounts:{}", self.url, method))
            .query(&[("key", self.api_key.as_str())])
            .json(body);
        send(request).await
    }
}

async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, IdentityError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }
    if status.is_server_error() {
        return Err(IdentityError::Unavailable(status));
    }
    let code = response
        .json::<ErrorEnvelope>()
        .await
        .map(|envelope| error_code(&envelope.error.message))
        .unwrap_or_else(|_| "UNKNOWN".to_string());
    Err(IdentityError::Rejected { code })
}

/// `"TOO_MANY_ATTEMPTS_TRY_LATER : Access disabled"` -> `"TOO_MANY_ATTEMPTS_TRY_LATER"`.
fn error_code(message: &str) -> String {
    message
        .split([' ', ':'])
        .next()
        .unwrap_or_default()
        .to_string()
}
