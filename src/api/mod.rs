use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

pub mod club;
pub mod event;
pub mod membership;
pub mod overview;
pub mod payment;
pub mod user;

/// Client for the ClubSphere REST backend.
///
/// Every operation takes the caller's ID token when the backend needs to know
/// who is asking; public listings pass `None`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("backend responded with {status}")]
    Status {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("unexpected response from backend: {0}")]
    Unexpected(String),
}

impl ApiError {
    /// The human-readable message the backend attached to a failed request.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Status {
                message: Some(message),
                ..
            } => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// `{ success: bool }` acknowledgement some mutations answer with.
#[derive(Debug, Clone, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionBody<'a> {
    session_id: &'a str,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    #[cfg(test)]
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);
        let builder = self.http.request(method, url);
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
    ) -> Result<T, ApiError> {
        let response = self.request(Method::GET, path, token).send().await?;
        read_json(response).await
    }

    pub(crate) async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .request(method, path, token)
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    /// Sends a request whose response body is irrelevant beyond its status.
    pub(crate) async fn send_empty(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&serde_json::Value>,
    ) -> Result<(), ApiError> {
        let mut builder = self.request(method, path, token);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        check_status(response).await.map(|_| ())
    }

    /// Tells the backend a club checkout session finished.
    pub async fn confirm_club_payment(&self, token: Option<&str>, session_id: &str) -> Result<(), ApiError> {
        let body = serde_json::to_value(SessionBody { session_id })
            .map_err(|e| ApiError::Unexpected(e.to_string()))?;
        self.send_empty(Method::POST, "/payment-success", token, Some(&body))
            .await
    }

    /// Tells the backend an event checkout session finished.
    pub async fn confirm_event_payment(&self, token: Option<&str>, session_id: &str) -> Result<(), ApiError> {
        let body = serde_json::to_value(SessionBody { session_id })
            .map_err(|e| ApiError::Unexpected(e.to_string()))?;
        self.send_empty(Method::POST, "/event-payment-success", token, Some(&body))
            .await
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .filter(|message| !message.trim().is_empty());
    Err(ApiError::Status { status, message })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let response = check_status(response).await?;
    Ok(response.json::<T>().await?)
}

/// Percent-encodes a backend id before it is spliced into a path.
pub(crate) fn segment(id: &str) -> String {
    percent_encoding::utf8_percent_encode(id, percent_encoding::NON_ALPHANUMERIC).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_only_for_status_errors() {
        let err = ApiError::Status {
            status: StatusCode::CONFLICT,
            message: Some("Already a member".into()),
        };
        assert_eq!(err.server_message(), Some("Already a member"));
        assert!(!err.is_not_found());

        let err = ApiError::Unexpected("boom".into());
        assert_eq!(err.server_message(), None);
    }

    #[test]
    fn not_found_is_detected() {
        let err = ApiError::Status {
            status: StatusCode::NOT_FOUND,
            message: None,
        };
        assert!(err.is_not_found());
    }

    #[test]
    fn base_url_is_normalized() {
        let api = ApiClient::new("http://localhost:5000/");
        assert_eq!(api.base_url(), "http://localhost:5000");
    }

    #[test]
    fn segments_are_escaped() {
        assert_eq!(segment("abc123"), "abc123");
        assert_eq!(segment("a/b"), "a%2Fb");
    }
}
