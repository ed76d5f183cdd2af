use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::error;

use crate::api::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Template(#[from] minijinja::Error),

    #[error("not found")]
    NotFound,

    #[error("principal missing from a guarded request")]
    MissingPrincipal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Api(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            AppError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::NOT_FOUND {
            return (status, Html(page("Not found", "We couldn't find that page."))).into_response();
        }

        error!("request failed: {:?}", self);
        (
            status,
            Html(page("Something went wrong", "Please try again in a moment.")),
        )
            .into_response()
    }
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>{title} | ClubSphere</title>
</head>
<body>
    <h1>{title}</h1>
    <p>{body}</p>
    <p><a href="/">Back to home</a></p>
</body>
</html>"#
    )
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_not_found_becomes_404() {
        let err = AppError::Api(ApiError::Status {
            status: StatusCode::NOT_FOUND,
            message: None,
        });
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::MissingPrincipal.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
