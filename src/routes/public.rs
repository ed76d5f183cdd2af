use axum::{
    Form, Router,
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_login::tower_sessions::Session;
use minijinja::context;
use serde::Deserialize;
use tracing::warn;

use super::{Viewer, render};
use crate::{
    AppState,
    auth::user::AuthSession,
    cache::keys,
    error::AppResult,
    flash,
    mail::ContactMessage,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/about", get(about))
        .route("/contact", get(contact).post(send_contact))
        .route("/newsletter", post(newsletter))
}

async fn home(
    State(state): State<AppState>,
    mut auth_session: AuthSession,
    session: Session,
) -> AppResult<Response> {
    let viewer = Viewer::load(&state, &mut auth_session).await;
    // The landing page still renders when the featured list is unavailable.
    let featured = state
        .cache
        .get_or_fetch(keys::FEATURED_CLUBS, || state.api.featured_clubs())
        .await
        .unwrap_or_else(|e| {
            warn!("featured clubs unavailable: {}", e);
            Vec::new()
        });

    let page = render(&state, &session, &viewer, "home.html", context! { featured => featured }).await?;
    Ok(page.into_response())
}

async fn about(
    State(state): State<AppState>,
    mut auth_session: AuthSession,
    session: Session,
) -> AppResult<Response> {
    let viewer = Viewer::load(&state, &mut auth_session).await;
    let page = render(&state, &session, &viewer, "about.html", context! {}).await?;
    Ok(page.into_response())
}

async fn contact(
    State(state): State<AppState>,
    mut auth_session: AuthSession,
    session: Session,
) -> AppResult<Response> {
    let viewer = Viewer::load(&state, &mut auth_session).await;
    let page = render(&state, &session, &viewer, "contact.html", context! {}).await?;
    Ok(page.into_response())
}

async fn send_contact(
    State(state): State<AppState>,
    session: Session,
    Form(message): Form<ContactMessage>,
) -> Response {
    if let Err(problem) = message.validate() {
        flash::error(&session, problem).await;
        return Redirect::to("/contact").into_response();
    }

    let sent = match &state.mailer {
        Some(mailer) => mailer.send_contact(&message).await.map_err(|e| e.to_string()),
        None => Err("mail delivery is not configured".to_string()),
    };
    match sent {
        Ok(()) => flash::success(&session, "Message sent! Please check your email.").await,
        Err(e) => {
            warn!("contact message from {} not sent: {}", message.email, e);
            flash::error(&session, "Failed to send message. Please try again.").await;
        }
    }
    Redirect::to("/contact").into_response()
}

#[derive(Debug, Deserialize)]
struct Subscription {
    #[serde(default)]
    email: String,
}

async fn newsletter(session: Session, Form(Subscription { email }): Form<Subscription>) -> Response {
    if email.trim().is_empty() || !email.contains('@') {
        flash::error(&session, "Please enter a valid email").await;
    } else {
        flash::success(&session, "Subscribed successfully! 🎉").await;
    }
    Redirect::to("/").into_response()
}
