use axum::{
    Router,
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_login::tower_sessions::Session;
use minijinja::context;
use serde::Deserialize;
use tracing::{info, warn};

use super::{Viewer, render};
use crate::{AppState, auth::user::AuthSession, cache::keys, error::AppResult, flash};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payment-success", get(club_payment_success))
        .route("/event-payment-success", get(event_payment_success))
}

#[derive(Debug, Deserialize)]
pub struct CheckoutReturn {
    session_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Purchase {
    Membership,
    Registration,
}

async fn club_payment_success(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    Query(query): Query<CheckoutReturn>,
) -> AppResult<Response> {
    payment_returned(state, auth_session, session, query, Purchase::Membership).await
}

async fn event_payment_success(
    State(state): State<AppState>,
    auth_session: AuthSession,
    session: Session,
    Query(query): Query<CheckoutReturn>,
) -> AppResult<Response> {
    payment_returned(state, auth_session, session, query, Purchase::Registration).await
}

/// Confirms the checkout once and shows the success page whatever the
/// backend answered.
async fn payment_returned(
    state: AppState,
    mut auth_session: AuthSession,
    session: Session,
    query: CheckoutReturn,
    purchase: Purchase,
) -> AppResult<Response> {
    let viewer = Viewer::load(&state, &mut auth_session).await;
    let token = viewer.principal.as_ref().map(|p| p.id_token.as_str());

    if let Some(session_id) = query.session_id.as_deref().filter(|id| !id.is_empty()) {
        let confirmed = match purchase {
            Purchase::Membership => state.api.confirm_club_payment(token, session_id).await,
            Purchase::Registration => state.api.confirm_event_payment(token, session_id).await,
        };
        match (confirmed, purchase) {
            (Ok(()), Purchase::Membership) => info!("club checkout {} confirmed", session_id),
            (Ok(()), Purchase::Registration) => {
                info!("event checkout {} confirmed", session_id);
                flash::success(&session, "Event registration successful!").await;
            }
            (Err(e), Purchase::Membership) => {
                warn!("club checkout {} not confirmed: {}", session_id, e);
            }
            (Err(e), Purchase::Registration) => {
                warn!("event checkout {} not confirmed: {}", session_id, e);
                flash::error(&session, "Payment verification failed").await;
            }
        }

        if let Some(principal) = &viewer.principal {
            state
                .cache
                .invalidate_all(keys::enrollments(&principal.email))
                .await;
        }
        state.cache.invalidate_prefix(keys::CLUBS).await;
        state.cache.invalidate_prefix(&keys::club("")).await;
        state.cache.invalidate_prefix(&keys::event("")).await;
    }

    let template = match purchase {
        Purchase::Membership => "payment_success.html",
        Purchase::Registration => "event_payment_success.html",
    };
    let page = render(&state, &session, &viewer, template, context! {}).await?;
    Ok(page.into_response())
}
