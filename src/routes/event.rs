use axum::{
    Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_login::tower_sessions::Session;
use chrono::Utc;
use minijinja::context;
use serde::Deserialize;
use tracing::warn;

use super::{Viewer, matches_search, render};
use crate::{
    AppState,
    access::Role,
    api::{membership::RegistrationStatus, segment},
    auth::user::AuthSession,
    cache::keys,
    error::AppResult,
    flash,
    join::{JoinError, JoinOutcome, event_control},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(events))
        .route("/event/{id}", get(event_detail))
        .route("/events/{id}", get(event_detail))
        .route("/event/{id}/register", post(register))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EventFilter {
    search: String,
    upcoming: bool,
}

async fn events(
    State(state): State<AppState>,
    mut auth_session: AuthSession,
    session: Session,
    Query(filter): Query<EventFilter>,
) -> AppResult<Response> {
    let viewer = Viewer::load(&state, &mut auth_session).await;
    let events = state
        .cache
        .get_or_fetch(keys::ALL_EVENTS, || state.api.all_events())
        .await?;

    let now = Utc::now();
    let mut events: Vec<_> = events
        .into_iter()
        .filter(|event| !filter.upcoming || event.event_date >= now)
        .filter(|event| {
            matches_search(
                &filter.search,
                &[
                    Some(event.title.as_str()),
                    Some(event.location.as_str()),
                    event.club_name.as_deref(),
                ],
            )
        })
        .collect();
    events.sort_by_key(|event| event.event_date);

    let page = render(
        &state,
        &session,
        &viewer,
        "events.html",
        context! {
            events => events,
            search => filter.search,
            upcoming => filter.upcoming,
        },
    )
    .await?;
    Ok(page.into_response())
}

async fn event_detail(
    State(state): State<AppState>,
    mut auth_session: AuthSession,
    session: Session,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let viewer = Viewer::load(&state, &mut auth_session).await;
    let event = state.joins.event(&id).await?;

    let status = match (&viewer.principal, viewer.role()) {
        (Some(principal), Some(Role::Member)) => state
            .joins
            .registration_status(principal, &event.id)
            .await
            .unwrap_or_else(|e| {
                warn!("registration check for {} failed: {}", event.id, e);
                RegistrationStatus::Unregistered
            }),
        _ => RegistrationStatus::Unregistered,
    };

    let page = render(
        &state,
        &session,
        &viewer,
        "event.html",
        context! {
            event => event,
            control => event_control(&event, status),
            status => status,
        },
    )
    .await?;
    Ok(page.into_response())
}

async fn register(
    State(state): State<AppState>,
    mut auth_session: AuthSession,
    session: Session,
    Path(id): Path<String>,
) -> Response {
    let viewer = Viewer::load(&state, &mut auth_session).await;
    let detail = format!("/event/{}", segment(&id));

    match state
        .joins
        .register_for_event(viewer.principal.as_ref(), viewer.role, &id)
        .await
    {
        Ok(JoinOutcome::Checkout { url }) => return Redirect::to(&url).into_response(),
        Ok(JoinOutcome::Joined { message }) => flash::success(&session, message).await,
        Err(JoinError::Refused(refusal)) => flash::error(&session, refusal.to_string()).await,
        Err(JoinError::Failed { message }) => flash::error(&session, message).await,
    }
    Redirect::to(&detail).into_response()
}
