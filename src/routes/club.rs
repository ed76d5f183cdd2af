use axum::{
    Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_login::tower_sessions::Session;
use minijinja::context;
use serde::Deserialize;
use tracing::warn;

use super::{Viewer, matches_search, render};
use crate::{
    AppState,
    access::Role,
    api::segment,
    auth::user::AuthSession,
    cache::keys,
    error::AppResult,
    flash,
    join::{JoinError, JoinOutcome, club_control},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/clubs", get(clubs))
        .route("/club/{id}", get(club_detail))
        .route("/club/{id}/join", post(join))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClubFilter {
    search: String,
    category: String,
}

async fn clubs(
    State(state): State<AppState>,
    mut auth_session: AuthSession,
    session: Session,
    Query(filter): Query<ClubFilter>,
) -> AppResult<Response> {
    let viewer = Viewer::load(&state, &mut auth_session).await;
    let clubs = state
        .cache
        .get_or_fetch(keys::APPROVED_CLUBS, || state.api.approved_clubs())
        .await?;

    let mut categories: Vec<String> = clubs.iter().map(|c| c.category.clone()).collect();
    categories.sort();
    categories.dedup();

    let clubs: Vec<_> = clubs
        .into_iter()
        .filter(|club| filter.category.is_empty() || club.category == filter.category)
        .filter(|club| {
            matches_search(
                &filter.search,
                &[
                    Some(club.club_name.as_str()),
                    Some(club.location.as_str()),
                    Some(club.category.as_str()),
                ],
            )
        })
        .collect();

    let page = render(
        &state,
        &session,
        &viewer,
        "clubs.html",
        context! {
            clubs => clubs,
            categories => categories,
            search => filter.search,
            category => filter.category,
        },
    )
    .await?;
    Ok(page.into_response())
}

async fn club_detail(
    State(state): State<AppState>,
    mut auth_session: AuthSession,
    session: Session,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let viewer = Viewer::load(&state, &mut auth_session).await;
    let club = state
        .cache
        .get_or_fetch(&keys::club(&id), || state.api.club(None, &id))
        .await?;

    let is_member = match (&viewer.principal, viewer.role()) {
        (Some(principal), Some(Role::Member)) => state
            .joins
            .has_active_membership(principal, &club.id)
            .await
            .unwrap_or_else(|e| {
                warn!("membership check for {} failed: {}", club.id, e);
                false
            }),
        _ => false,
    };

    let page = render(
        &state,
        &session,
        &viewer,
        "club.html",
        context! {
            club => club,
            control => club_control(&club),
            is_member => is_member,
        },
    )
    .await?;
    Ok(page.into_response())
}

async fn join(
    State(state): State<AppState>,
    mut auth_session: AuthSession,
    session: Session,
    Path(id): Path<String>,
) -> Response {
    let viewer = Viewer::load(&state, &mut auth_session).await;
    let detail = format!("/club/{}", segment(&id));

    match state
        .joins
        .join_club(viewer.principal.as_ref(), viewer.role, &id)
        .await
    {
        Ok(JoinOutcome::Checkout { url }) => return Redirect::to(&url).into_response(),
        Ok(JoinOutcome::Joined { message }) => flash::success(&session, message).await,
        Err(JoinError::Refused(refusal)) => flash::error(&session, refusal.to_string()).await,
        Err(JoinError::Failed { message }) => flash::error(&session, message).await,
    }
    Redirect::to(&detail).into_response()
}
