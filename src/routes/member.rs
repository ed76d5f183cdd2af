use axum::{
    Extension, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_login::tower_sessions::Session;
use minijinja::context;

use super::{Viewer, render};
use crate::{AppState, auth::Principal, error::AppResult};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/member/joined-club", get(joined_clubs))
        .route("/dashboard/my-events", get(my_events))
        .route("/dashboard/my-payments", get(my_payments))
}

async fn joined_clubs(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
) -> AppResult<Response> {
    let memberships = state.api.active_memberships(&principal.id_token).await?;
    let viewer = Viewer::signed_in(&state, principal).await;
    let page = render(
        &state,
        &session,
        &viewer,
        "dashboard/joined_clubs.html",
        context! { memberships => memberships },
    )
    .await?;
    Ok(page.into_response())
}

async fn my_events(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
) -> AppResult<Response> {
    let mut events = state.api.my_registered_events(&principal.id_token).await?;
    events.sort_by_key(|event| event.event_date);
    let viewer = Viewer::signed_in(&state, principal).await;
    let page = render(
        &state,
        &session,
        &viewer,
        "dashboard/my_events.html",
        context! { events => events },
    )
    .await?;
    Ok(page.into_response())
}

async fn my_payments(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
) -> AppResult<Response> {
    let payments = state.api.my_payments(&principal.id_token).await?;
    let total: f64 = payments.iter().map(|p| p.amount).sum();
    let viewer = Viewer::signed_in(&state, principal).await;
    let page = render(
        &state,
        &session,
        &viewer,
        "dashboard/my_payments.html",
        context! { payments => payments, total => total },
    )
    .await?;
    Ok(page.into_response())
}
