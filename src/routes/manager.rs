use axum::{
    Extension, Form, Router,
    extract::{Multipart, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_login::tower_sessions::Session;
use chrono::Utc;
use minijinja::context;
use serde::Deserialize;
use tracing::{info, warn};

use super::{
    Viewer,
    forms::{CATEGORIES, EventForm, club_draft},
    matches_search, render,
};
use crate::{
    AppState,
    api::{club::ClubDraft, segment},
    auth::Principal,
    cache::keys,
    error::AppResult,
    flash,
    media::{FormFields, resolve_image},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/create-club", get(new_club).post(create_club))
        .route("/dashboard/manage-club", get(manage_clubs))
        .route("/dashboard/manage-club/{id}/delete", post(delete_club))
        .route("/dashboard/update-club/{id}", get(edit_club).post(update_club))
        .route("/dashboard/club-members/{id}", get(club_members))
        .route(
            "/dashboard/club-members/{club_id}/expire/{membership_id}",
            post(expire_member),
        )
        .route("/dashboard/create-event", get(new_event).post(create_event))
        .route("/dashboard/manage-event", get(manage_events))
        .route("/dashboard/manage-event/{id}/delete", post(delete_event))
        .route("/dashboard/update-event/{id}", get(edit_event).post(update_event))
        .route("/dashboard/event-registrations/{id}", get(event_registrations))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub search: String,
}

async fn forget_clubs(state: &AppState, id: Option<&str>) {
    state.cache.invalidate_prefix(keys::CLUBS).await;
    if let Some(id) = id {
        state.cache.invalidate(&keys::club(id)).await;
    }
}

async fn forget_events(state: &AppState, id: Option<&str>) {
    state.cache.invalidate_prefix(keys::EVENTS).await;
    if let Some(id) = id {
        state.cache.invalidate(&keys::event(id)).await;
    }
}

/// Reads a club form, uploading the banner if one was attached.
async fn read_club_form(
    state: &AppState,
    multipart: Multipart,
    current_banner: Option<&str>,
) -> Result<ClubDraft, String> {
    let mut form = FormFields::read(multipart, "bannerImage")
        .await
        .map_err(|e| e.user_message().to_string())?;
    let banner = resolve_image(state.images.as_ref(), &mut form, "bannerImageUrl", current_banner)
        .await
        .map_err(|e| e.user_message().to_string())?;
    club_draft(&form, banner)
}

async fn new_club(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
) -> AppResult<Response> {
    let viewer = Viewer::signed_in(&state, principal).await;
    let page = render(
        &state,
        &session,
        &viewer,
        "dashboard/club_form.html",
        context! {
            categories => CATEGORIES,
            uploads_enabled => state.images.is_some(),
        },
    )
    .await?;
    Ok(page.into_response())
}

async fn create_club(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
    multipart: Multipart,
) -> Response {
    let mut draft = match read_club_form(&state, multipart, None).await {
        Ok(draft) => draft,
        Err(message) => {
            flash::error(&session, message).await;
            return Redirect::to("/dashboard/create-club").into_response();
        }
    };
    draft.manager_email = Some(principal.email.clone());

    match state.api.create_club(&principal.id_token, &draft).await {
        Ok(()) => {
            info!("{} created club {}", principal.email, draft.club_name);
            forget_clubs(&state, None).await;
            flash::success(&session, "Club created! Awaiting approval").await;
            Redirect::to("/dashboard/manage-club").into_response()
        }
        Err(e) => {
            warn!("club creation by {} failed: {}", principal.email, e);
            flash::error(&session, e.server_message().unwrap_or("Failed to create club")).await;
            Redirect::to("/dashboard/create-club").into_response()
        }
    }
}

async fn manage_clubs(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
    Query(query): Query<SearchQuery>,
) -> AppResult<Response> {
    let clubs: Vec<_> = state
        .api
        .manager_clubs(&principal.id_token)
        .await?
        .into_iter()
        .filter(|club| {
            matches_search(
                &query.search,
                &[Some(club.club_name.as_str()), Some(club.category.as_str())],
            )
        })
        .collect();
    let viewer = Viewer::signed_in(&state, principal).await;
    let page = render(
        &state,
        &session,
        &viewer,
        "dashboard/manage_clubs.html",
        context! { clubs => clubs, search => query.search },
    )
    .await?;
    Ok(page.into_response())
}

async fn delete_club(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
    Path(id): Path<String>,
) -> Redirect {
    match state.api.delete_club(&principal.id_token, &id).await {
        Ok(()) => {
            forget_clubs(&state, Some(&id)).await;
            flash::success(&session, "Club deleted successfully!").await;
        }
        Err(e) => {
            warn!("deleting club {} failed: {}", id, e);
            flash::error(&session, "Failed to delete club").await;
        }
    }
    Redirect::to("/dashboard/manage-club")
}

async fn edit_club(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let club = state.api.managed_club(&principal.id_token, &id).await?;
    let viewer = Viewer::signed_in(&state, principal).await;
    let page = render(
        &state,
        &session,
        &viewer,
        "dashboard/club_form.html",
        context! {
            club => club,
            categories => CATEGORIES,
            uploads_enabled => state.images.is_some(),
        },
    )
    .await?;
    Ok(page.into_response())
}

async fn update_club(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Response {
    let edit = format!("/dashboard/update-club/{}", segment(&id));
    let current = match state.api.managed_club(&principal.id_token, &id).await {
        Ok(club) => club,
        Err(e) => {
            warn!("loading club {} for update failed: {}", id, e);
            flash::error(&session, "Failed to update club!").await;
            return Redirect::to("/dashboard/manage-club").into_response();
        }
    };
    let draft = match read_club_form(&state, multipart, current.banner_image.as_deref()).await {
        Ok(draft) => draft,
        Err(message) => {
            flash::error(&session, message).await;
            return Redirect::to(&edit).into_response();
        }
    };

    match state.api.update_club(&principal.id_token, &id, &draft).await {
        Ok(()) => {
            forget_clubs(&state, Some(&id)).await;
            flash::success(&session, "Club updated successfully!").await;
            Redirect::to("/dashboard/manage-club").into_response()
        }
        Err(e) => {
            warn!("updating club {} failed: {}", id, e);
            flash::error(&session, "Failed to update club!").await;
            Redirect::to(&edit).into_response()
        }
    }
}

async fn club_members(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let (club, members) = tokio::join!(
        state.api.managed_club(&principal.id_token, &id),
        state.api.club_members(&principal.id_token, &id),
    );
    let (club, members) = (club?, members?);
    let viewer = Viewer::signed_in(&state, principal).await;
    let page = render(
        &state,
        &session,
        &viewer,
        "dashboard/club_members.html",
        context! { club => club, members => members },
    )
    .await?;
    Ok(page.into_response())
}

async fn expire_member(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
    Path((club_id, membership_id)): Path<(String, String)>,
) -> Redirect {
    match state
        .api
        .expire_member(&principal.id_token, &membership_id)
        .await
    {
        Ok(()) => {
            forget_clubs(&state, Some(&club_id)).await;
            // Membership checks are keyed by member email, unknown here.
            state.cache.invalidate_prefix(keys::MEMBERSHIP_CHECKS).await;
            flash::success(&session, "Member expired").await;
        }
        Err(e) => {
            warn!("expiring membership {} failed: {}", membership_id, e);
            flash::error(&session, "Failed to expire member").await;
        }
    }
    Redirect::to(&format!("/dashboard/club-members/{}", segment(&club_id)))
}

async fn new_event(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
) -> AppResult<Response> {
    let clubs = state.api.manager_approved_clubs(&principal.id_token).await?;
    let viewer = Viewer::signed_in(&state, principal).await;
    let page = render(
        &state,
        &session,
        &viewer,
        "dashboard/event_form.html",
        context! { clubs => clubs },
    )
    .await?;
    Ok(page.into_response())
}

async fn create_event(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
    Form(form): Form<EventForm>,
) -> Redirect {
    let back = Redirect::to("/dashboard/create-event");
    let draft = match form.into_draft() {
        Ok(draft) if draft.event_date.date_naive() < Utc::now().date_naive() => {
            flash::error(&session, "Event date cannot be in the past").await;
            return back;
        }
        Ok(draft) => draft,
        Err(message) => {
            flash::error(&session, message).await;
            return back;
        }
    };

    match state.api.create_event(&principal.id_token, &draft).await {
        Ok(()) => {
            info!("{} created event {}", principal.email, draft.title);
            forget_events(&state, None).await;
            flash::success(&session, "Event created successfully!").await;
            Redirect::to("/dashboard/manage-event")
        }
        Err(e) => {
            warn!("event creation by {} failed: {}", principal.email, e);
            flash::error(&session, "Failed to create event").await;
            back
        }
    }
}

async fn manage_events(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
    Query(query): Query<SearchQuery>,
) -> AppResult<Response> {
    let mut events: Vec<_> = state
        .api
        .manager_events(&principal.id_token)
        .await?
        .into_iter()
        .filter(|event| {
            matches_search(
                &query.search,
                &[Some(event.title.as_str()), event.club_name.as_deref()],
            )
        })
        .collect();
    events.sort_by_key(|event| event.event_date);
    let viewer = Viewer::signed_in(&state, principal).await;
    let page = render(
        &state,
        &session,
        &viewer,
        "dashboard/manage_events.html",
        context! { events => events, search => query.search },
    )
    .await?;
    Ok(page.into_response())
}

async fn delete_event(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
    Path(id): Path<String>,
) -> Redirect {
    match state.api.delete_event(&principal.id_token, &id).await {
        Ok(()) => {
            forget_events(&state, Some(&id)).await;
            flash::success(&session, "Event deleted successfully!").await;
        }
        Err(e) => {
            warn!("deleting event {} failed: {}", id, e);
            flash::error(&session, "Failed to delete event").await;
        }
    }
    Redirect::to("/dashboard/manage-event")
}

async fn edit_event(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let (event, clubs) = tokio::join!(
        state.api.managed_event(&principal.id_token, &id),
        state.api.manager_approved_clubs(&principal.id_token),
    );
    let (event, clubs) = (event?, clubs?);
    let viewer = Viewer::signed_in(&state, principal).await;
    let page = render(
        &state,
        &session,
        &viewer,
        "dashboard/event_form.html",
        context! { event => event, clubs => clubs },
    )
    .await?;
    Ok(page.into_response())
}

async fn update_event(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
    Path(id): Path<String>,
    Form(form): Form<EventForm>,
) -> Redirect {
    let edit = Redirect::to(&format!("/dashboard/update-event/{}", segment(&id)));
    let draft = match form.into_draft() {
        Ok(draft) => draft,
        Err(message) => {
            flash::error(&session, message).await;
            return edit;
        }
    };

    match state.api.update_event(&principal.id_token, &id, &draft).await {
        Ok(()) => {
            forget_events(&state, Some(&id)).await;
            flash::success(&session, "Event updated successfully!").await;
            Redirect::to("/dashboard/manage-event")
        }
        Err(e) => {
            warn!("updating event {} failed: {}", id, e);
            flash::error(&session, "Failed to update event").await;
            edit
        }
    }
}

async fn event_registrations(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let (event, registrations) = tokio::join!(
        state.api.managed_event(&principal.id_token, &id),
        state.api.event_registrations(&principal.id_token, &id),
    );
    let (event, registrations) = (event?, registrations?);
    let viewer = Viewer::signed_in(&state, principal).await;
    let page = render(
        &state,
        &session,
        &viewer,
        "dashboard/event_registrations.html",
        context! { event => event, registrations => registrations },
    )
    .await?;
    Ok(page.into_response())
}
