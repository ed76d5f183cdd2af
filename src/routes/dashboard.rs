use axum::{
    Extension, Router,
    extract::{Multipart, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_login::tower_sessions::Session;
use minijinja::context;
use tracing::warn;

use super::{Viewer, render};
use crate::{
    AppState,
    access::Role,
    auth::{Principal, user::AuthSession},
    error::AppResult,
    flash,
    media::{FormFields, resolve_image},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/dashboard/profile", get(profile).post(update_profile))
}

/// Overview page; which numbers it shows depends on the viewer's role.
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
) -> AppResult<Response> {
    let token = principal.id_token.clone();
    let viewer = Viewer::signed_in(&state, principal).await;

    let ctx = match viewer.role() {
        Some(Role::Admin) => {
            let (overview, users, revenue) = tokio::join!(
                state.api.admin_overview(&token),
                state.api.users_over_time(&token),
                state.api.revenue_over_time(&token),
            );
            context! {
                admin => overview?,
                users_series => users.unwrap_or_else(|e| {
                    warn!("users series unavailable: {}", e);
                    Vec::new()
                }),
                revenue_series => revenue.unwrap_or_else(|e| {
                    warn!("revenue series unavailable: {}", e);
                    Vec::new()
                }),
            }
        }
        Some(Role::Manager) => context! {
            manager => state.api.manager_overview(&token).await?,
        },
        Some(Role::Member) => context! {
            member => state.api.member_overview(&token).await?,
        },
        None => context! {},
    };

    let page = render(&state, &session, &viewer, "dashboard/home.html", ctx).await?;
    Ok(page.into_response())
}

async fn profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
) -> AppResult<Response> {
    let viewer = Viewer::signed_in(&state, principal).await;
    let page = render(
        &state,
        &session,
        &viewer,
        "dashboard/profile.html",
        context! { uploads_enabled => state.images.is_some() },
    )
    .await?;
    Ok(page.into_response())
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    mut auth_session: AuthSession,
    session: Session,
    multipart: Multipart,
) -> Response {
    let back = Redirect::to("/dashboard/profile");

    let mut form = match FormFields::read(multipart, "image").await {
        Ok(form) => form,
        Err(e) => {
            flash::error(&session, e.user_message()).await;
            return back.into_response();
        }
    };
    let photo = match resolve_image(
        state.images.as_ref(),
        &mut form,
        "photoUrl",
        principal.photo_url.as_deref(),
    )
    .await
    {
        Ok(photo) => photo.unwrap_or_default(),
        Err(e) => {
            flash::error(&session, e.user_message()).await;
            return back.into_response();
        }
    };

    match state
        .identity
        .update_profile(&principal.uid, form.text("name"), &photo)
        .await
    {
        Ok(update) => {
            if let Err(e) = auth_session.login(&update.principal).await {
                warn!("could not store updated session for {}: {}", principal.email, e);
            }
            if update.backend_synced {
                flash::success(&session, "Profile updated successfully on server!").await;
            } else {
                flash::error(&session, "Backend update failed!").await;
            }
        }
        Err(e) => flash::error(&session, e.user_message()).await,
    }
    back.into_response()
}
