use axum::{
    Extension, Form, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_login::tower_sessions::Session;
use minijinja::context;
use serde::Deserialize;
use tracing::{info, warn};

use super::{Viewer, manager::SearchQuery, matches_search, render};
use crate::{
    AppState,
    access::Role,
    api::{club::ClubStatus, user::UserRecord},
    auth::Principal,
    cache::keys,
    error::AppResult,
    flash,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/manage-user", get(manage_users))
        .route("/dashboard/manage-user/{id}/role", post(change_role))
        .route("/dashboard/admin/manage-club", get(manage_clubs))
        .route("/dashboard/admin/manage-club/{id}/status", post(change_status))
        .route("/dashboard/admin/payments", get(payments))
}

#[derive(Debug, Deserialize)]
pub struct RoleForm {
    role: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    status: String,
}

/// Admins may change anyone's role except their own.
fn may_change_role(actor: &Principal, target: &UserRecord) -> bool {
    !actor.email.eq_ignore_ascii_case(&target.email)
}

async fn manage_users(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
    Query(query): Query<SearchQuery>,
) -> AppResult<Response> {
    let users: Vec<_> = state
        .api
        .users(&principal.id_token)
        .await?
        .into_iter()
        .filter(|user| {
            matches_search(
                &query.search,
                &[Some(user.name.as_str()), Some(user.email.as_str())],
            )
        })
        .collect();
    let viewer = Viewer::signed_in(&state, principal).await;
    let page = render(
        &state,
        &session,
        &viewer,
        "dashboard/manage_users.html",
        context! {
            users => users,
            search => query.search,
            roles => [Role::Member, Role::Manager, Role::Admin],
        },
    )
    .await?;
    Ok(page.into_response())
}

async fn change_role(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
    Path(id): Path<String>,
    Form(form): Form<RoleForm>,
) -> Redirect {
    let back = Redirect::to("/dashboard/manage-user");
    let Ok(role) = form.role.parse::<Role>() else {
        flash::error(&session, "Unknown role").await;
        return back;
    };

    let target = match state.api.users(&principal.id_token).await {
        Ok(users) => users.into_iter().find(|user| user.id == id),
        Err(e) => {
            warn!("loading users failed: {}", e);
            flash::error(&session, "Failed to update role").await;
            return back;
        }
    };
    let Some(target) = target else {
        flash::error(&session, "User not found").await;
        return back;
    };
    if !may_change_role(&principal, &target) {
        flash::error(&session, "You cannot change your own role").await;
        return back;
    }

    match state.api.set_user_role(&principal.id_token, &id, role).await {
        Ok(()) => {
            info!("{} made {} a {}", principal.email, target.email, role);
            state.roles.invalidate(&target.email).await;
            flash::success(&session, "Role updated successfully!").await;
        }
        Err(e) => {
            warn!("role change for {} failed: {}", target.email, e);
            flash::error(&session, "Failed to update role").await;
        }
    }
    back
}

async fn manage_clubs(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
    Query(query): Query<SearchQuery>,
) -> AppResult<Response> {
    let clubs: Vec<_> = state
        .api
        .admin_clubs(&principal.id_token)
        .await?
        .into_iter()
        .filter(|club| {
            matches_search(
                &query.search,
                &[
                    Some(club.club_name.as_str()),
                    Some(club.manager_email.as_str()),
                    Some(club.status.as_str()),
                ],
            )
        })
        .collect();
    let viewer = Viewer::signed_in(&state, principal).await;
    let page = render(
        &state,
        &session,
        &viewer,
        "dashboard/admin_clubs.html",
        context! { clubs => clubs, search => query.search },
    )
    .await?;
    Ok(page.into_response())
}

async fn change_status(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
    Path(id): Path<String>,
    Form(form): Form<StatusForm>,
) -> Redirect {
    let result = match form.status.parse::<ClubStatus>() {
        Ok(status) => state
            .api
            .set_club_status(&principal.id_token, &id, status)
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => {
            state.cache.invalidate_prefix(keys::CLUBS).await;
            state.cache.invalidate(&keys::club(&id)).await;
            flash::success(&session, "Status updated!").await;
        }
        Err(e) => {
            warn!("status change for club {} failed: {}", id, e);
            flash::error(&session, "Failed to update status").await;
        }
    }
    Redirect::to("/dashboard/admin/manage-club")
}

async fn payments(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    session: Session,
) -> AppResult<Response> {
    let payments = state.api.admin_payments(&principal.id_token).await?;
    let total: f64 = payments.iter().map(|p| p.amount).sum();
    let viewer = Viewer::signed_in(&state, principal).await;
    let page = render(
        &state,
        &session,
        &viewer,
        "dashboard/payments.html",
        context! { payments => payments, total => total },
    )
    .await?;
    Ok(page.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn admin() -> Principal {
        Principal {
            uid: "uid-admin".into(),
            email: "Admin@example.com".into(),
            display_name: None,
            photo_url: None,
            id_token: "token".into(),
            refresh_token: "refresh".into(),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    fn user(email: &str) -> UserRecord {
        UserRecord {
            id: "u1".into(),
            name: "Someone".into(),
            email: email.into(),
            image: None,
            role: Role::Admin,
            created_at: None,
        }
    }

    #[test]
    fn admins_cannot_change_their_own_role() {
        assert!(!may_change_role(&admin(), &user("admin@example.com")));
        assert!(may_change_role(&admin(), &user("member@example.com")));
    }
}
