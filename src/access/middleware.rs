use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::Utc;
use minijinja::context;
use tracing::{debug, warn};

use super::{Access, Guard, IdentityState, RoleState};
use crate::{AppState, auth::user::AuthSession};

/// Works out who is behind the session, refreshing an expired ID token.
///
/// An identity provider that cannot be reached leaves the identity
/// `Resolving`; a refresh token it rejects ends the session.
pub async fn resolve_identity(auth_session: &mut AuthSession) -> IdentityState {
    let Some(principal) = auth_session.user.clone() else {
        return IdentityState::Anonymous;
    };
    if !principal.token_expired(Utc::now()) {
        return IdentityState::Authenticated(principal);
    }

    let context = auth_session.backend.context.clone();
    match context.refresh(&principal.uid).await {
        Ok(fresh) => {
            // The session hash follows the refresh token, so store it again.
            if let Err(e) = auth_session.login(&fresh).await {
                warn!("could not store refreshed session for {}: {}", fresh.email, e);
            }
            IdentityState::Authenticated(fresh)
        }
        Err(e) if e.is_transient() => {
            warn!("token refresh for {} deferred: {}", principal.email, e);
            IdentityState::Resolving
        }
        Err(e) => {
            warn!("token refresh for {} rejected: {}", principal.email, e);
            context.sign_out(&principal.uid).await;
            if let Err(e) = auth_session.logout().await {
                warn!("could not end session: {}", e);
            }
            IdentityState::Anonymous
        }
    }
}

pub async fn require_login(
    State(state): State<AppState>,
    auth_session: AuthSession,
    request: Request,
    next: Next,
) -> Response {
    enforce(state, auth_session, Guard::authenticated(), request, next).await
}

pub async fn require_manager(
    State(state): State<AppState>,
    auth_session: AuthSession,
    request: Request,
    next: Next,
) -> Response {
    let guard = Guard::manager(state.guard_redirect);
    enforce(state, auth_session, guard, request, next).await
}

pub async fn require_admin(
    State(state): State<AppState>,
    auth_session: AuthSession,
    request: Request,
    next: Next,
) -> Response {
    let guard = Guard::admin(state.guard_redirect);
    enforce(state, auth_session, guard, request, next).await
}

async fn enforce(
    state: AppState,
    mut auth_session: AuthSession,
    guard: Guard,
    mut request: Request,
    next: Next,
) -> Response {
    let requested = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let identity = resolve_identity(&mut auth_session).await;
    let role = match (guard.required_role(), identity.principal()) {
        (Some(_), Some(principal)) => state.roles.resolve(principal).await,
        _ => RoleState::Unavailable,
    };

    match guard.decide(&identity, role, &requested) {
        Access::Granted => {
            if let Some(principal) = identity.principal() {
                request.extensions_mut().insert(principal.clone());
            }
            if let Some(role) = role.role() {
                request.extensions_mut().insert(role);
            }
            next.run(request).await
        }
        Access::Loading => {
            debug!("holding {} while identity or role resolves", requested);
            loading_page(&state, &requested).into_response()
        }
        Access::Redirect(location) => {
            debug!("redirecting {} to {}", requested, location);
            Redirect::to(&location).into_response()
        }
    }
}

/// Placeholder that asks the browser to try again shortly.
fn loading_page(state: &AppState, requested: &str) -> Html<String> {
    let rendered = state
        .templates
        .get_template("loading.html")
        .and_then(|tmpl| tmpl.render(context! { requested => requested }));
    match rendered {
        Ok(html) => Html(html),
        Err(e) => {
            warn!("could not render loading page: {}", e);
            Html(r#"<!DOCTYPE html><html><head><meta http-equiv="refresh" content="1"><title>Loading</title></head><body><p>Loading...</p></body></html>"#.to_string())
        }
    }
}
