use axum::response::Html;
use axum_login::tower_sessions::Session;
use minijinja::{Value, context};

use crate::{
    AppState,
    access::{Role, RoleState, middleware::resolve_identity},
    auth::{Principal, user::AuthSession},
    error::AppResult,
    flash,
};

pub mod admin;
pub mod club;
pub mod dashboard;
pub mod event;
pub mod forms;
pub mod manager;
pub mod member;
pub mod payment;
pub mod public;

/// Who is looking at a page, as far as rendering cares.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub principal: Option<Principal>,
    pub role: RoleState,
}

impl Viewer {
    pub async fn load(state: &AppState, auth_session: &mut AuthSession) -> Self {
        let identity = resolve_identity(auth_session).await;
        let principal = identity.principal().cloned();
        let role = state.roles.resolve_for(principal.as_ref()).await;
        Self { principal, role }
    }

    /// For handlers behind a guard, which already hold the principal.
    pub async fn signed_in(state: &AppState, principal: Principal) -> Self {
        let role = state.roles.resolve(&principal).await;
        Self {
            principal: Some(principal),
            role,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.role.role()
    }
}

pub async fn render(
    state: &AppState,
    session: &Session,
    viewer: &Viewer,
    template: &str,
    ctx: Value,
) -> AppResult<Html<String>> {
    let flashes = flash::take(session).await;
    let tmpl = state.templates.get_template(template)?;
    let html = tmpl.render(context! {
        user => viewer.principal.as_ref().map(Principal::view),
        role => viewer.role(),
        flashes => flashes,
        google_enabled => state.google_enabled,
        ..ctx
    })?;
    Ok(Html(html))
}

/// Case-insensitive substring filter used by the dashboard search boxes.
pub fn matches_search(search: &str, fields: &[Option<&str>]) -> bool {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    fields
        .iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_matches_any_field() {
        assert!(matches_search("", &[None]));
        assert!(matches_search("PHOTO", &[Some("Shutterbugs"), Some("photo club")]));
        assert!(!matches_search("chess", &[Some("Shutterbugs"), None]));
    }
}
