use axum::{
    Form, Router,
    extract::{Multipart, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_login::tower_sessions::Session;
use minijinja::context;
use oauth2::CsrfToken;
use serde::Deserialize;
use tracing::warn;

use super::{
    context::NewAccount,
    user::{AuthSession, Credentials},
};
use crate::{
    AppState,
    access::guard::{login_redirect, safe_next},
    error::AppResult,
    flash,
    media::{FormFields, resolve_image},
    routes::{Viewer, render},
};

pub const NEXT_URL_KEY: &str = "auth.next-url";
pub const CSRF_STATE_KEY: &str = "oauth.csrf-state";

#[derive(Debug, Clone, Deserialize)]
pub struct AuthzResp {
    code: String,
    state: CsrfToken,
}

// This allows us to extract the "next" field from the query string. We use this
// to redirect after log in.
#[derive(Debug, Deserialize)]
pub struct NextUrl {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
    next: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(self::get::login).post(self::post::login))
        .route("/register", get(self::get::register).post(self::post::register))
        .route("/logout", get(self::get::logout).post(self::get::logout))
        .route("/auth/google", get(self::get::google))
        .route("/auth/complete", get(self::get::callback))
}

fn back_to_login(next: Option<&str>) -> Response {
    match safe_next(next) {
        Some(next) => Redirect::to(&login_redirect(&next)).into_response(),
        None => Redirect::to("/login").into_response(),
    }
}

mod post {
    use super::*;

    pub async fn login(
        mut auth_session: AuthSession,
        session: Session,
        Form(LoginForm {
            email,
            password,
            next,
        }): Form<LoginForm>,
    ) -> Response {
        let creds = Credentials::Password { email, password };
        let principal = match auth_session.authenticate(creds).await {
            Ok(Some(principal)) => principal,
            Ok(None) => {
                flash::error(&session, "Incorrect email or password.").await;
                return back_to_login(next.as_deref());
            }
            Err(axum_login::Error::Backend(e)) => {
                flash::error(&session, e.user_message()).await;
                return back_to_login(next.as_deref());
            }
            Err(e) => {
                warn!("session error during login: {}", e);
                flash::error(&session, "Something went wrong. Please try again.").await;
                return back_to_login(next.as_deref());
            }
        };

        if let Err(e) = auth_session.login(&principal).await {
            warn!("could not start session for {}: {}", principal.email, e);
            flash::error(&session, "Something went wrong. Please try again.").await;
            return back_to_login(next.as_deref());
        }

        flash::success(&session, "Login successful!").await;
        let target = safe_next(next.as_deref()).unwrap_or_else(|| "/".to_string());
        Redirect::to(&target).into_response()
    }

    pub async fn register(
        State(state): State<AppState>,
        mut auth_session: AuthSession,
        session: Session,
        multipart: Multipart,
    ) -> Response {
        let mut form = match FormFields::read(multipart, "image").await {
            Ok(form) => form,
            Err(e) => {
                flash::error(&session, e.user_message()).await;
                return Redirect::to("/register").into_response();
            }
        };

        let photo_url = match resolve_image(state.images.as_ref(), &mut form, "photoUrl", None).await {
            Ok(photo_url) => photo_url,
            Err(e) => {
                flash::error(&session, e.user_message()).await;
                return Redirect::to("/register").into_response();
            }
        };

        let account = NewAccount {
            name: form.text("name").to_string(),
            email: form.text("email").to_string(),
            password: form.text("password").to_string(),
            photo_url,
        };
        let principal = match state.identity.sign_up(account).await {
            Ok(principal) => principal,
            Err(e) => {
                warn!("sign-up failed: {}", e);
                flash::error(&session, e.user_message()).await;
                return Redirect::to("/register").into_response();
            }
        };

        if let Err(e) = auth_session.login(&principal).await {
            warn!("could not start session for {}: {}", principal.email, e);
            flash::error(&session, "Signup failed").await;
            return Redirect::to("/login").into_response();
        }

        flash::success(&session, "Signup successful!").await;
        Redirect::to("/").into_response()
    }
}

mod get {
    use super::*;

    pub async fn login(
        State(state): State<AppState>,
        mut auth_session: AuthSession,
        session: Session,
        Query(NextUrl { next }): Query<NextUrl>,
    ) -> AppResult<Response> {
        let viewer = Viewer::load(&state, &mut auth_session).await;
        let next = safe_next(next.as_deref());
        if viewer.principal.is_some() {
            return Ok(Redirect::to(next.as_deref().unwrap_or("/")).into_response());
        }
        let page = render(&state, &session, &viewer, "login.html", context! { next => next }).await?;
        Ok(page.into_response())
    }

    pub async fn register(
        State(state): State<AppState>,
        mut auth_session: AuthSession,
        session: Session,
    ) -> AppResult<Response> {
        let viewer = Viewer::load(&state, &mut auth_session).await;
        if viewer.principal.is_some() {
            return Ok(Redirect::to("/").into_response());
        }
        let page = render(
            &state,
            &session,
            &viewer,
            "register.html",
            context! { uploads_enabled => state.images.is_some() },
        )
        .await?;
        Ok(page.into_response())
    }

    pub async fn logout(
        State(state): State<AppState>,
        mut auth_session: AuthSession,
        session: Session,
    ) -> Response {
        if let Some(principal) = auth_session.user.clone() {
            state.identity.sign_out(&principal.uid).await;
        }
        match auth_session.logout().await {
            Ok(_) => {
                flash::success(&session, "Logged out successfully").await;
                Redirect::to("/").into_response()
            }
            Err(e) => {
                warn!("logout failed: {}", e);
                Redirect::to("/").into_response()
            }
        }
    }

    pub async fn google(
        auth_session: AuthSession,
        session: Session,
        Query(NextUrl { next }): Query<NextUrl>,
    ) -> Response {
        let Some((auth_url, csrf_state)) = auth_session.backend.authorize_url() else {
            flash::error(&session, "Google sign-in is not available.").await;
            return back_to_login(next.as_deref());
        };

        if let Err(e) = session.insert(CSRF_STATE_KEY, csrf_state.secret()).await {
            warn!("could not store oauth state: {}", e);
            flash::error(&session, "Google sign-in failed").await;
            return back_to_login(next.as_deref());
        }
        if let Err(e) = session.insert(NEXT_URL_KEY, safe_next(next.as_deref())).await {
            warn!("could not store next url: {}", e);
        }

        Redirect::to(auth_url.as_str()).into_response()
    }

    pub async fn callback(
        mut auth_session: AuthSession,
        session: Session,
        Query(AuthzResp {
            code,
            state: new_state,
        }): Query<AuthzResp>,
    ) -> Response {
        let Ok(Some(old_state)) = session.remove::<CsrfToken>(CSRF_STATE_KEY).await else {
            flash::error(&session, "Google sign-in failed").await;
            return Redirect::to("/login").into_response();
        };

        let creds = Credentials::Google {
            code,
            old_state,
            new_state,
        };

        let principal = match auth_session.authenticate(creds).await {
            Ok(Some(principal)) => principal,
            Ok(None) => {
                flash::error(&session, "Google sign-in failed").await;
                return Redirect::to("/login").into_response();
            }
            Err(axum_login::Error::Backend(e)) => {
                warn!("google sign-in failed: {}", e);
                flash::error(&session, e.user_message()).await;
                return Redirect::to("/login").into_response();
            }
            Err(e) => {
                warn!("session error during google sign-in: {}", e);
                flash::error(&session, "Google sign-in failed").await;
                return Redirect::to("/login").into_response();
            }
        };

        if auth_session.login(&principal).await.is_err() {
            flash::error(&session, "Google sign-in failed").await;
            return Redirect::to("/login").into_response();
        }

        flash::success(&session, "Signed in with Google!").await;
        match session.remove::<Option<String>>(NEXT_URL_KEY).await {
            Ok(Some(Some(next))) => Redirect::to(&next).into_response(),
            _ => Redirect::to("/").into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_login_keeps_the_return_location() {
        let response = back_to_login(Some("/dashboard/my-events"));
        assert_eq!(
            response.headers()["location"],
            "/login?next=%2Fdashboard%2Fmy%2Devents"
        );

        let response = back_to_login(Some("https://elsewhere.example"));
        assert_eq!(response.headers()["location"], "/login");
    }
}
