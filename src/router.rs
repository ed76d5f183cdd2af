use crate::{
    access::{
        RedirectPolicy, RoleResolver,
        middleware::{require_admin, require_login, require_manager},
    },
    api::ApiClient,
    auth::{
        context::IdentityContext,
        provider::IdentityProvider,
        router as auth_router,
        user::{Backend, GoogleSignIn},
    },
    cache::QueryCache,
    config::Config,
    join::JoinService,
    mail::Mailer,
    media::ImageHost,
    routes,
    util::{asset_loader::AssetLoader, filters},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::get_service,
};
use axum_login::{
    AuthManagerLayerBuilder,
    tower_sessions::{
        Expiry, MemoryStore, SessionManagerLayer,
        cookie::{SameSite, time},
    },
};
use minijinja::Environment;
use oauth2::{AuthUrl, EndpointNotSet, EndpointSet, TokenUrl, basic::BasicClient};
use std::sync::Arc;
use tokio::signal;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;

pub type OauthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

// Room for a 3MB image plus the rest of the form; larger bodies are cut off
// before the handler can answer with a friendly message.
const BODY_LIMIT: usize = 8 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub api: ApiClient,
    pub identity: Arc<IdentityContext>,
    pub roles: Arc<RoleResolver>,
    pub cache: Arc<QueryCache>,
    pub joins: Arc<JoinService>,
    pub images: Option<ImageHost>,
    pub mailer: Option<Mailer>,
    pub templates: Arc<Environment<'static>>,
    pub guard_redirect: RedirectPolicy,
    pub google_enabled: bool,
}

pub async fn create_router(config: &Config, session_store: MemoryStore) -> anyhow::Result<Router> {
    let templates = setup_templates(config);

    let api = ApiClient::new(config.api_url.clone());
    let roles = Arc::new(RoleResolver::new(api.clone(), config.role_wait));
    let identity = Arc::new(IdentityContext::new(
        IdentityProvider::new(&config.identity),
        api.clone(),
        roles.clone(),
    ));
    let cache = Arc::new(QueryCache::new(config.cache_ttl));
    let joins = Arc::new(JoinService::new(api.clone(), cache.clone()));

    let google = match &config.google {
        Some(google) => Some(GoogleSignIn {
            client: BasicClient::new(google.client_id.clone())
                .set_client_secret(google.client_secret.clone())
                .set_auth_uri(AuthUrl::new(GOOGLE_AUTH_URL.to_string())?)
                .set_token_uri(TokenUrl::new(GOOGLE_TOKEN_URL.to_string())?)
                .set_redirect_uri(google.redirect_url.clone()),
            redirect_url: google.redirect_url.url().as_str().to_string(),
        }),
        None => None,
    };

    let state = AppState {
        api,
        identity: identity.clone(),
        roles,
        cache,
        joins,
        images: config.upload.as_ref().map(ImageHost::new),
        mailer: config.mail.clone().map(Mailer::new),
        templates: Arc::new(templates),
        guard_redirect: config.guard_redirect,
        google_enabled: google.is_some(),
    };

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(config.secure_cookies)
        .with_same_site(SameSite::Lax) // Ensure we send the cookie from the OAuth redirect.
        .with_expiry(Expiry::OnInactivity(time::Duration::days(1)));

    // Auth service.
    //
    // This combines the session layer with our backend to establish the auth
    // service which will provide the auth session as a request extension.
    let backend = Backend::new(identity, google);
    let auth_layer = AuthManagerLayerBuilder::new(backend, session_layer).build();

    let signed_in = routes::dashboard::routes()
        .merge(routes::member::routes())
        .route_layer(from_fn_with_state(state.clone(), require_login));
    let manager = routes::manager::routes()
        .route_layer(from_fn_with_state(state.clone(), require_manager));
    let admin = routes::admin::routes()
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    let app = Router::new()
        .merge(routes::public::routes())
        .merge(routes::club::routes())
        .merge(routes::event::routes())
        .merge(routes::payment::routes())
        .merge(auth_router::router())
        .merge(signed_in)
        .merge(manager)
        .merge(admin)
        .with_state(state)
        .nest_service("/static", get_service(ServeDir::new(&config.static_dir)))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(auth_layer);

    info!(
        "router ready (guard redirect: {:?}, google sign-in: {})",
        config.guard_redirect,
        config.google.is_some()
    );
    Ok(app)
}

fn setup_templates(config: &Config) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_loader(minijinja::path_loader(&config.templates_dir));
    AssetLoader::new(&config.static_dir).register(&mut env);
    filters::register(&mut env);
    env
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutting down");
}
