#![allow(dead_code)]

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use clubsphere::{
    access::RedirectPolicy,
    config::{Config, IdentityConfig},
    create_router,
};
use reqwest::redirect::Policy;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use axum_login::tower_sessions::MemoryStore;

/// What the fake backend and identity provider answer with.
#[derive(Debug, Clone)]
pub struct Script {
    pub roles: HashMap<String, String>,
    pub role_delay: Duration,
    pub clubs: HashMap<String, Value>,
    pub events: HashMap<String, Value>,
    pub join_responses: HashMap<String, Value>,
    pub memberships: HashMap<String, bool>,
    pub registrations: HashMap<String, String>,
    pub confirm_status: StatusCode,
}

impl Default for Script {
    fn default() -> Self {
        let mut clubs = HashMap::new();
        clubs.insert(
            "c1".to_string(),
            json!({ "_id": "c1", "clubName": "Shutterbugs", "category": "Photography", "membershipFee": 0 }),
        );
        clubs.insert(
            "c2".to_string(),
            json!({ "_id": "c2", "clubName": "Trail Runners", "category": "Sports", "membershipFee": 20 }),
        );
        let mut events = HashMap::new();
        events.insert(
            "e1".to_string(),
            json!({
                "_id": "e1",
                "clubId": "c1",
                "title": "Night walk",
                "eventDate": "2030-05-01T18:00:00Z",
                "isPaid": true,
                "eventFee": 10
            }),
        );
        Self {
            roles: HashMap::new(),
            role_delay: Duration::ZERO,
            clubs,
            events,
            join_responses: HashMap::new(),
            memberships: HashMap::new(),
            registrations: HashMap::new(),
            confirm_status: StatusCode::OK,
        }
    }
}

#[derive(Debug, Default)]
pub struct Upstream {
    calls: Mutex<Vec<String>>,
    pub script: Mutex<Script>,
}

impl Upstream {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn set_role(&self, email: &str, role: &str) {
        self.script
            .lock()
            .unwrap()
            .roles
            .insert(email.to_string(), role.to_string());
    }
}

pub struct TestApp {
    pub url: String,
    pub client: reqwest::Client,
    pub upstream: Arc<Upstream>,
}

impl TestApp {
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.url, path))
            .send()
            .await
            .unwrap()
    }

    pub async fn post(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.url, path))
            .form(form)
            .send()
            .await
            .unwrap()
    }

    /// Signs in with a password and drains the welcome notification.
    pub async fn login(&self, email: &str, role: &str) {
        self.upstream.set_role(email, role);
        let response = self
            .post("/login", &[("email", email), ("password", "Secret123")])
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "login should redirect");
        let page = self.get("/about").await.text().await.unwrap();
        assert!(page.contains("Login successful!"));
    }

    pub async fn logout(&self) {
        let response = self.post("/logout", &[]).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
}

pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .map(|value| value.to_str().unwrap().to_string())
        .unwrap_or_default()
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(RedirectPolicy::Login, Duration::from_secs(2)).await
}

pub async fn spawn_app_with(guard_redirect: RedirectPolicy, role_wait: Duration) -> TestApp {
    let upstream = Arc::new(Upstream::default());
    let upstream_addr = serve(
        Router::new()
            .fallback(handle)
            .with_state(upstream.clone()),
    )
    .await;
    let base = format!("http://{upstream_addr}");

    let config = Config {
        bind_addr: "127.0.0.1:0".into(),
        rust_log: "warn".into(),
        api_url: format!("{base}/api"),
        identity: IdentityConfig {
            url: format!("{base}/identity"),
            token_url: format!("{base}/token"),
            api_key: "test-key".into(),
        },
        google: None,
        upload: None,
        mail: None,
        guard_redirect,
        role_wait,
        cache_ttl: Duration::from_secs(60),
        templates_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/templates").into(),
        static_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/static").into(),
        secure_cookies: false,
    };
    let app = create_router(&config, MemoryStore::default()).await.unwrap();
    let addr = serve(app).await;

    let client = reqwest::Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()
        .unwrap();

    TestApp {
        url: format!("http://{addr}"),
        client,
        upstream,
    }
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn email_from(headers: &HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer token-"))
        .unwrap_or_default()
        .to_string()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "Not found" }))).into_response()
}

/// One handler for every upstream path, so each call lands in the log.
async fn handle(
    State(upstream): State<Arc<Upstream>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    upstream
        .calls
        .lock()
        .unwrap()
        .push(format!("{method} {path}"));
    let script = upstream.script.lock().unwrap().clone();
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    match (method.as_str(), segments.as_slice()) {
        ("POST", ["identity", "accounts:signInWithPassword"]) => {
            let body: Value = serde_json::from_slice(&body).unwrap_or_default();
            let email = body["email"].as_str().unwrap_or_default();
            Json(json!({
                "localId": format!("uid-{email}"),
                "email": email,
                "idToken": format!("token-{email}"),
                "refreshToken": format!("refresh-{email}"),
                "expiresIn": "3600"
            }))
            .into_response()
        }
        ("POST", ["identity", "accounts:lookup"]) => Json(json!({
            "users": [{ "localId": "uid", "email": "", "displayName": "Test User" }]
        }))
        .into_response(),
        ("GET", ["api", "user", "role"]) => {
            tokio::time::sleep(script.role_delay).await;
            let email = email_from(&headers);
            let role = script.roles.get(&email).cloned().unwrap_or_else(|| "member".into());
            Json(json!({ "role": role })).into_response()
        }
        ("GET", ["api", "clubs", "featured"]) | ("GET", ["api", "clubs", "approved"]) => {
            Json(script.clubs.values().cloned().collect::<Vec<_>>()).into_response()
        }
        ("GET", ["api", "club", id]) => match script.clubs.get(*id) {
            Some(club) => Json(club.clone()).into_response(),
            None => not_found(),
        },
        ("GET", ["api", "event", id]) => match script.events.get(*id) {
            Some(event) => Json(event.clone()).into_response(),
            None => not_found(),
        },
        ("GET", ["api", "clubs", id, "membership-status"]) => {
            let active = script.memberships.get(*id).copied().unwrap_or(false);
            Json(json!({ "hasActive": active })).into_response()
        }
        ("GET", ["api", "events", id, "registration-status"]) => {
            let status = script.registrations.get(*id).cloned().unwrap_or_else(|| "none".into());
            Json(json!({ "status": status })).into_response()
        }
        ("POST", ["api", "clubs", id, "join"]) | ("POST", ["api", "events", id, "register"]) => {
            let response = script
                .join_responses
                .get(*id)
                .cloned()
                .unwrap_or_else(|| json!({ "free": true }));
            Json(response).into_response()
        }
        ("POST", ["api", "payment-success"]) | ("POST", ["api", "event-payment-success"]) => {
            (script.confirm_status, Json(json!({ "success": script.confirm_status.is_success() })))
                .into_response()
        }
        ("GET", ["api", "member", "overview"]) => Json(json!({
            "totalClubsJoined": 1,
            "totalEventsRegistered": 0,
            "upcomingEvents": []
        }))
        .into_response(),
        ("GET", ["api", "users"]) => Json(json!([])).into_response(),
        ("GET", ["api", "manager", "clubs"]) | ("GET", ["api", "admin", "clubs"]) => {
            Json(script.clubs.values().cloned().collect::<Vec<_>>()).into_response()
        }
        _ => not_found(),
    }
}
