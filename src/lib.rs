pub mod access;
pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod flash;
pub mod join;
pub mod mail;
pub mod media;
pub mod router;
pub mod routes;
pub mod util;

pub use router::{AppState, OauthClient, create_router, shutdown_signal};
