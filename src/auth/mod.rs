pub mod context;
pub mod principal;
pub mod provider;
pub mod router;
pub mod user;

pub use principal::Principal;
