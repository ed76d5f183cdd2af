//! Route-guard decisions.
//!
//! A guard looks at where identity resolution and role resolution stand and
//! answers with exactly one of: keep waiting, let the request through, or
//! send the visitor elsewhere. Nothing here performs I/O; the axum side lives
//! in [`super::middleware`].

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use std::str::FromStr;

use super::Role;
use crate::auth::Principal;

pub const LOGIN_PATH: &str = "/login";
pub const ROOT_PATH: &str = "/";

/// Where a role guard sends a principal that lacks the required role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RedirectPolicy {
    /// Sign-in page, carrying the attempted location as `next`.
    #[default]
    Login,
    /// Site root.
    Root,
}

impl FromStr for RedirectPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "login" => Ok(RedirectPolicy::Login),
            "root" => Ok(RedirectPolicy::Root),
            other => Err(format!(
                "GUARD_REDIRECT must be \"login\" or \"root\", got {other:?}"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub enum IdentityState {
    /// A session exists but its principal could not be confirmed yet.
    Resolving,
    Anonymous,
    Authenticated(Principal),
}

impl IdentityState {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            IdentityState::Authenticated(principal) => Some(principal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleState {
    Resolving,
    Resolved(Role),
    Unavailable,
}

impl RoleState {
    pub fn role(&self) -> Option<Role> {
        match self {
            RoleState::Resolved(role) => Some(*role),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Loading,
    Granted,
    Redirect(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requirement {
    Authenticated,
    Role(Role),
}

#[derive(Debug, Clone, Copy)]
pub struct Guard {
    requirement: Requirement,
    policy: RedirectPolicy,
}

impl Guard {
    pub fn authenticated() -> Self {
        Self {
            requirement: Requirement::Authenticated,
            policy: RedirectPolicy::Login,
        }
    }

    pub fn role(role: Role, policy: RedirectPolicy) -> Self {
        Self {
            requirement: Requirement::Role(role),
            policy,
        }
    }

    pub fn manager(policy: RedirectPolicy) -> Self {
        Self::role(Role::Manager, policy)
    }

    pub fn admin(policy: RedirectPolicy) -> Self {
        Self::role(Role::Admin, policy)
    }

    pub fn required_role(&self) -> Option<Role> {
        match self.requirement {
            Requirement::Authenticated => None,
            Requirement::Role(role) => Some(role),
        }
    }

    /// `requested` is the path and query the visitor asked for.
    pub fn decide(&self, identity: &IdentityState, role: RoleState, requested: &str) -> Access {
        match (self.requirement, identity) {
            (_, IdentityState::Resolving) => Access::Loading,
            (Requirement::Authenticated, IdentityState::Authenticated(_)) => Access::Granted,
            (Requirement::Authenticated, IdentityState::Anonymous) => {
                Access::Redirect(login_redirect(requested))
            }
            (Requirement::Role(_), IdentityState::Anonymous) => self.refuse(requested),
            (Requirement::Role(required), IdentityState::Authenticated(_)) => match role {
                RoleState::Resolving => Access::Loading,
                RoleState::Resolved(actual) if actual == required => Access::Granted,
                RoleState::Resolved(_) | RoleState::Unavailable => self.refuse(requested),
            },
        }
    }

    fn refuse(&self, requested: &str) -> Access {
        match self.policy {
            RedirectPolicy::Login => Access::Redirect(login_redirect(requested)),
            RedirectPolicy::Root => Access::Redirect(ROOT_PATH.to_string()),
        }
    }
}

/// Sign-in location that returns the visitor to `requested` afterwards.
pub fn login_redirect(requested: &str) -> String {
    if requested.is_empty() || requested == ROOT_PATH {
        return LOGIN_PATH.to_string();
    }
    format!(
        "{}?next={}",
        LOGIN_PATH,
        utf8_percent_encode(requested, NON_ALPHANUMERIC)
    )
}

/// Only same-site paths are accepted as post-login destinations.
pub fn safe_next(next: Option<&str>) -> Option<String> {
    let next = next?.trim();
    let local = next.starts_with('/') && !next.starts_with("//") && !next.contains('\\');
    local.then(|| next.to_string())
}
