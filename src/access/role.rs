use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, warn};

use super::{Role, RoleState};
use crate::{
    api::{ApiClient, ApiError},
    auth::Principal,
};

/// Memoized `email -> role` lookup.
///
/// Concurrent requests for the same email share one backend call, and a call
/// outlives the request that started it. Entries are
/// dropped through [`RoleResolver::invalidate`] whenever the principal behind
/// an email changes.
#[derive(Debug)]
pub struct RoleResolver {
    api: ApiClient,
    slots: RwLock<HashMap<String, Arc<OnceCell<Role>>>>,
    wait: Duration,
}

impl RoleResolver {
    pub fn new(api: ApiClient, wait: Duration) -> Self {
        Self {
            api,
            slots: RwLock::new(HashMap::new()),
            wait,
        }
    }

    pub async fn resolve(&self, principal: &Principal) -> RoleState {
        let slot = self.slot(&principal.email).await;
        if let Some(role) = slot.get() {
            return RoleState::Resolved(*role);
        }

        // Spawned so the lookup outlives this request's wait.
        let api = self.api.clone();
        let token = principal.id_token.clone();
        let lookup = tokio::spawn(async move {
            let role = slot.get_or_try_init(|| api.role(&token)).await?;
            Ok::<_, ApiError>(*role)
        });
        match tokio::time::timeout(self.wait, lookup).await {
            Ok(Ok(Ok(role))) => {
                debug!("resolved role {} for {}", role, principal.email);
                RoleState::Resolved(role)
            }
            Ok(Ok(Err(e))) => {
                warn!("role lookup for {} failed: {}", principal.email, e);
                RoleState::Unavailable
            }
            Ok(Err(e)) => {
                warn!("role lookup task for {} ended early: {}", principal.email, e);
                RoleState::Unavailable
            }
            Err(_) => {
                debug!("role lookup for {} still pending", principal.email);
                RoleState::Resolving
            }
        }
    }

    pub async fn resolve_for(&self, principal: Option<&Principal>) -> RoleState {
        match principal {
            Some(principal) => self.resolve(principal).await,
            None => RoleState::Unavailable,
        }
    }

    pub async fn invalidate(&self, email: &str) {
        if self.slots.write().await.remove(email).is_some() {
            debug!("dropped cached role for {}", email);
        }
    }

    async fn slot(&self, email: &str) -> Arc<OnceCell<Role>> {
        if let Some(slot) = self.slots.read().await.get(email) {
            return slot.clone();
        }
        self.slots
            .write()
            .await
            .entry(email.to_string())
            .or_default()
            .clone()
    }
}
