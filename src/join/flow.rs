use std::sync::Arc;
use tracing::{info, warn};

use super::{JoinError, JoinOutcome, PendingActions, Refusal, Target};
use crate::{
    access::{Role, RoleState},
    api::{
        ApiClient, ApiError,
        event::Event,
        membership::{JoinResponse, RegistrationStatus},
    },
    auth::Principal,
    cache::{QueryCache, keys},
};

/// Runs join and register requests against the backend.
///
/// Preconditions are checked before anything is sent, a principal can only
/// have one request out per target, and successful free joins drop every
/// cached view that showed the old enrollment.
#[derive(Debug)]
pub struct JoinService {
    api: ApiClient,
    cache: Arc<QueryCache>,
    pending: PendingActions,
}

impl JoinService {
    pub fn new(api: ApiClient, cache: Arc<QueryCache>) -> Self {
        Self {
            api,
            cache,
            pending: PendingActions::new(),
        }
    }

    #[cfg(test)]
    fn pending(&self) -> &PendingActions {
        &self.pending
    }

    pub async fn has_active_membership(&self, principal: &Principal, club_id: &str) -> Result<bool, ApiError> {
        self.cache
            .get_or_fetch(&keys::membership(&principal.email, club_id), || {
                self.api.has_active_membership(&principal.id_token, club_id)
            })
            .await
    }

    pub async fn registration_status(
        &self,
        principal: &Principal,
        event_id: &str,
    ) -> Result<RegistrationStatus, ApiError> {
        self.cache
            .get_or_fetch(&keys::registration(&principal.email, event_id), || {
                self.api.registration_status(&principal.id_token, event_id)
            })
            .await
    }

    pub async fn join_club(
        &self,
        principal: Option<&Principal>,
        role: RoleState,
        club_id: &str,
    ) -> Result<JoinOutcome, JoinError> {
        let principal = principal.ok_or(Refusal::LoginRequired)?;
        member_only(role, Refusal::ClubMembersOnly)?;

        let target = Target::club(club_id);
        let _ticket = self
            .pending
            .try_begin(&principal.email, &target.key())
            .ok_or(Refusal::InFlight)?;

        let response = self.api.join_club(&principal.id_token, club_id).await;
        self.settle(principal, &target, response).await
    }

    pub async fn event(&self, id: &str) -> Result<Event, ApiError> {
        self.cache
            .get_or_fetch(&keys::event(id), || self.api.event(id))
            .await
    }

    pub async fn register_for_event(
        &self,
        principal: Option<&Principal>,
        role: RoleState,
        event_id: &str,
    ) -> Result<JoinOutcome, JoinError> {
        let principal = principal.ok_or(Refusal::LoginRequired)?;
        member_only(role, Refusal::EventMembersOnly)?;

        let target = Target::event(event_id);
        let _ticket = self
            .pending
            .try_begin(&principal.email, &target.key())
            .ok_or(Refusal::InFlight)?;

        let event = self.event(event_id).await.map_err(|e| failure(&target, e))?;
        let member = self
            .has_active_membership(principal, &event.club_id)
            .await
            .map_err(|e| failure(&target, e))?;
        if !member {
            return Err(Refusal::NotClubMember.into());
        }

        let status = self
            .registration_status(principal, &event.id)
            .await
            .map_err(|e| failure(&target, e))?;
        if status == RegistrationStatus::Registered {
            return Err(Refusal::AlreadyRegistered.into());
        }

        let response = self
            .api
            .register_for_event(&principal.id_token, &event.id)
            .await;
        self.settle(principal, &target, response).await
    }

    async fn settle(
        &self,
        principal: &Principal,
        target: &Target,
        response: Result<JoinResponse, ApiError>,
    ) -> Result<JoinOutcome, JoinError> {
        match response.map_err(|e| failure(target, e))? {
            JoinResponse::Checkout { checkout_url } => {
                info!("{} sent to checkout for {}", principal.email, target.key());
                Ok(JoinOutcome::Checkout { url: checkout_url })
            }
            JoinResponse::Free { free: true, message } => {
                info!("{} enrolled in {}", principal.email, target.key());
                self.invalidate(principal, target).await;
                Ok(JoinOutcome::Joined {
                    message: message
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| target.success_message().to_string()),
                })
            }
            JoinResponse::Free {
                free: false,
                message,
            } => Err(JoinError::Failed {
                message: message.unwrap_or_else(|| target.failure_message().to_string()),
            }),
        }
    }

    async fn invalidate(&self, principal: &Principal, target: &Target) {
        let email = &principal.email;
        match target {
            Target::Club { id } => {
                self.cache.invalidate(&keys::membership(email, id)).await;
                self.cache.invalidate(&keys::club(id)).await;
                self.cache.invalidate_prefix(keys::CLUBS).await;
                self.cache
                    .invalidate_prefix(&format!("memberships:{email}"))
                    .await;
            }
            Target::Event { id } => {
                self.cache.invalidate(&keys::registration(email, id)).await;
                self.cache.invalidate(&keys::event(id)).await;
                self.cache
                    .invalidate_prefix(&format!("registrations:{email}"))
                    .await;
            }
        }
    }
}

/// A role still loading, or one that could not be fetched, is a retry rather
/// than a wrong role.
fn member_only(role: RoleState, wrong_role: Refusal) -> Result<(), Refusal> {
    match role {
        RoleState::Resolved(Role::Member) => Ok(()),
        RoleState::Resolved(_) => Err(wrong_role),
        RoleState::Resolving | RoleState::Unavailable => Err(Refusal::RoleUnconfirmed),
    }
}

fn failure(target: &Target, e: ApiError) -> JoinError {
    warn!("{} failed: {}", target.key(), e);
    JoinError::Failed {
        message: e
            .server_message()
            .map(str::to_string)
            .unwrap_or_else(|| target.failure_message().to_string()),
    }
}
