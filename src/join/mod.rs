//! Joining clubs and registering for events.

use serde::Serialize;
use std::fmt;

use crate::api::{club::Club, event::Event, membership::RegistrationStatus};

pub mod flow;
pub mod pending;

pub use flow::JoinService;
pub use pending::PendingActions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Club { id: String },
    Event { id: String },
}

impl Target {
    pub fn club(id: impl Into<String>) -> Self {
        Target::Club { id: id.into() }
    }

    pub fn event(id: impl Into<String>) -> Self {
        Target::Event { id: id.into() }
    }

    pub fn key(&self) -> String {
        match self {
            Target::Club { id } => format!("club:{id}"),
            Target::Event { id } => format!("event:{id}"),
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            Target::Club { .. } => "Joined successfully!",
            Target::Event { .. } => "Registered successfully!",
        }
    }

    pub fn failure_message(&self) -> &'static str {
        match self {
            Target::Club { .. } => "Failed to join club",
            Target::Event { .. } => "Failed to register for event",
        }
    }
}

/// A join or register attempt stopped before anything was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    LoginRequired,
    ClubMembersOnly,
    EventMembersOnly,
    RoleUnconfirmed,
    NotClubMember,
    AlreadyRegistered,
    InFlight,
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Refusal::LoginRequired => "Please login first!",
            Refusal::ClubMembersOnly => "Only users can join clubs",
            Refusal::EventMembersOnly => "Only members can register for events",
            Refusal::RoleUnconfirmed => "Could not confirm your role. Please try again.",
            Refusal::NotClubMember => {
                "You must be an active member of this club to register for its events"
            }
            Refusal::AlreadyRegistered => "You are already registered for this event",
            Refusal::InFlight => "Your request is already being processed",
        };
        f.write_str(message)
    }
}

impl std::error::Error for Refusal {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined { message: String },
    Checkout { url: String },
}

#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error(transparent)]
    Refused(#[from] Refusal),

    #[error("{message}")]
    Failed { message: String },
}

/// How the join/register button on a detail page is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionControl {
    pub label: &'static str,
    pub enabled: bool,
}

pub fn club_control(club: &Club) -> ActionControl {
    ActionControl {
        label: if club.is_free() { "Join Club" } else { "Join & Pay" },
        enabled: true,
    }
}

pub fn event_control(event: &Event, status: RegistrationStatus) -> ActionControl {
    match status {
        RegistrationStatus::Registered => ActionControl {
            label: "Already Registered",
            enabled: false,
        },
        RegistrationStatus::PendingPayment => ActionControl {
            label: "Complete Payment",
            enabled: true,
        },
        RegistrationStatus::Unregistered => ActionControl {
            label: if event.is_paid {
                "Register & Pay"
            } else {
                "Register for Event"
            },
            enabled: true,
        },
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{TimeZone, Utc};

    use crate::api::{
        club::{Club, ClubStatus},
        event::Event,
    };

    pub fn club(id: &str, fee: f64) -> Club {
        Club {
            id: id.into(),
            club_name: "Shutterbugs".into(),
            description: String::new(),
            category: "Photography".into(),
            location: "Dhaka".into(),
            membership_fee: fee,
            banner_image: None,
            manager_email: "lead@example.com".into(),
            status: ClubStatus::Approved,
            created_at: None,
            members_count: 0,
            events_count: 0,
        }
    }

    pub fn event(id: &str, club_id: &str, paid: bool) -> Event {
        Event {
            id: id.into(),
            club_id: club_id.into(),
            title: "Night walk".into(),
            description: String::new(),
            event_date: Utc.with_ymd_and_hms(2030, 5, 1, 18, 0, 0).unwrap(),
            location: "Old town".into(),
            is_paid: paid,
            event_fee: if paid { 10.0 } else { 0.0 },
            max_attendees: None,
            club_name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn club_labels_follow_fee() {
        assert_eq!(club_control(&fixtures::club("c1", 0.0)).label, "Join Club");
        assert_eq!(club_control(&fixtures::club("c1", 25.0)).label, "Join & Pay");
    }

    #[test]
    fn registered_event_is_disabled() {
        let event = fixtures::event("e1", "c1", true);
        let control = event_control(&event, RegistrationStatus::Registered);
        assert_eq!(control.label, "Already Registered");
        assert!(!control.enabled);
    }

    #[test]
    fn pending_payment_can_be_resumed() {
        let event = fixtures::event("e1", "c1", true);
        let control = event_control(&event, RegistrationStatus::PendingPayment);
        assert_eq!(control.label, "Complete Payment");
        assert!(control.enabled);
    }

    #[test]
    fn unregistered_labels_follow_price() {
        let free = fixtures::event("e1", "c1", false);
        let paid = fixtures::event("e2", "c1", true);
        assert_eq!(
            event_control(&free, RegistrationStatus::Unregistered).label,
            "Register for Event"
        );
        assert_eq!(
            event_control(&paid, RegistrationStatus::Unregistered).label,
            "Register & Pay"
        );
    }

    #[test]
    fn refusals_read_like_notifications() {
        assert_eq!(Refusal::LoginRequired.to_string(), "Please login first!");
        assert_eq!(Refusal::ClubMembersOnly.to_string(), "Only users can join clubs");
        assert_eq!(
            Refusal::AlreadyRegistered.to_string(),
            "You are already registered for this event"
        );
    }
}
