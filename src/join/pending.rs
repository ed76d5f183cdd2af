use std::{
    collections::HashSet,
    sync::{Mutex, PoisonError},
};

/// Join and register requests currently in flight, per `(email, target)`.
#[derive(Debug, Default)]
pub struct PendingActions {
    inflight: Mutex<HashSet<(String, String)>>,
}

/// Held while a request is outstanding; dropping it frees the pair.
#[derive(Debug)]
pub struct PendingTicket<'a> {
    owner: &'a PendingActions,
    pair: (String, String),
}

impl PendingActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when the same principal already has a request out for `target`.
    pub fn try_begin(&self, email: &str, target: &str) -> Option<PendingTicket<'_>> {
        let pair = (email.to_string(), target.to_string());
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if !inflight.insert(pair.clone()) {
            return None;
        }
        Some(PendingTicket { owner: self, pair })
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, email: &str, target: &str) -> bool {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(email.to_string(), target.to_string()))
    }
}

impl Drop for PendingTicket<'_> {
    fn drop(&mut self) {
        self.owner
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.pair);
    }
}
