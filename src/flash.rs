use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::warn;

const FLASH_KEY: &str = "flash.messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
}

/// One notification shown on the next rendered page, then discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: Level,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
        }
    }
}

pub async fn push(session: &Session, flash: Flash) {
    let mut pending = match session.get::<Vec<Flash>>(FLASH_KEY).await {
        Ok(pending) => pending.unwrap_or_default(),
        Err(e) => {
            warn!("could not read flash messages: {}", e);
            Vec::new()
        }
    };
    pending.push(flash);
    if let Err(e) = session.insert(FLASH_KEY, pending).await {
        warn!("could not store flash message: {}", e);
    }
}

pub async fn success(session: &Session, message: impl Into<String>) {
    push(session, Flash::success(message)).await
}

pub async fn error(session: &Session, message: impl Into<String>) {
    push(session, Flash::error(message)).await
}

/// Removes and returns every pending message.
pub async fn take(session: &Session) -> Vec<Flash> {
    match session.remove::<Vec<Flash>>(FLASH_KEY).await {
        Ok(pending) => pending.unwrap_or_default(),
        Err(e) => {
            warn!("could not read flash messages: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn messages_are_shown_once() {
        let session = session();
        success(&session, "Joined successfully!").await;
        error(&session, "Failed to join club").await;

        let shown = take(&session).await;
        assert_eq!(
            shown,
            vec![
                Flash::success("Joined successfully!"),
                Flash::error("Failed to join club")
            ]
        );
        assert!(take(&session).await.is_empty());
    }
}
