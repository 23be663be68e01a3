use async_trait::async_trait;
use std::{collections::HashMap, time::Duration};
use tokio::{sync::RwLock, time::Instant};

use super::{SessionData, SessionError, SessionKey, SessionStore};

/// In-process session store, lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<SessionKey, (SessionData, Instant)>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, key: &SessionKey) -> Result<Option<SessionData>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(data, _)| data.clone()))
    }

    async fn save(
        &self,
        key: &SessionKey,
        data: &SessionData,
        ttl: Duration,
    ) -> Result<(), SessionError> {
        let expires_at = Instant::now() + ttl;
        self.sessions
            .write()
            .await
            .insert(key.clone(), (data.clone(), expires_at));
        Ok(())
    }

    async fn destroy(&self, key: &SessionKey) -> Result<(), SessionError> {
        self.sessions.write().await.remove(key);
        Ok(())
    }

    async fn prune_expired(&self) -> Result<u64, SessionError> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, (_, expires_at)| *expires_at > now);
        Ok((before - sessions.len()) as u64)
    }

    async fn ping(&self) -> Result<(), SessionError> {
        Ok(())
    }
}
