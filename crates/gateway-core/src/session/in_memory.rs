use super::{Session, SessionEntry, SessionId, SessionStore, SessionStoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

fn entry_text(entry: &SessionEntry) -> String {
    match entry {
        SessionEntry::Message(m) => m.text_content(),
        SessionEntry::ToolCallAttempt(call) => call.function.name.clone(),
        SessionEntry::LLMFailure(op, msg) => format!("{op}: {msg}"),
    }
}

/// An in-memory implementation of the `SessionStore` trait.
pub struct InMemorySessionStore {
    sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
}

impl InMemorySessionStore {
    /// Creates a new `InMemorySessionStore`.
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, session: Session) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&session.id) {
            return Err(SessionStoreError::AlreadyExists(session.id.clone()));
        }
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Session>, SessionStoreError> {
        let sessions = self.sessions.lock().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn add_session_entry(
        &self,
        session_id: &SessionId,
        entry: SessionEntry,
    ) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get_mut(session_id) {
            session.add_entry(entry);
            session.updated_at = Utc::now(); // Ensure updated_at is current
            Ok(())
        } else {
            Err(SessionStoreError::NotFound(session_id.clone()))
        }
    }

    async fn update_session(&self, session: &Session) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&session.id) {
            sessions.insert(session.id.clone(), session.clone());
            Ok(())
        } else {
            Err(SessionStoreError::NotFound(session.id.clone()))
        }
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.remove(session_id).is_some() {
            Ok(())
        } else {
            Err(SessionStoreError::NotFound(session_id.clone()))
        }
    }

    /// Searches for session entries matching a full-text query within a specific session.
    async fn search_session_entries(
        &self,
        session_id: &SessionId,
        query: &str,
    ) -> Result<Vec<(DateTime<Utc>, SessionEntry)>, SessionStoreError> {
        let sessions = self.sessions.lock().await;
        let session = sessions
            .get(session_id)
            .ok_or_else(|| SessionStoreError::NotFound(session_id.clone()))?;
        let query = query.to_lowercase();
        Ok(session
            .entries
            .iter()
            .filter(|(_, entry)| entry_text(entry).to_lowercase().contains(&query))
            .cloned()
            .collect())
    }

    /// Searches for session entries across all sessions matching a full-text query.
    async fn search_all_session_entries(
        &self,
        query: &str,
    ) -> Result<Vec<(SessionId, DateTime<Utc>, SessionEntry)>, SessionStoreError> {
        let sessions = self.sessions.lock().await;
        let query = query.to_lowercase();
        let mut results = Vec::new();
        for session in sessions.values() {
            for (timestamp, entry) in &session.entries {
                if entry_text(entry).to_lowercase().contains(&query) {
                    results.push((session.id.clone(), *timestamp, entry.clone()));
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[tokio::test]
    async fn create_get_and_delete_round_trip() {
        let store = InMemorySessionStore::new();
        let session = Session::new();
        let id = session.id.clone();
        store.create_session(session).await.unwrap();
        assert!(store.get_session(&id).await.unwrap().is_some());
        store.delete_session(&id).await.unwrap();
        assert!(store.get_session(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn add_entry_then_search_finds_it() {
        let store = InMemorySessionStore::new();
        let session = Session::new();
        let id = session.id.clone();
        store.create_session(session).await.unwrap();
        store
            .add_session_entry(&id, SessionEntry::Message(Message::user("tell me about rust ownership")))
            .await
            .unwrap();

        let hits = store.search_session_entries(&id, "ownership").await.unwrap();
        assert_eq!(hits.len(), 1);

        let misses = store.search_session_entries(&id, "python").await.unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn search_all_spans_multiple_sessions() {
        let store = InMemorySessionStore::new();
        let a = Session::new();
        let b = Session::new();
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        store.create_session(a).await.unwrap();
        store.create_session(b).await.unwrap();
        store
            .add_session_entry(&a_id, SessionEntry::Message(Message::user("hello from a")))
            .await
            .unwrap();
        store
            .add_session_entry(&b_id, SessionEntry::Message(Message::user("hello from b")))
            .await
            .unwrap();

        let hits = store.search_all_session_entries("hello").await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn operations_on_unknown_session_return_not_found() {
        let store = InMemorySessionStore::new();
        let id = SessionId::new();
        assert!(matches!(
            store.delete_session(&id).await,
            Err(SessionStoreError::NotFound(_))
        ));
    }
}
