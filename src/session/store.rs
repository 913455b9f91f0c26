//! Session store
//!
//! An injectable key-value interface over session records with a single
//! in-memory implementation. Each record has exactly one writer (the batch
//! job that owns it), so the interface stays a plain get/set/delete/list.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::types::Session;

/// Key-value storage for session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Option<Session>;
    async fn set(&self, session: Session);
    async fn delete(&self, id: Uuid) -> Option<Session>;
    async fn list(&self) -> Vec<Session>;
}

/// In-memory store. Records are lost on restart.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Option<Session> {
        self.inner.read().await.get(&id).cloned()
    }

    async fn set(&self, session: Session) {
        self.inner.write().await.insert(session.id, session);
    }

    async fn delete(&self, id: Uuid) -> Option<Session> {
        self.inner.write().await.remove(&id)
    }

    async fn list(&self) -> Vec<Session> {
        self.inner.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::{
        ConversionOptions, LlmProvider, OutputFormat, SessionKind,
    };

    fn test_session(id: Uuid) -> Session {
        let options = ConversionOptions {
            output_format: OutputFormat::Markdown,
            extract_images: true,
            max_pages: None,
            use_llm: false,
            llm_provider: LlmProvider::Ollama,
            ollama_url: String::new(),
            ollama_model: String::new(),
            gemini_api_key: String::new(),
            gemini_model: String::new(),
        };
        Session::new(id, SessionKind::Session, 1, options.redacted_settings())
    }

    #[tokio::test]
    async fn set_get_delete_list() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();

        assert!(store.get(id).await.is_none());

        store.set(test_session(id)).await;
        assert_eq!(store.get(id).await.unwrap().id, id);
        assert_eq!(store.list().await.len(), 1);

        let removed = store.delete(id).await;
        assert_eq!(removed.unwrap().id, id);
        assert!(store.get(id).await.is_none());
        assert!(store.list().await.is_empty());
    }
}
