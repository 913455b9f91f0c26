//! Application state management

use std::sync::Arc;

use crate::config::{Config, EngineKind};
use crate::engine::{ConversionEngine, MarkerEngine, VisionEngine};
use crate::jobs::JobRunner;
use crate::session::{MemoryStore, SessionStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    store: Arc<dyn SessionStore>,
    engine: Arc<dyn ConversionEngine>,
    jobs: JobRunner,
}

impl AppState {
    /// Create the state for the configured engine, backed by the
    /// in-memory session store.
    pub fn new(config: Config) -> Self {
        let engine: Arc<dyn ConversionEngine> = match config.engine {
            EngineKind::Marker => Arc::new(MarkerEngine::from_config(&config)),
            EngineKind::Vision => Arc::new(VisionEngine::from_config(&config)),
        };
        Self::with_parts(config, Arc::new(MemoryStore::new()), engine)
    }

    /// Assemble state from explicit parts. Lets tests inject a mock
    /// engine or an alternative store.
    pub fn with_parts(
        config: Config,
        store: Arc<dyn SessionStore>,
        engine: Arc<dyn ConversionEngine>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                engine,
                jobs: JobRunner::new(),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.inner.store
    }

    pub fn engine(&self) -> &Arc<dyn ConversionEngine> {
        &self.inner.engine
    }

    pub fn jobs(&self) -> &JobRunner {
        &self.inner.jobs
    }
}
