//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared resources:
//! the read-only pillar registry, the generation backend, the base instructions
//! and the in-memory store of live sessions.

use crate::config::Config;
use cadence_core::{GenerationAdapter, Registry, Session, SessionMode};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

/// A live session. Locked for the whole of a submission so that one
/// conversation is always processed in order.
pub type SharedSession = Arc<Mutex<Session>>;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub adapter: Arc<dyn GenerationAdapter>,
    pub system_prompt: Arc<String>,
    pub config: Arc<Config>,
    pub sessions: Arc<RwLock<HashMap<Uuid, SharedSession>>>,
}

impl AppState {
    pub fn new(
        config: Config,
        registry: Arc<Registry>,
        adapter: Arc<dyn GenerationAdapter>,
        system_prompt: String,
    ) -> Self {
        Self {
            registry,
            adapter,
            system_prompt: Arc::new(system_prompt),
            config: Arc::new(config),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Creates and stores a new session using the configured defaults.
    pub async fn create_session(&self, mode: Option<SessionMode>) -> (Uuid, SharedSession) {
        let mut options = self.config.session_options();
        if let Some(mode) = mode {
            options.mode = mode;
        }
        let session = Session::with_instructions(
            self.registry.clone(),
            self.adapter.clone(),
            self.system_prompt.clone(),
            options,
        );

        let id = Uuid::new_v4();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, shared.clone());
        info!(session_id = %id, mode = %options.mode, "Session created");
        (id, shared)
    }

    pub async fn session(&self, id: Uuid) -> Option<SharedSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Removes a session. Returns false if it did not exist.
    pub async fn remove_session(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            info!(session_id = %id, "Session destroyed");
        }
        removed
    }
}
