pub mod clock;
pub mod session;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::{catalog::CardCatalog, session_store::SessionStore},
    error::ServiceError,
    services::session_manager::SessionManager,
};

pub use self::clock::{Clock, ManualClock, SystemClock};

pub type SharedState = Arc<AppState>;

/// Storage handles installed by the supervisor once a backend is reachable.
#[derive(Clone)]
pub struct Backend {
    /// Short backend name reported by the health check.
    pub label: &'static str,
    /// Games, participants, rounds and rankings.
    pub store: Arc<dyn SessionStore>,
    /// Decks, cards and access grants.
    pub catalog: Arc<dyn CardCatalog>,
}

impl Backend {
    /// Pair a session store with a catalog.
    pub fn new(
        label: &'static str,
        store: Arc<dyn SessionStore>,
        catalog: Arc<dyn CardCatalog>,
    ) -> Self {
        Self {
            label,
            store,
            catalog,
        }
    }
}

/// Central application state: storage handles, configuration and the clock.
pub struct AppState {
    backend: RwLock<Option<Backend>>,
    degraded: watch::Sender<bool>,
    config: AppConfig,
    clock: Arc<dyn Clock>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Same as [`AppState::new`] with an explicit time source.
    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            backend: RwLock::new(None),
            degraded: degraded_tx,
            config,
            clock,
        })
    }

    /// Obtain the current storage backend, if one is installed.
    pub async fn backend(&self) -> Option<Backend> {
        let guard = self.backend.read().await;
        guard.as_ref().cloned()
    }

    /// Storage backend, or [`ServiceError::Degraded`] while storage is down.
    pub async fn require_backend(&self) -> Result<Backend, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.backend().await.ok_or(ServiceError::Degraded)
    }

    /// Install a storage backend and leave degraded mode.
    pub async fn set_backend(&self, backend: Backend) {
        {
            let mut guard = self.backend.write().await;
            *guard = Some(backend);
        }
        self.update_degraded(false);
    }

    /// Remove the current backend and enter degraded mode.
    pub async fn clear_backend(&self) {
        {
            let mut guard = self.backend.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Runtime configuration loaded at startup.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Time source shared by every session operation.
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Session manager bound to the installed backend.
    pub async fn session_manager(&self) -> Result<SessionManager, ServiceError> {
        let backend = self.require_backend().await?;
        Ok(SessionManager::new(
            backend.store,
            backend.catalog,
            self.clock(),
            self.config.session,
        ))
    }
}
