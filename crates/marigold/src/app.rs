//! The `Marigold` bundle: one store handle, the services built on it.

use std::sync::Arc;

use marigold_auth::CredentialService;
use marigold_presence::PresenceTracker;
use marigold_store::{KeyValueStore, RedisStore, SessionStore};

use crate::{Gateway, MarigoldError, Settings};

/// Every Marigold service wired to one shared store.
///
/// The store handle is acquired once here and injected into the
/// credential service and the presence tracker. Nothing is global: two
/// bundles over two stores are fully independent.
pub struct Marigold<B: KeyValueStore> {
    store: SessionStore<B>,
    credentials: Arc<CredentialService<B>>,
    presence: Arc<PresenceTracker<B>>,
}

impl Marigold<RedisStore> {
    /// Connects to Redis and builds every service from `settings`.
    ///
    /// Fails fast: an unreachable store is reported here, not on the
    /// first request.
    pub async fn connect(settings: &Settings) -> Result<Self, MarigoldError> {
        let backend = RedisStore::connect(&settings.store).await?;
        Self::with_backend(Arc::new(backend), settings)
    }
}

impl<B: KeyValueStore> Marigold<B> {
    /// Builds every service over an existing backend.
    pub fn with_backend(
        backend: Arc<B>,
        settings: &Settings,
    ) -> Result<Self, MarigoldError> {
        let store = SessionStore::new(backend);
        let credentials = CredentialService::new(store.clone(), &settings.credentials)?;
        let presence = PresenceTracker::new(store.clone(), settings.presence.clone());
        tracing::info!(
            algorithm = ?settings.credentials.algorithm,
            access_ttl_secs = settings.credentials.access_ttl.as_secs(),
            refresh_ttl_secs = settings.credentials.refresh_ttl.as_secs(),
            "marigold services ready"
        );

        Ok(Self {
            store,
            credentials: Arc::new(credentials),
            presence: Arc::new(presence),
        })
    }

    pub fn credentials(&self) -> &Arc<CredentialService<B>> {
        &self.credentials
    }

    pub fn presence(&self) -> &Arc<PresenceTracker<B>> {
        &self.presence
    }

    pub fn store(&self) -> &SessionStore<B> {
        &self.store
    }

    /// A gateway admitting connections with these services.
    pub fn gateway(&self) -> Gateway<CredentialService<B>, B> {
        Gateway::new(Arc::clone(&self.credentials), Arc::clone(&self.presence))
    }

    /// `true` if the store answers.
    pub async fn healthy(&self) -> bool {
        self.store.ping().await
    }

    /// Releases this bundle's hold on the store.
    ///
    /// The backend closes once the last clone (including any gateway or
    /// live connection still running) is dropped.
    pub fn shutdown(self) {
        let holders = Arc::strong_count(self.store.backend());
        tracing::info!(holders, "marigold shutting down");
    }
}
