//! Session identity issuance.

use std::sync::Arc;

use tracing::{debug, warn};

use subastas_core::Identity;
use subastas_core::constants::IDENTITY_STORAGE_KEY;
use subastas_store::{KeyValueStore, StoreError};

/// Issues a fresh [`Identity`] per submission attempt and persists it under
/// [`IDENTITY_STORAGE_KEY`], overwriting the previous one.
#[derive(Clone)]
pub struct IdentityIssuer {
    store: Arc<dyn KeyValueStore>,
}

impl IdentityIssuer {
    /// Issuer persisting into `store`.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Generate and persist a new identity.
    ///
    /// Never fails: a storage error is logged and the identity is still
    /// returned, since the handoff carries it explicitly.
    pub fn issue(&self) -> Identity {
        let identity = Identity::generate();
        match self.store.set(IDENTITY_STORAGE_KEY, identity.as_str()) {
            Ok(()) => debug!(user_id = %identity, "identity issued"),
            Err(e) => warn!(user_id = %identity, error = %e, "failed to persist identity"),
        }
        identity
    }

    /// The most recently persisted identity, if any.
    pub fn last_issued(&self) -> Result<Option<Identity>, StoreError> {
        Ok(self.store.get(IDENTITY_STORAGE_KEY)?.map(Identity::from_raw))
    }
}
