//! Persistent last-known position.

use std::sync::Arc;

use happymac_core::{KeyValueStore, KeyValueStoreExt};

use crate::types::Position;

/// Fixed key of the cached position record in the host store.
pub const CACHED_POSITION_KEY: &str = "cached_position";

/// Single-slot cache of the last successful fix.
///
/// Writes overwrite; there is never more than one record. Storage failures
/// are logged and otherwise ignored: losing the cache only costs a fallback.
#[derive(Clone)]
pub struct PositionCache {
    store: Arc<dyn KeyValueStore>,
}

impl PositionCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Option<Position> {
        match self.store.get_json::<Position>(CACHED_POSITION_KEY) {
            Ok(position) => position,
            Err(e) => {
                tracing::warn!("Ignoring unreadable cached position: {}", e);
                None
            }
        }
    }

    pub fn store(&self, position: &Position) {
        if let Err(e) = self.store.set_json(CACHED_POSITION_KEY, position) {
            tracing::warn!("Failed to persist cached position: {}", e);
        }
    }
}

impl std::fmt::Debug for PositionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionCache")
            .field("key", &CACHED_POSITION_KEY)
            .finish()
    }
}
