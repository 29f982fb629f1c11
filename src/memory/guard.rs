//! Per-location mutual exclusion for load → apply → persist cycles.
//!
//! Each [`StorageLocation`] gets its own async mutex, created on first use.
//! Callers for different locations never contend. The returned
//! [`LocationGuard`] is owned, so it can be moved into a blocking worker and
//! is released wherever it is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

use crate::error::AppError;

use super::keyspace::StorageLocation;

#[derive(Default)]
pub struct ConcurrencyGuard {
    locks: Mutex<HashMap<StorageLocation, Arc<AsyncMutex<()>>>>,
}

/// Exclusive access to one location until dropped.
#[derive(Debug)]
pub struct LocationGuard {
    location: StorageLocation,
    _held: OwnedMutexGuard<()>,
}

impl LocationGuard {
    pub fn location(&self) -> &StorageLocation {
        &self.location
    }
}

impl ConcurrencyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `location` is free and take it.
    pub async fn acquire(&self, location: &StorageLocation) -> Result<LocationGuard, AppError> {
        let lock = self.lock_for(location)?;
        let held = lock.lock_owned().await;
        trace!(location = %location, "location acquired");
        Ok(LocationGuard {
            location: location.clone(),
            _held: held,
        })
    }

    /// Take `location` only if nobody holds it right now.
    pub fn try_acquire(&self, location: &StorageLocation) -> Result<Option<LocationGuard>, AppError> {
        let lock = self.lock_for(location)?;
        Ok(lock.try_lock_owned().ok().map(|held| LocationGuard {
            location: location.clone(),
            _held: held,
        }))
    }

    /// Number of locations with a live lock entry.
    pub fn tracked_locations(&self) -> Result<usize, AppError> {
        Ok(self.registry()?.len())
    }

    fn registry(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<StorageLocation, Arc<AsyncMutex<()>>>>, AppError> {
        self.locks
            .lock()
            .map_err(|_| AppError::Memory("location lock registry poisoned".into()))
    }

    fn lock_for(&self, location: &StorageLocation) -> Result<Arc<AsyncMutex<()>>, AppError> {
        let mut locks = self.registry()?;
        // An entry referenced only by the map has no holder and no waiter.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(locks
            .entry(location.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone())
    }
}

impl std::fmt::Debug for ConcurrencyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrencyGuard")
            .field("tracked_locations", &self.tracked_locations().ok())
            .finish()
    }
}
