use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::registry::{QuotaKey, RepositoryError};

/// One mutex per quota key, so count-then-insert is atomic per (school, edition, level).
#[derive(Debug, Default)]
pub struct AdmissionLocks {
    slots: Mutex<HashMap<QuotaKey, Arc<Mutex<()>>>>,
}

impl AdmissionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &QuotaKey) -> Result<Arc<Mutex<()>>, RepositoryError> {
        let mut slots = self.slots.lock().map_err(|_| poisoned())?;
        Ok(slots.entry(key.clone()).or_default().clone())
    }

    pub fn with_key<T, E>(&self, key: &QuotaKey, f: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepositoryError>,
    {
        let slot = self.slot(key)?;
        let _guard = slot.lock().map_err(|_| poisoned())?;
        f()
    }

    /// Hold two keys at once. Keys are taken in `Ord` order so concurrent
    /// transfers in opposite directions cannot deadlock.
    pub fn with_keys<T, E>(
        &self,
        first: &QuotaKey,
        second: &QuotaKey,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<RepositoryError>,
    {
        if first == second {
            return self.with_key(first, f);
        }
        let (low, high) = if first < second {
            (first, second)
        } else {
            (second, first)
        };
        let low_slot = self.slot(low)?;
        let high_slot = self.slot(high)?;
        let _low = low_slot.lock().map_err(|_| poisoned())?;
        let _high = high_slot.lock().map_err(|_| poisoned())?;
        f()
    }
}

fn poisoned() -> RepositoryError {
    RepositoryError::Unavailable("admission lock poisoned".to_string())
}
