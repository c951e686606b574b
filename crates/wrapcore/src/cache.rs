//! # Load Cache
//!
//! Wrappers instantiated from packages, keyed by the Uri the package was found
//! at. Each Uri owns a slot with its own lock: the map is only touched to find
//! or create the slot, and instantiation happens under the slot lock alone, so
//! loads of different Uris never wait on each other while concurrent loads of
//! the same Uri collapse into one.
//!
//! A slot is filled only after `create_wrapper` succeeds. A failed or panicking
//! load leaves it empty for the next caller to retry.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use dashmap::DashMap;
use tracing::debug;
use tracing::warn;

use crate::error::Error;
use crate::error::Result;
use crate::uri::Uri;
use crate::wrapper::Package;
use crate::wrapper::Wrapper;

type Slot = Arc<Mutex<Option<Arc<dyn Wrapper>>>>;

#[derive(Default)]
pub struct LoadCache {
    slots: DashMap<Uri, Slot>,
}

impl LoadCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached wrapper for `uri`, loading it from `package` on first use.
    pub fn get_or_load(&self, uri: &Uri, package: &dyn Package) -> Result<Arc<dyn Wrapper>> {
        // Clone the slot out so the shard lock is released before blocking on it.
        let slot = Arc::clone(&self.slots.entry(uri.clone()).or_default());
        let mut loaded = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(wrapper) = loaded.as_ref() {
            debug!(%uri, "load cache hit");
            return Ok(wrapper.clone());
        }

        debug!(%uri, "loading package");
        let wrapper = package.create_wrapper().map_err(|e| {
            warn!(%uri, error = %e, "package failed to load");
            match e {
                Error::Load { message, .. } => Error::Load {
                    uri: Some(uri.clone()),
                    message,
                },
                other => Error::Load {
                    uri: Some(uri.clone()),
                    message: other.to_string(),
                },
            }
        })?;

        *loaded = Some(wrapper.clone());
        Ok(wrapper)
    }

    pub fn get(&self, uri: &Uri) -> Option<Arc<dyn Wrapper>> {
        let slot = Arc::clone(self.slots.get(uri)?.value());
        let loaded = slot.lock().unwrap_or_else(PoisonError::into_inner);
        loaded.clone()
    }

    pub fn contains(&self, uri: &Uri) -> bool {
        self.get(uri).is_some()
    }

    /// Number of Uris with a loaded wrapper.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| {
                slot.value()
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_some()
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
