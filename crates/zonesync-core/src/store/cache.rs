//! Record ID cache
//!
//! Maps `(fqdn, type)` to the provider's record ID so repeated upserts skip
//! the lookup call. Guards are short-lived and never cross an `.await`.

use crate::traits::RecordType;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

type CacheKey = (String, RecordType);

#[derive(Debug, Default)]
pub(crate) struct RecordCache {
    ids: RwLock<HashMap<CacheKey, String>>,
}

impl RecordCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, fqdn: &str, record_type: RecordType) -> Option<String> {
        let ids = self.ids.read().unwrap_or_else(PoisonError::into_inner);
        ids.get(&(fqdn.to_string(), record_type)).cloned()
    }

    pub(crate) fn insert(&self, fqdn: &str, record_type: RecordType, id: impl Into<String>) {
        let mut ids = self.ids.write().unwrap_or_else(PoisonError::into_inner);
        ids.insert((fqdn.to_string(), record_type), id.into());
    }

    /// Remove an entry, returning the ID it held
    pub(crate) fn remove(&self, fqdn: &str, record_type: RecordType) -> Option<String> {
        let mut ids = self.ids.write().unwrap_or_else(PoisonError::into_inner);
        ids.remove(&(fqdn.to_string(), record_type))
    }

    pub(crate) fn len(&self) -> usize {
        self.ids.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub(crate) fn clear(&self) {
        self.ids
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
