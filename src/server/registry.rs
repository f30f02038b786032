use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::engine::persistence;
use crate::engine::store::Store;
use crate::Result;

/// The gateway's collection of named stores.
///
/// Each store sits behind its own lock: mutating operations take the
/// exclusive side, scans the shared side, so a reader never observes a
/// store mid-mutation. The registry itself is passed by handle into the
/// request handlers rather than living in ambient global state.
pub struct Registry {
    stores: RwLock<HashMap<String, Arc<RwLock<Store>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// Sorted list of registered collection names.
    pub fn names(&self) -> Vec<String> {
        let stores = self.stores.read().unwrap();
        let mut names: Vec<String> = stores.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registers a fresh empty store under `name`, replacing any store
    /// previously held under that name.
    pub fn create(&self, name: &str) -> Arc<RwLock<Store>> {
        let store = Arc::new(RwLock::new(Store::new()));
        let mut stores = self.stores.write().unwrap();
        stores.insert(name.to_string(), store.clone());
        store
    }

    pub fn insert(&self, name: &str, store: Store) {
        let mut stores = self.stores.write().unwrap();
        stores.insert(name.to_string(), Arc::new(RwLock::new(store)));
    }

    pub fn get(&self, name: &str) -> Option<Arc<RwLock<Store>>> {
        let stores = self.stores.read().unwrap();
        stores.get(name).cloned()
    }

    /// Unregisters `name` and returns the store's records at deletion.
    pub fn remove(&self, name: &str) -> Option<Store> {
        let handle = {
            let mut stores = self.stores.write().unwrap();
            stores.remove(name)
        }?;
        let store = handle.read().unwrap();
        Some(store.clone())
    }

    /// Copies every registered store under its name.
    pub fn snapshot(&self) -> BTreeMap<String, Store> {
        let stores = self.stores.read().unwrap();
        stores
            .iter()
            .map(|(name, store)| (name.clone(), store.read().unwrap().clone()))
            .collect()
    }

    /// Persists the whole registry as one snapshot file, optionally
    /// encrypted. Inverse of [`Registry::load_snapshot`].
    pub fn persist_all<P: AsRef<Path>>(&self, path: P, password: Option<&str>) -> Result<()> {
        let snapshot = self.snapshot();
        let payload = serde_json::to_vec_pretty(&snapshot)?;
        persistence::write_payload(path.as_ref(), &payload, password)
    }

    /// Rebuilds a registry from a snapshot written by
    /// [`Registry::persist_all`].
    pub fn load_snapshot<P: AsRef<Path>>(path: P, password: Option<&str>) -> Result<Self> {
        let payload = persistence::read_payload(path.as_ref(), password)?;
        let snapshot: BTreeMap<String, Store> = serde_json::from_slice(&payload)?;

        let registry = Registry::new();
        for (name, store) in snapshot {
            registry.insert(&name, store);
        }
        Ok(registry)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::record::Record;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_create_get_remove() {
        let registry = Registry::new();
        assert!(registry.names().is_empty());

        registry.create("users");
        registry.create("sessions");
        assert_eq!(registry.names(), vec!["sessions", "users"]);

        let users = registry.get("users").unwrap();
        users
            .write()
            .unwrap()
            .add_record(Record::from_value(json!({"name": "alice"})).unwrap());

        let removed = registry.remove("users").unwrap();
        assert_eq!(removed.len(), 1);
        assert!(registry.get("users").is_none());
    }

    #[test]
    fn test_create_replaces_an_existing_store() {
        let registry = Registry::new();
        let first = registry.create("users");
        first
            .write()
            .unwrap()
            .add_record(Record::from_value(json!({"name": "alice"})).unwrap());

        registry.create("users");
        assert_eq!(registry.get("users").unwrap().read().unwrap().len(), 0);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("globstore");

        let registry = Registry::new();
        let users = registry.create("users");
        users
            .write()
            .unwrap()
            .add_record(Record::from_value(json!({"name": "alice"})).unwrap());
        registry.create("empty");

        registry.persist_all(&path, Some("password")).unwrap();

        let restored = Registry::load_snapshot(&path, Some("password")).unwrap();
        assert_eq!(restored.names(), registry.names());
        assert_eq!(
            *restored.get("users").unwrap().read().unwrap(),
            *registry.get("users").unwrap().read().unwrap()
        );
    }
}
