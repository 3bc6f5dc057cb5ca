//! Registry of per-song override stores.
//!
//! The registry owns one [`OverrideStore`] per song id and persists the whole
//! collection as a single JSON string under [`REGISTRY_KEY`] in a
//! [`PreferenceStore`].
//!
//! # Persistence
//!
//! - Every effective override change persists the registry before returning.
//! - Only customized (non-default) stores are written; the live map keeps
//!   every store ever handed out, so callers holding an `Arc<OverrideStore>`
//!   never lose it.
//! - Saves are serialized by a lock and replace the stored blob as a whole.
//!
//! # Usage
//!
//! ```ignore
//! let prefs: Arc<dyn PreferenceStore> = Arc::new(JsonFilePrefs::open(path)?);
//! let registry = Registry::load(prefs)?;
//!
//! let store = registry.get_or_create("dQw4w9WgXcQ");
//! store.set_title(Some("My title".into()))?; // persisted
//! ```

mod fields;
mod store;

pub use fields::{OverrideField, OverrideValue, SongOverrides, ValueKind};
pub use store::OverrideStore;

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::prefs::{PrefsError, PreferenceStore};

/// Preference key holding the serialized registry.
pub const REGISTRY_KEY: &str = "data_registry";

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The persisted blob exists but cannot be parsed
    #[error("Corrupt registry data: {0}")]
    Corrupt(#[source] serde_json::Error),

    #[error("Failed to encode registry: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to persist registry: {0}")]
    Storage(#[from] PrefsError),

    #[error("Field {field} holds {expected} values, got {found}")]
    FieldType {
        field: OverrideField,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("Invalid value {value:?} for {field}: {reason}")]
    InvalidValue {
        field: OverrideField,
        value: String,
        reason: String,
    },
}

/// State shared between the registry handle and its stores.
pub(crate) struct RegistryShared {
    stores: RwLock<HashMap<String, Arc<OverrideStore>>>,
    sink: Option<Arc<dyn PreferenceStore>>,
    save_lock: Mutex<()>,
}

impl RegistryShared {
    /// Snapshot of customized stores, sorted by id.
    fn customized(&self) -> BTreeMap<String, SongOverrides> {
        self.stores
            .read()
            .iter()
            .map(|(id, store)| (id.clone(), store.snapshot()))
            .filter(|(_, overrides)| !overrides.is_default())
            .collect()
    }

    fn encode(&self) -> Result<String, RegistryError> {
        serde_json::to_string(&self.customized()).map_err(RegistryError::Encode)
    }

    fn save_to(&self, sink: &dyn PreferenceStore) -> Result<(), RegistryError> {
        let _guard = self.save_lock.lock();
        let blob = self.encode()?;
        sink.put(REGISTRY_KEY, &blob)?;
        tracing::debug!(target: "registry", bytes = blob.len(), "Persisted registry");
        Ok(())
    }

    pub(crate) fn persist(&self) -> Result<(), RegistryError> {
        match &self.sink {
            Some(sink) => self.save_to(sink.as_ref()),
            None => Ok(()),
        }
    }
}

/// Keyed collection of override stores.
///
/// Cheap to clone; clones share the same stores.
#[derive(Clone)]
pub struct Registry {
    shared: Arc<RegistryShared>,
}

impl Registry {
    /// Empty registry persisting to `sink` on every change.
    pub fn new(sink: Arc<dyn PreferenceStore>) -> Self {
        Self::with_entries(Some(sink), BTreeMap::new())
    }

    /// Empty registry that never persists on its own.
    pub fn in_memory() -> Self {
        Self::with_entries(None, BTreeMap::new())
    }

    /// Load from `prefs` and keep it as the persistence sink.
    ///
    /// A missing or empty blob gives an empty registry. A blob that does not
    /// parse is [`RegistryError::Corrupt`]; the caller decides whether to
    /// start over (see [`Registry::load_or_reset`]) or abort.
    pub fn load(prefs: Arc<dyn PreferenceStore>) -> Result<Self, RegistryError> {
        let blob = prefs.get(REGISTRY_KEY)?;
        let entries = decode_entries(blob.as_deref())?;
        tracing::info!(target: "registry", customized = entries.len(), "Loaded override registry");
        Ok(Self::with_entries(Some(prefs), entries))
    }

    /// Like [`Registry::load`], but a corrupt blob is logged and replaced by
    /// an empty registry. Storage errors still fail.
    pub fn load_or_reset(prefs: Arc<dyn PreferenceStore>) -> Result<Self, RegistryError> {
        match Self::load(Arc::clone(&prefs)) {
            Err(RegistryError::Corrupt(e)) => {
                tracing::warn!(target: "registry", "Discarding corrupt override registry: {}", e);
                Ok(Self::new(prefs))
            }
            other => other,
        }
    }

    /// Parse a persisted blob into a registry without a persistence sink.
    pub fn decode(blob: Option<&str>) -> Result<Self, RegistryError> {
        Ok(Self::with_entries(None, decode_entries(blob)?))
    }

    fn with_entries(
        sink: Option<Arc<dyn PreferenceStore>>,
        entries: BTreeMap<String, SongOverrides>,
    ) -> Self {
        let shared = Arc::new(RegistryShared {
            stores: RwLock::new(HashMap::with_capacity(entries.len())),
            sink,
            save_lock: Mutex::new(()),
        });
        {
            let mut stores = shared.stores.write();
            for (id, overrides) in entries {
                let store = OverrideStore::new(id.clone(), overrides, Arc::downgrade(&shared));
                stores.insert(id, Arc::new(store));
            }
        }
        Self { shared }
    }

    /// The store for `id`, created (default, not persisted) on first access.
    ///
    /// Concurrent callers asking for the same id always get the same store.
    pub fn get_or_create(&self, id: &str) -> Arc<OverrideStore> {
        if let Some(store) = self.shared.stores.read().get(id) {
            return Arc::clone(store);
        }

        let mut stores = self.shared.stores.write();
        let store = stores.entry(id.to_string()).or_insert_with(|| {
            tracing::trace!(target: "registry", id, "Creating override store");
            Arc::new(OverrideStore::new(
                id.to_string(),
                SongOverrides::default(),
                Arc::downgrade(&self.shared),
            ))
        });
        Arc::clone(store)
    }

    /// The store for `id` if one has been created or loaded.
    pub fn get(&self, id: &str) -> Option<Arc<OverrideStore>> {
        self.shared.stores.read().get(id).cloned()
    }

    /// Number of stores in memory, default ones included.
    pub fn len(&self) -> usize {
        self.shared.stores.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.stores.read().is_empty()
    }

    /// All ids in memory, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.shared.stores.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Customized records, sorted by id. This is exactly what a save writes.
    pub fn customized(&self) -> BTreeMap<String, SongOverrides> {
        self.shared.customized()
    }

    /// Serialize the customized records. The live registry is not modified.
    pub fn encode(&self) -> Result<String, RegistryError> {
        self.shared.encode()
    }

    /// Write the customized records to `sink`.
    pub fn save(&self, sink: &dyn PreferenceStore) -> Result<(), RegistryError> {
        self.shared.save_to(sink)
    }

    /// Write to the registry's own sink, if it has one.
    pub fn persist(&self) -> Result<(), RegistryError> {
        self.shared.persist()
    }

    /// Final persist at teardown.
    pub fn shutdown(self) -> Result<(), RegistryError> {
        self.shared.persist()?;
        tracing::info!(target: "registry", "Override registry shut down");
        Ok(())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("stores", &self.len())
            .field("persistent", &self.shared.sink.is_some())
            .finish()
    }
}

fn decode_entries(blob: Option<&str>) -> Result<BTreeMap<String, SongOverrides>, RegistryError> {
    match blob.map(str::trim) {
        None | Some("") | Some("{}") => Ok(BTreeMap::new()),
        Some(data) => serde_json::from_str(data).map_err(RegistryError::Corrupt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::MemoryPrefs;
    use crate::test_utils::CountingPrefs;

    #[test]
    fn test_absent_and_empty_blobs_load_empty() {
        for blob in [None, Some(""), Some("  "), Some("{}")] {
            let registry = Registry::decode(blob).unwrap();
            assert!(registry.is_empty(), "blob {:?}", blob);
        }
    }

    #[test]
    fn test_malformed_blob_is_corrupt() {
        for blob in [r#"{"abc": {"title": "x""#, "[]", r#"{"abc": {"colour": 1}}"#] {
            let err = Registry::decode(Some(blob)).unwrap_err();
            assert!(matches!(err, RegistryError::Corrupt(_)), "blob {}", blob);
        }
    }

    #[test]
    fn test_load_or_reset_discards_corrupt_blob() {
        let prefs = Arc::new(MemoryPrefs::new());
        prefs.put(REGISTRY_KEY, "{not json").unwrap();

        assert!(matches!(
            Registry::load(prefs.clone()),
            Err(RegistryError::Corrupt(_))
        ));
        let registry = Registry::load_or_reset(prefs).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_get_or_create_returns_same_store() {
        let registry = Registry::in_memory();
        let a = registry.get_or_create("song");
        let b = registry.get_or_create("song");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_or_create_concurrent() {
        let registry = Registry::in_memory();
        let stores: Vec<Arc<OverrideStore>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| registry.get_or_create("contended")))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for store in &stores[1..] {
            assert!(Arc::ptr_eq(&stores[0], store));
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_set_persists_and_noop_does_not() {
        let prefs = Arc::new(CountingPrefs::default());
        let registry = Registry::new(prefs.clone());
        let store = registry.get_or_create("song");
        assert_eq!(prefs.writes(), 0);

        store.set_title(Some("Title".into())).unwrap();
        assert_eq!(prefs.writes(), 1);

        store.set_title(Some("Title".into())).unwrap();
        assert_eq!(prefs.writes(), 1);

        store.set_title(None).unwrap();
        assert_eq!(prefs.writes(), 2);
        assert_eq!(prefs.get(REGISTRY_KEY).unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_save_omits_defaults_but_keeps_live_stores() {
        let registry = Registry::in_memory();
        registry.get_or_create("untouched");
        registry
            .get_or_create("custom")
            .set_accent_color(Some(0xFFBD_0A0F))
            .unwrap();

        let prefs = MemoryPrefs::new();
        registry.save(&prefs).unwrap();

        let blob = prefs.get(REGISTRY_KEY).unwrap().unwrap();
        assert_eq!(blob, r#"{"custom":{"accent_color":4290578959}}"#);
        assert_eq!(registry.len(), 2);
        assert!(registry.get("untouched").is_some());
    }

    #[test]
    fn test_roundtrip_through_prefs() {
        let prefs = Arc::new(MemoryPrefs::new());
        {
            let registry = Registry::new(prefs.clone());
            let a = registry.get_or_create("a");
            a.set_title(Some("Alpha".into())).unwrap();
            a.set_lyrics_sync_offset_ms(Some(-250)).unwrap();
            registry
                .get_or_create("b")
                .set_lyrics_source_id(Some("ptl:1234".into()))
                .unwrap();
            registry.get_or_create("c");
            registry.shutdown().unwrap();
        }

        let loaded = Registry::load(prefs).unwrap();
        assert_eq!(loaded.ids(), vec!["a".to_string(), "b".to_string()]);

        let a = loaded.get_or_create("a");
        assert_eq!(a.title().as_deref(), Some("Alpha"));
        assert_eq!(a.lyrics_sync_offset_ms(), Some(-250));
        assert_eq!(
            loaded.get_or_create("b").lyrics_source_id().as_deref(),
            Some("ptl:1234")
        );
    }

    #[test]
    fn test_loaded_stores_persist_to_same_prefs() {
        let prefs = Arc::new(MemoryPrefs::new());
        prefs
            .put(REGISTRY_KEY, r#"{"x":{"title":"Old"}}"#)
            .unwrap();

        let registry = Registry::load(prefs.clone()).unwrap();
        registry.get_or_create("x").set_title(Some("New".into())).unwrap();

        assert_eq!(
            prefs.get(REGISTRY_KEY).unwrap().as_deref(),
            Some(r#"{"x":{"title":"New"}}"#)
        );
    }

    #[test]
    fn test_concurrent_sets_leave_consistent_blob() {
        let prefs = Arc::new(MemoryPrefs::new());
        let registry = Registry::new(prefs.clone());

        std::thread::scope(|s| {
            for t in 0..4 {
                let registry = registry.clone();
                s.spawn(move || {
                    for i in 0..25 {
                        registry
                            .get_or_create(&format!("song-{t}-{i}"))
                            .set_lyrics_sync_offset_ms(Some(i))
                            .unwrap();
                    }
                });
            }
        });

        let reloaded = Registry::decode(prefs.get(REGISTRY_KEY).unwrap().as_deref()).unwrap();
        assert_eq!(reloaded.len(), 100);
        assert_eq!(reloaded.customized(), registry.customized());
    }

    #[test]
    fn test_storage_failure_surfaces() {
        let prefs = Arc::new(CountingPrefs::failing());
        let registry = Registry::new(prefs);
        let store = registry.get_or_create("song");

        let err = store.set_title(Some("x".into())).unwrap_err();
        assert!(matches!(err, RegistryError::Storage(_)));
        assert_eq!(store.title().as_deref(), Some("x"));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::prefs::MemoryPrefs;
    use proptest::prelude::*;

    fn arb_overrides() -> impl Strategy<Value = SongOverrides> {
        (
            proptest::option::of("[a-zA-Z0-9 ]{0,12}"),
            proptest::option::of(any::<u32>()),
            proptest::option::of("[a-z]{1,4}:[0-9]{1,6}"),
            proptest::option::of(-5_000i64..5_000),
        )
            .prop_map(|(title, accent_color, lyrics_source_id, lyrics_sync_offset_ms)| {
                SongOverrides {
                    title,
                    accent_color,
                    lyrics_source_id,
                    lyrics_sync_offset_ms,
                }
            })
    }

    fn arb_value(field: OverrideField) -> BoxedStrategy<Option<OverrideValue>> {
        match field.kind() {
            ValueKind::Text => proptest::option::of("[ab]{0,2}".prop_map(OverrideValue::Text)).boxed(),
            ValueKind::Color => proptest::option::of((0u32..3).prop_map(OverrideValue::Color)).boxed(),
            ValueKind::Millis => proptest::option::of((-2i64..2).prop_map(OverrideValue::Millis)).boxed(),
        }
    }

    fn arb_op() -> impl Strategy<Value = (OverrideField, Option<OverrideValue>)> {
        proptest::sample::select(OverrideField::ALL.to_vec())
            .prop_flat_map(|field| arb_value(field).prop_map(move |v| (field, v)))
    }

    proptest! {
        /// is_default holds exactly when every field is unset
        #[test]
        fn is_default_iff_all_none(overrides in arb_overrides()) {
            let all_none = OverrideField::ALL.iter().all(|f| f.get(&overrides).is_none());
            prop_assert_eq!(overrides.is_default(), all_none);
        }

        /// Save then load keeps every customized record and drops default ones
        #[test]
        fn save_load_roundtrip(records in proptest::collection::btree_map("[a-z]{1,6}", arb_overrides(), 0..8)) {
            let registry = Registry::in_memory();
            for (id, overrides) in &records {
                let store = registry.get_or_create(id);
                for field in OverrideField::ALL {
                    store.set(field, field.get(overrides)).unwrap();
                }
            }

            let prefs = MemoryPrefs::new();
            registry.save(&prefs).unwrap();
            let loaded = Registry::decode(prefs.get(REGISTRY_KEY).unwrap().as_deref()).unwrap();

            let expected: BTreeMap<String, SongOverrides> = records
                .into_iter()
                .filter(|(_, o)| !o.is_default())
                .collect();
            prop_assert_eq!(loaded.customized(), expected.clone());
            prop_assert_eq!(loaded.len(), expected.len());
        }

        /// Setting a field to its current value never notifies or persists
        #[test]
        fn unchanged_set_is_silent(ops in proptest::collection::vec(arb_op(), 1..40)) {
            let prefs = Arc::new(crate::test_utils::CountingPrefs::default());
            let registry = Registry::new(prefs.clone());
            let store = registry.get_or_create("song");
            let mut receivers: Vec<_> = OverrideField::ALL.iter().map(|f| store.subscribe(*f)).collect();

            for (field, value) in ops {
                let before = store.get(field);
                let writes = prefs.writes();
                for rx in receivers.iter_mut() {
                    let _ = rx.borrow_and_update();
                }

                let changed = store.set(field, value.clone()).unwrap();

                prop_assert_eq!(changed, before != value);
                prop_assert_eq!(prefs.writes(), writes + usize::from(changed));
                for (i, rx) in receivers.iter().enumerate() {
                    let expect = changed && i == field.index();
                    prop_assert_eq!(rx.has_changed().unwrap(), expect);
                }
            }
        }
    }
}
