//! Per-song override store with change notification.

use parking_lot::Mutex;
use std::sync::Weak;
use tokio::sync::watch;

use super::fields::{OverrideField, OverrideValue, SongOverrides};
use super::{RegistryError, RegistryShared};

/// Sparse override record for one song, plus observers for each field.
///
/// Created through [`Registry::get_or_create`](super::Registry::get_or_create).
/// Every effective change persists the owning registry before `set` returns.
pub struct OverrideStore {
    id: String,
    overrides: Mutex<SongOverrides>,
    watchers: [watch::Sender<Option<OverrideValue>>; OverrideField::COUNT],
    owner: Weak<RegistryShared>,
}

impl OverrideStore {
    pub(super) fn new(id: String, overrides: SongOverrides, owner: Weak<RegistryShared>) -> Self {
        let watchers = std::array::from_fn(|i| {
            let (tx, _rx) = watch::channel(OverrideField::ALL[i].get(&overrides));
            tx
        });
        Self {
            id,
            overrides: Mutex::new(overrides),
            watchers,
            owner,
        }
    }

    /// A store that belongs to no registry and never persists.
    pub fn detached(id: impl Into<String>) -> Self {
        Self::new(id.into(), SongOverrides::default(), Weak::new())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current override for `field`, or `None` to fall back to canonical data.
    pub fn get(&self, field: OverrideField) -> Option<OverrideValue> {
        field.get(&self.overrides.lock())
    }

    /// Copy of the whole record.
    pub fn snapshot(&self) -> SongOverrides {
        self.overrides.lock().clone()
    }

    /// True when no field is overridden.
    pub fn is_default(&self) -> bool {
        self.overrides.lock().is_default()
    }

    /// Set (or with `None`, clear) an override.
    ///
    /// Returns `Ok(false)` without notifying or persisting when the value is
    /// unchanged. Otherwise stores it, notifies the field's observers and
    /// persists the owning registry. A persist failure is returned, but the
    /// in-memory value stays changed.
    pub fn set(
        &self,
        field: OverrideField,
        value: Option<OverrideValue>,
    ) -> Result<bool, RegistryError> {
        {
            let mut overrides = self.overrides.lock();
            if field.get(&overrides) == value {
                return Ok(false);
            }
            field.set(&mut overrides, value.clone())?;
            // Notified under the lock so observers see changes in store order.
            self.watchers[field.index()].send_replace(value);
        }

        tracing::debug!(target: "registry", id = %self.id, %field, "Override changed");

        if let Some(owner) = self.owner.upgrade() {
            owner.persist()?;
        }
        Ok(true)
    }

    /// Observe one field. The receiver starts at the current value.
    pub fn subscribe(&self, field: OverrideField) -> watch::Receiver<Option<OverrideValue>> {
        self.watchers[field.index()].subscribe()
    }

    pub fn title(&self) -> Option<String> {
        self.overrides.lock().title.clone()
    }

    pub fn set_title(&self, title: Option<String>) -> Result<bool, RegistryError> {
        self.set(OverrideField::Title, title.map(OverrideValue::Text))
    }

    pub fn accent_color(&self) -> Option<u32> {
        self.overrides.lock().accent_color
    }

    pub fn set_accent_color(&self, argb: Option<u32>) -> Result<bool, RegistryError> {
        self.set(OverrideField::AccentColor, argb.map(OverrideValue::Color))
    }

    pub fn lyrics_source_id(&self) -> Option<String> {
        self.overrides.lock().lyrics_source_id.clone()
    }

    pub fn set_lyrics_source_id(&self, id: Option<String>) -> Result<bool, RegistryError> {
        self.set(OverrideField::LyricsSourceId, id.map(OverrideValue::Text))
    }

    pub fn lyrics_sync_offset_ms(&self) -> Option<i64> {
        self.overrides.lock().lyrics_sync_offset_ms
    }

    pub fn set_lyrics_sync_offset_ms(&self, offset: Option<i64>) -> Result<bool, RegistryError> {
        self.set(OverrideField::LyricsSyncOffset, offset.map(OverrideValue::Millis))
    }
}

impl std::fmt::Debug for OverrideStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideStore")
            .field("id", &self.id)
            .field("overrides", &*self.overrides.lock())
            .finish()
    }
}
