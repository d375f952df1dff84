//! Storage port traits.
//!
//! The coordinator and codec only see these interfaces; adapters live next
//! door. Mocks are generated for tests.

use async_trait::async_trait;

use sheetbldr_domain::{CharacterId, Snapshot};

use crate::error::StoreError;

/// Persists whole-sheet snapshots keyed by character.
///
/// Writes are keyed, and only `set_current` moves the active-character
/// pointer, so a save that resolves after a character switch can neither
/// land on the newly active character's record nor steal the pointer back.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CharacterStore: Send + Sync {
    /// Commit a snapshot for `id`.
    async fn save(&self, id: CharacterId, snapshot: &Snapshot) -> Result<(), StoreError>;

    /// Mark `id` as the active character for `load_current`.
    async fn set_current(&self, id: CharacterId) -> Result<(), StoreError>;

    /// Load the active character's snapshot, if one was ever saved.
    async fn load_current(&self) -> Result<Option<(CharacterId, Snapshot)>, StoreError>;
}

/// Generic key-value settings fallback.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Reference data behind asynchronously populated dropdowns.
///
/// During load, a scalar bound to one of these fields is retried a bounded
/// number of times until its option exists, then silently skipped.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OptionCatalog: Send + Sync {
    /// True when `field` is backed by reference data.
    fn is_reference_field(&self, field: &str) -> bool;

    /// True once `value` is an available option for `field`.
    async fn has_option(&self, field: &str, value: &str) -> bool;
}

/// Catalog with a fixed option set, always fully hydrated. The engine
/// default: no field is reference-backed unless configured.
#[derive(Default)]
pub struct StaticOptionCatalog {
    options: std::collections::HashMap<String, Vec<String>>,
}

impl StaticOptionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(
        mut self,
        field: impl Into<String>,
        options: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.options
            .insert(field.into(), options.into_iter().map(Into::into).collect());
        self
    }
}

#[async_trait]
impl OptionCatalog for StaticOptionCatalog {
    fn is_reference_field(&self, field: &str) -> bool {
        self.options.contains_key(field)
    }

    async fn has_option(&self, field: &str, value: &str) -> bool {
        self.options
            .get(field)
            .is_some_and(|opts| opts.iter().any(|o| o == value))
    }
}
