//! Trait collaborators - external owners of non-primitive sheet sections.
//!
//! Disciplines, merits, backgrounds, and the like are managed by dedicated
//! panels elsewhere in the application. The codec only needs a symmetric
//! `export` / `load` pair per section, registered in a static registry
//! populated at startup (no runtime discovery).

use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use serde_json::Value;

use crate::error::EngineError;

/// A per-domain trait manager the codec delegates a snapshot section to.
pub trait TraitCollaborator: Send + Sync {
    /// Snapshot field name this collaborator owns.
    fn section(&self) -> &str;

    /// Serialize the section's current state.
    fn export(&self) -> Value;

    /// Replace the section's state from a snapshot blob.
    fn load(&self, data: &Value) -> Result<(), EngineError>;
}

/// Static name -> collaborator registry.
#[derive(Default)]
pub struct CollaboratorRegistry {
    sections: DashMap<String, Arc<dyn TraitCollaborator>>,
}

impl CollaboratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collaborator under its section name. Re-registering a
    /// section replaces the previous owner.
    pub fn register(&self, collaborator: Arc<dyn TraitCollaborator>) {
        self.sections
            .insert(collaborator.section().to_string(), collaborator);
    }

    pub fn get(&self, section: &str) -> Option<Arc<dyn TraitCollaborator>> {
        self.sections.get(section).map(|entry| entry.value().clone())
    }

    /// Registered section names, sorted for deterministic gather order.
    pub fn sections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// In-memory collaborator holding an opaque JSON blob. The engine ships
/// these for the standard sections so gather/load exercise the registry even
/// before the real panels register their managers.
pub struct BlobSection {
    section: String,
    data: RwLock<Value>,
}

impl BlobSection {
    pub fn new(section: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            section: section.into(),
            data: RwLock::new(Value::Null),
        })
    }

    pub fn snapshot(&self) -> Value {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TraitCollaborator for BlobSection {
    fn section(&self) -> &str {
        &self.section
    }

    fn export(&self) -> Value {
        self.snapshot()
    }

    fn load(&self, data: &Value) -> Result<(), EngineError> {
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = data.clone();
        Ok(())
    }
}

/// The standard per-domain sections of a sheet.
pub const STANDARD_SECTIONS: [&str; 6] = [
    "disciplines",
    "merits_flaws",
    "backgrounds",
    "loresheets",
    "convictions",
    "experience",
];

/// Registry pre-populated with blob collaborators for the standard sections.
pub fn standard_registry() -> Arc<CollaboratorRegistry> {
    let registry = CollaboratorRegistry::new();
    for section in STANDARD_SECTIONS {
        registry.register(BlobSection::new(section));
    }
    Arc::new(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_sections() {
        let registry = standard_registry();
        assert_eq!(registry.len(), 6);
        assert!(registry.get("disciplines").is_some());
        assert!(registry.get("spells").is_none());
    }

    #[test]
    fn test_blob_section_roundtrip() {
        let section = BlobSection::new("merits_flaws");
        let data = serde_json::json!([{"name": "Iron Will", "dots": 3}]);
        section.load(&data).unwrap();
        assert_eq!(section.export(), data);
    }

    #[test]
    fn test_register_replaces_owner() {
        let registry = CollaboratorRegistry::new();
        registry.register(BlobSection::new("experience"));
        let replacement = BlobSection::new("experience");
        replacement
            .load(&serde_json::json!({"total": 35, "spent": 12}))
            .unwrap();
        registry.register(replacement);
        assert_eq!(registry.len(), 1);
        let owner = registry.get("experience").unwrap();
        assert_eq!(owner.export()["total"], 35);
    }
}
