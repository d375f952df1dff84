//! SheetBldr Engine library.
//!
//! The trait state & synchronization engine behind the character sheet:
//!
//! - `bus` - synchronous, priority-ordered pub/sub backbone
//! - `rules` - derived bindings keeping track capacities consistent
//! - `codec` - live state <-> snapshot bridge with resilient hydration
//! - `coordinator` - debounced, race-safe persistence pipeline
//! - `store` - storage ports + SQLite/in-memory adapters
//! - `context` - explicit dependency wiring and the application bridge

pub mod bus;
pub mod codec;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod export;
pub mod rules;
pub mod state;
pub mod store;

/// Cross-module scenario tests.
#[cfg(test)]
mod e2e_tests;

pub use bus::{EmitOptions, EventBus, EventEnvelope, EventRecord, ListenerId, SubscribeOptions};
pub use codec::SnapshotCodec;
pub use collaborators::{standard_registry, BlobSection, CollaboratorRegistry, TraitCollaborator};
pub use config::EngineConfig;
pub use context::SheetContext;
pub use coordinator::PersistenceCoordinator;
pub use error::{EngineError, HandlerError, StoreError};
pub use export::{parse_import, JsonExporter, SheetExport};
pub use rules::DerivedRuleEngine;
pub use state::{shared, SharedSheet};
pub use store::{CharacterStore, MemoryStore, OptionCatalog, SettingsStore, SqliteStore, StaticOptionCatalog};
