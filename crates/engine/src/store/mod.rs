//! Storage ports and adapters.

pub mod memory;
pub mod ports;
pub mod sqlite;

pub use memory::MemoryStore;
pub use ports::{CharacterStore, OptionCatalog, SettingsStore, StaticOptionCatalog};
pub use sqlite::SqliteStore;
