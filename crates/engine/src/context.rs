//! Application composition.
//!
//! `SheetContext` is the explicit dependency container: it constructs and
//! wires the bus, the live sheet, the derived-rule engine, the codec, and
//! the persistence coordinator, and exposes the interaction entry points
//! plus the `gather_character_data` / `load_character_data` bridge the rest
//! of the application calls. Nothing reads ambient globals; collaborating
//! panels receive the context (or pieces of it) by injection.

use std::sync::Arc;

use sheetbldr_domain::{CharacterId, CharacterSheet, SheetEvent, Snapshot, TrackKind};

use crate::bus::{EmitOptions, EventBus, EventRecord};
use crate::codec::SnapshotCodec;
use crate::collaborators::{standard_registry, CollaboratorRegistry};
use crate::config::EngineConfig;
use crate::coordinator::PersistenceCoordinator;
use crate::error::EngineError;
use crate::export::JsonExporter;
use crate::rules::DerivedRuleEngine;
use crate::state::{self, SharedSheet};
use crate::store::{CharacterStore, OptionCatalog};

pub struct SheetContext {
    config: EngineConfig,
    bus: Arc<EventBus>,
    sheet: SharedSheet,
    registry: Arc<CollaboratorRegistry>,
    codec: Arc<SnapshotCodec>,
    rules: Arc<DerivedRuleEngine>,
    coordinator: Arc<PersistenceCoordinator>,
    store: Arc<dyn CharacterStore>,
}

impl SheetContext {
    /// Compose the engine against the given storage backend and reference
    /// catalog, restoring the last active character when the store has one.
    pub async fn new(
        config: EngineConfig,
        store: Arc<dyn CharacterStore>,
        catalog: Arc<dyn OptionCatalog>,
    ) -> Result<Self, EngineError> {
        let restored = store.load_current().await?;
        let (id, restore_snapshot) = match restored {
            Some((id, snapshot)) => (id, Some(snapshot)),
            None => (CharacterId::new(), None),
        };

        let bus = EventBus::new(config.history_capacity);
        let sheet = state::shared(CharacterSheet::new(id));
        let registry = standard_registry();
        let codec = SnapshotCodec::new(sheet.clone(), registry.clone(), catalog, &config);
        let rules = DerivedRuleEngine::standard(sheet.clone());
        let _ = rules.attach(&bus);
        let coordinator =
            PersistenceCoordinator::spawn(store.clone(), codec.clone(), config.debounce());
        let _ = coordinator.attach(&bus);

        let context = Self {
            config,
            bus,
            sheet,
            registry,
            codec,
            rules,
            coordinator,
            store,
        };

        match restore_snapshot {
            Some(snapshot) => context.load_character_data(&snapshot).await?,
            None => context.store.set_current(id).await?,
        }
        tracing::info!(character = %id, "sheet context ready");
        Ok(context)
    }

    // =========================================================================
    // Interaction entry points
    // =========================================================================

    /// Click dot `index` of a named rating.
    pub fn click_rating(&self, field: &str, index: u8) -> Result<(), EngineError> {
        let event = state::write(&self.sheet).click_rating(field, index)?;
        self.emit(event);
        Ok(())
    }

    /// Click box `position` of a track.
    pub fn click_track(&self, kind: TrackKind, position: u8) -> Result<(), EngineError> {
        let event = state::write(&self.sheet).click_track(kind, position)?;
        self.emit(event);
        Ok(())
    }

    pub fn set_scalar(&self, field: &str, value: &str) -> Result<(), EngineError> {
        let event = state::write(&self.sheet).set_scalar(field, value)?;
        self.emit(event);
        Ok(())
    }

    pub fn set_locked(&self, locked: bool) {
        let event = state::write(&self.sheet).set_locked(locked);
        self.emit(event);
    }

    /// Add one corruption stain to the humanity track.
    pub fn add_stain(&self) {
        let event = state::write(&self.sheet).add_stain();
        self.emit(event);
    }

    fn emit(&self, event: SheetEvent) {
        self.bus
            .emit(event.event_type(), event, EmitOptions::default());
    }

    // =========================================================================
    // The bridge collaborating panels call
    // =========================================================================

    /// Read the complete sheet state as a snapshot.
    pub fn gather_character_data(&self) -> Snapshot {
        self.codec.gather()
    }

    /// Replace the complete sheet state from a snapshot (all-or-nothing for
    /// primitive fields).
    pub async fn load_character_data(&self, snapshot: &Snapshot) -> Result<(), EngineError> {
        self.codec.load(snapshot).await?;
        self.bus.emit(
            SheetEvent::SheetLoaded.event_type(),
            SheetEvent::SheetLoaded,
            EmitOptions::default(),
        );
        Ok(())
    }

    /// Discard the current sheet and switch to `id`, hydrating from
    /// `snapshot` when given. Pending persistence for the old character is
    /// canceled; an in-flight save resolves against its own key and is then
    /// discarded.
    pub async fn switch_character(
        &self,
        id: CharacterId,
        snapshot: Option<&Snapshot>,
    ) -> Result<(), EngineError> {
        self.coordinator.set_active_character(id);
        *state::write(&self.sheet) = CharacterSheet::new(id);
        if let Some(snapshot) = snapshot {
            self.load_character_data(snapshot).await?;
        } else {
            self.bus.emit(
                SheetEvent::SheetLoaded.event_type(),
                SheetEvent::SheetLoaded,
                EmitOptions::default(),
            );
        }
        self.store.set_current(id).await?;
        tracing::info!(character = %id, "switched active character");
        Ok(())
    }

    // =========================================================================
    // Lifecycle & accessors
    // =========================================================================

    /// Force a save now and wait for storage to settle.
    pub async fn flush(&self) {
        self.coordinator.flush().await;
    }

    /// Flush and stop the persistence worker.
    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn sheet(&self) -> &SharedSheet {
        &self.sheet
    }

    pub fn registry(&self) -> &Arc<CollaboratorRegistry> {
        &self.registry
    }

    pub fn rules(&self) -> &Arc<DerivedRuleEngine> {
        &self.rules
    }

    pub fn exporter(&self) -> JsonExporter {
        JsonExporter::new(self.codec.clone())
    }

    /// Recent bus emissions, for diagnostics.
    pub fn recent_events(&self) -> Vec<EventRecord> {
        self.bus.recent()
    }
}
