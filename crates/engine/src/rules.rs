//! Derived-rule engine
//!
//! Subscribes to `rating_changed` and keeps bound track capacities
//! consistent with their source ratings (Health tracks Stamina, Willpower
//! tracks Resolve + Composure). The edge is one-way: a resize announces
//! itself as `track_resized` for rendering adapters, but no binding listens
//! to that topic, so recompute cycles are ruled out statically.

use std::sync::{Arc, Weak};

use sheetbldr_domain::{DerivedBinding, SheetEvent};

use crate::bus::{EmitOptions, EventBus, ListenerId, SubscribeOptions};
use crate::error::HandlerError;
use crate::state::{self, SharedSheet};

/// Runs before other listeners so downstream consumers observe a sheet
/// whose derived capacities are already settled.
pub const RECOMPUTE_PRIORITY: i32 = 100;

pub struct DerivedRuleEngine {
    bindings: Vec<DerivedBinding>,
    sheet: SharedSheet,
}

impl DerivedRuleEngine {
    pub fn new(sheet: SharedSheet, bindings: Vec<DerivedBinding>) -> Arc<Self> {
        Arc::new(Self { bindings, sheet })
    }

    /// The standard Health/Willpower bindings.
    pub fn standard(sheet: SharedSheet) -> Arc<Self> {
        Self::new(sheet, DerivedBinding::standard())
    }

    pub fn bindings(&self) -> &[DerivedBinding] {
        &self.bindings
    }

    /// Subscribe to rating changes on `bus`. The bus is captured weakly so
    /// the listener's re-emit does not keep the bus alive through a cycle.
    pub fn attach(self: &Arc<Self>, bus: &Arc<EventBus>) -> ListenerId {
        let engine = Arc::clone(self);
        let weak_bus: Weak<EventBus> = Arc::downgrade(bus);
        bus.on(
            "rating_changed",
            SubscribeOptions {
                priority: RECOMPUTE_PRIORITY,
                component: None,
            },
            Arc::new(move |envelope| {
                let SheetEvent::RatingChanged { field, .. } = &envelope.payload else {
                    return Ok(());
                };
                engine.on_rating_changed(field, weak_bus.upgrade())
            }),
        )
    }

    fn on_rating_changed(
        &self,
        field: &str,
        bus: Option<Arc<EventBus>>,
    ) -> Result<(), HandlerError> {
        for binding in self.bindings.iter().filter(|b| b.depends_on(field)) {
            let (values, old_max) = {
                let sheet = state::read(&self.sheet);
                let mut values = Vec::with_capacity(binding.sources.len());
                for source in &binding.sources {
                    values.push(sheet.rating_value(source).ok_or_else(|| {
                        HandlerError::failed(format!(
                            "derived binding source {source} missing from sheet"
                        ))
                    })?);
                }
                let old_max = match binding.target {
                    sheetbldr_domain::TrackKind::Health => sheet.health().max(),
                    sheetbldr_domain::TrackKind::Willpower => sheet.willpower().max(),
                    sheetbldr_domain::TrackKind::Humanity => {
                        return Err(HandlerError::failed("humanity cannot be a binding target"))
                    }
                };
                (values, old_max)
            };

            let new_max = binding.formula.apply(&values);
            if new_max == old_max {
                continue;
            }

            let event = state::write(&self.sheet)
                .resize_track(binding.target, new_max)
                .map_err(|e| HandlerError::failed(e.to_string()))?;
            tracing::debug!(
                track = binding.target.field_name(),
                old_max,
                new_max,
                "derived capacity recomputed"
            );
            if let Some(bus) = &bus {
                bus.emit(event.event_type(), event, EmitOptions::default());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetbldr_domain::{CharacterId, CharacterSheet, TrackKind};

    fn wired() -> (Arc<EventBus>, SharedSheet) {
        let bus = EventBus::new(16);
        let sheet = state::shared(CharacterSheet::new(CharacterId::new()));
        let engine = DerivedRuleEngine::standard(sheet.clone());
        engine.attach(&bus);
        (bus, sheet)
    }

    fn click_rating(bus: &Arc<EventBus>, sheet: &SharedSheet, field: &str, index: u8) {
        let event = state::write(sheet).click_rating(field, index).unwrap();
        bus.emit(event.event_type(), event, EmitOptions::default());
    }

    #[test]
    fn test_stamina_resizes_health() {
        let (bus, sheet) = wired();
        // Stamina 1 -> 2: Health max becomes 5.
        click_rating(&bus, &sheet, "stamina", 1);
        assert_eq!(state::read(&sheet).health().max(), 5);
        // Stamina 2 -> 4: Health max becomes 7.
        click_rating(&bus, &sheet, "stamina", 3);
        assert_eq!(state::read(&sheet).health().max(), 7);
    }

    #[test]
    fn test_resize_preserves_existing_damage() {
        let (bus, sheet) = wired();
        click_rating(&bus, &sheet, "stamina", 1); // Health max 5
        {
            let mut sheet = state::write(&sheet);
            sheet.click_track(TrackKind::Health, 0).unwrap();
            sheet.click_track(TrackKind::Health, 1).unwrap();
        }
        click_rating(&bus, &sheet, "stamina", 3); // Health max 7
        let sheet = state::read(&sheet);
        assert_eq!(sheet.health().max(), 7);
        assert_eq!(sheet.health().superficial(), 2);
        assert_eq!(sheet.health().current(), 5);
    }

    #[test]
    fn test_willpower_sums_resolve_and_composure() {
        let (bus, sheet) = wired();
        click_rating(&bus, &sheet, "resolve", 2); // resolve 3
        click_rating(&bus, &sheet, "composure", 1); // composure 2
        assert_eq!(state::read(&sheet).willpower().max(), 5);
    }

    #[test]
    fn test_unrelated_rating_does_not_resize() {
        let (bus, sheet) = wired();
        click_rating(&bus, &sheet, "charisma", 4);
        let sheet = state::read(&sheet);
        assert_eq!(sheet.health().max(), 4);
        assert_eq!(sheet.willpower().max(), 2);
    }

    #[test]
    fn test_resize_emits_track_resized_but_never_recurses() {
        let (bus, sheet) = wired();
        let resized = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        {
            let resized = resized.clone();
            bus.on(
                "track_resized",
                SubscribeOptions::default(),
                Arc::new(move |_| {
                    resized.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Ok(())
                }),
            );
        }
        click_rating(&bus, &sheet, "stamina", 4);
        assert_eq!(resized.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(state::read(&sheet).health().max(), 8);
    }
}
