//! Engine configuration
//!
//! Operational knobs for the synchronization engine. Every value has a
//! compiled default; environment variables (loaded through `.env` when
//! present) only override.

use std::time::Duration;

/// Runtime configuration for the sheet engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Quiescence window before a dirty sheet is persisted.
    pub debounce_ms: u64,
    /// Capacity of the event bus diagnostic ring buffer.
    pub history_capacity: usize,
    /// How many times a reference-data field is retried during load.
    pub hydration_attempts: u32,
    /// Fixed delay between hydration attempts.
    pub hydration_delay_ms: u64,
    /// SQLite database URL for the snapshot store.
    pub database_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            history_capacity: 64,
            hydration_attempts: 5,
            hydration_delay_ms: 100,
            database_url: "sqlite::memory:".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        // Best-effort .env load; absence is not an error.
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        Self {
            debounce_ms: env_parse("SHEETBLDR_DEBOUNCE_MS", defaults.debounce_ms),
            history_capacity: env_parse("SHEETBLDR_EVENT_HISTORY", defaults.history_capacity),
            hydration_attempts: env_parse(
                "SHEETBLDR_HYDRATION_ATTEMPTS",
                defaults.hydration_attempts,
            ),
            hydration_delay_ms: env_parse(
                "SHEETBLDR_HYDRATION_DELAY_MS",
                defaults.hydration_delay_ms,
            ),
            database_url: std::env::var("SHEETBLDR_DATABASE_URL")
                .unwrap_or(defaults.database_url),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn hydration_delay(&self) -> Duration {
        Duration::from_millis(self.hydration_delay_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
