//! SQLite snapshot store.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::str::FromStr;

use sheetbldr_domain::{CharacterId, Snapshot};

use crate::error::StoreError;
use crate::store::ports::{CharacterStore, SettingsStore};

const ACTIVE_CHARACTER_KEY: &str = "active_character";

/// Snapshot storage backed by SQLite. Also serves as the generic key-value
/// settings fallback.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `url` and ensure the schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect(url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Self::new(pool).await.map_err(|e| StoreError::Database(e.to_string()))
    }

    pub async fn new(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS characters (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                data TEXT NOT NULL,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
        "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
        "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl CharacterStore for SqliteStore {
    async fn save(&self, id: CharacterId, snapshot: &Snapshot) -> Result<(), StoreError> {
        let data = serde_json::to_string(snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let name = snapshot.scalar("name").unwrap_or_default();

        sqlx::query(
            "INSERT OR REPLACE INTO characters (id, name, data, updated_at) VALUES (?, ?, ?, CURRENT_TIMESTAMP)",
        )
        .bind(id.to_string())
        .bind(name)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn set_current(&self, id: CharacterId) -> Result<(), StoreError> {
        self.set_setting(ACTIVE_CHARACTER_KEY, &id.to_string()).await
    }

    async fn load_current(&self) -> Result<Option<(CharacterId, Snapshot)>, StoreError> {
        let Some(active) = self.get_setting(ACTIVE_CHARACTER_KEY).await? else {
            return Ok(None);
        };
        let id = CharacterId::from_str(&active)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let row: Option<(String,)> = sqlx::query_as("SELECT data FROM characters WHERE id = ?")
            .bind(active)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        match row {
            Some((data,)) => {
                let snapshot = serde_json::from_str(&data)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some((id, snapshot)))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SettingsStore for SqliteStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(row.map(|(value,)| value))
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}
