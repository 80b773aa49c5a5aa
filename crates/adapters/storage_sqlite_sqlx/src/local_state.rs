//! `SQLite` implementation of [`LocalStateStore`].

use std::future::Future;

use chrono::{DateTime, SecondsFormat};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use signage_app::ports::LocalStateStore;
use signage_domain::error::SignageError;
use signage_domain::id::{DeviceId, PairingCode};
use signage_domain::pairing::PairingState;
use signage_domain::time::{self, Timestamp};

use crate::error::StorageError;

/// Wrapper for converting a `pairing_code` row into a domain [`PairingState`].
struct Wrapper(PairingState);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let code: String = row.try_get("code")?;
        let created_at: String = row.try_get("created_at")?;

        let created_at = parse_timestamp(&created_at)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(PairingState::new(PairingCode::new(code), created_at)))
    }
}

fn parse_timestamp(value: &str) -> Result<Timestamp, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.to_utc())
        .map_err(|_| StorageError::Timestamp(value.to_string()))
}

fn format_timestamp(value: Timestamp) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

const SELECT_DEVICE: &str = "SELECT device_id FROM device_identity WHERE slot = 1";
const UPSERT_DEVICE: &str = "INSERT INTO device_identity (slot, device_id, bound_at) VALUES (1, ?, ?) \
     ON CONFLICT(slot) DO UPDATE SET device_id = excluded.device_id, bound_at = excluded.bound_at";
const DELETE_DEVICE: &str = "DELETE FROM device_identity WHERE slot = 1";

const SELECT_PAIRING: &str = "SELECT code, created_at FROM pairing_code WHERE slot = 1";
const UPSERT_PAIRING: &str = "INSERT INTO pairing_code (slot, code, created_at) VALUES (1, ?, ?) \
     ON CONFLICT(slot) DO UPDATE SET code = excluded.code, created_at = excluded.created_at";
const DELETE_PAIRING: &str = "DELETE FROM pairing_code WHERE slot = 1";

/// `SQLite`-backed device identity and pairing code.
#[derive(Debug, Clone)]
pub struct SqliteLocalState {
    pool: SqlitePool,
}

impl SqliteLocalState {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl LocalStateStore for SqliteLocalState {
    fn load_device_id(
        &self,
    ) -> impl Future<Output = Result<Option<DeviceId>, SignageError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<(String,)> = sqlx::query_as(SELECT_DEVICE)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|(id,)| DeviceId::new(id)))
        }
    }

    fn save_device_id(
        &self,
        device_id: Option<&DeviceId>,
    ) -> impl Future<Output = Result<(), SignageError>> + Send {
        let pool = self.pool.clone();
        let device_id = device_id.cloned();
        async move {
            match device_id {
                Some(id) => {
                    sqlx::query(UPSERT_DEVICE)
                        .bind(id.as_str())
                        .bind(format_timestamp(time::now()))
                        .execute(&pool)
                        .await
                        .map_err(StorageError::from)?;
                    tracing::debug!(device_id = %id, "device identity stored");
                }
                None => {
                    sqlx::query(DELETE_DEVICE)
                        .execute(&pool)
                        .await
                        .map_err(StorageError::from)?;
                    tracing::debug!("device identity cleared");
                }
            }
            Ok(())
        }
    }

    fn load_pairing(
        &self,
    ) -> impl Future<Output = Result<Option<PairingState>, SignageError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_PAIRING)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|w| w.0))
        }
    }

    fn save_pairing(
        &self,
        pairing: Option<&PairingState>,
    ) -> impl Future<Output = Result<(), SignageError>> + Send {
        let pool = self.pool.clone();
        let pairing = pairing.cloned();
        async move {
            match pairing {
                Some(state) => {
                    sqlx::query(UPSERT_PAIRING)
                        .bind(state.code.as_str())
                        .bind(format_timestamp(state.created_at))
                        .execute(&pool)
                        .await
                        .map_err(StorageError::from)?;
                }
                None => {
                    sqlx::query(DELETE_PAIRING)
                        .execute(&pool)
                        .await
                        .map_err(StorageError::from)?;
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use chrono::TimeZone;

    async fn setup() -> SqliteLocalState {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteLocalState::new(db.pool().clone())
    }

    fn pairing(code: &str) -> PairingState {
        let created_at = chrono::Utc
            .with_ymd_and_hms(2026, 3, 2, 8, 30, 15)
            .unwrap();
        PairingState::new(PairingCode::new(code), created_at)
    }

    // ── Device identity ──

    #[tokio::test]
    async fn should_return_none_when_no_device_is_bound() {
        let store = setup().await;
        assert!(store.load_device_id().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_store_and_load_device_id() {
        let store = setup().await;
        let id = DeviceId::new("kiosk-1");

        store.save_device_id(Some(&id)).await.unwrap();

        assert_eq!(store.load_device_id().await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn should_overwrite_device_id_when_saved_twice() {
        let store = setup().await;
        store
            .save_device_id(Some(&DeviceId::new("kiosk-1")))
            .await
            .unwrap();
        store
            .save_device_id(Some(&DeviceId::new("kiosk-2")))
            .await
            .unwrap();

        assert_eq!(
            store.load_device_id().await.unwrap(),
            Some(DeviceId::new("kiosk-2"))
        );
    }

    #[tokio::test]
    async fn should_clear_device_id_when_saving_none() {
        let store = setup().await;
        store
            .save_device_id(Some(&DeviceId::new("kiosk-1")))
            .await
            .unwrap();

        store.save_device_id(None).await.unwrap();

        assert!(store.load_device_id().await.unwrap().is_none());
    }

    // ── Pairing code ──

    #[tokio::test]
    async fn should_store_pairing_code_with_creation_time() {
        let store = setup().await;
        let state = pairing("ABC123");

        store.save_pairing(Some(&state)).await.unwrap();

        assert_eq!(store.load_pairing().await.unwrap(), Some(state));
    }

    #[tokio::test]
    async fn should_replace_pending_pairing_code() {
        let store = setup().await;
        store.save_pairing(Some(&pairing("OLD111"))).await.unwrap();
        store.save_pairing(Some(&pairing("NEW222"))).await.unwrap();

        let loaded = store.load_pairing().await.unwrap().unwrap();
        assert_eq!(loaded.code, PairingCode::new("NEW222"));
    }

    #[tokio::test]
    async fn should_clear_pairing_code_when_saving_none() {
        let store = setup().await;
        store.save_pairing(Some(&pairing("ABC123"))).await.unwrap();

        store.save_pairing(None).await.unwrap();

        assert!(store.load_pairing().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_fail_to_load_pairing_when_timestamp_is_corrupt() {
        let store = setup().await;
        sqlx::query("INSERT INTO pairing_code (slot, code, created_at) VALUES (1, 'X', 'yesterday')")
            .execute(&store.pool)
            .await
            .unwrap();

        let err = store.load_pairing().await.unwrap_err();
        assert!(matches!(err, SignageError::StorageUnavailable(_)));
    }

    #[test]
    fn should_keep_millisecond_precision_in_stored_timestamps() {
        let ts = chrono::Utc
            .with_ymd_and_hms(2026, 3, 2, 8, 30, 15)
            .unwrap();
        let text = format_timestamp(ts);
        assert_eq!(text, "2026-03-02T08:30:15.000Z");
        assert_eq!(parse_timestamp(&text).unwrap(), ts);
    }
}
