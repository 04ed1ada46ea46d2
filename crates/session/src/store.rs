//! Sqlite-backed storage for the delegated client.
//!
//! The client library hands all persistence to its embedder through the
//! `wacore` store traits (signal material, app-state sync, device records).
//! Everything lives in one sqlite file under the configured data directory.
//! Built on sqlx rather than the client's optional diesel-based store so the
//! tree links a single sqlite wrapper.

use std::path::Path;

use {
    async_trait::async_trait,
    sqlx::{Pool, Sqlite, SqlitePool},
    wacore::{
        appstate::{hash::HashState, processor::AppStateMutationMAC},
        store::{
            Device,
            error::{StoreError, db_err},
            traits::{
                AppStateSyncKey, AppSyncStore, DeviceListRecord, DeviceStore, LidPnMappingEntry,
                ProtocolStore, SignalStore,
            },
        },
    },
};

type StoreResult<T> = wacore::store::error::Result<T>;

/// Tables holding the delegated session material.
const TABLES: &[&str] = &[
    "signal_identities",
    "signal_sessions",
    "signal_prekeys",
    "signal_signed_prekeys",
    "signal_sender_keys",
    "appsync_keys",
    "appsync_versions",
    "appsync_mutation_macs",
    "group_skdm_recipients",
    "lid_phone_map",
    "session_base_keys",
    "user_device_lists",
    "sender_key_forget_marks",
    "device_snapshot",
];

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS signal_identities (
        address TEXT PRIMARY KEY,
        key_data BLOB NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS signal_sessions (
        address TEXT PRIMARY KEY,
        record BLOB NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS signal_prekeys (
        id INTEGER PRIMARY KEY,
        record BLOB NOT NULL,
        uploaded INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS signal_signed_prekeys (
        id INTEGER PRIMARY KEY,
        record BLOB NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS signal_sender_keys (
        address TEXT PRIMARY KEY,
        record BLOB NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS appsync_keys (
        key_id BLOB PRIMARY KEY,
        key_data BLOB NOT NULL,
        timestamp INTEGER NOT NULL DEFAULT 0,
        fingerprint BLOB NOT NULL DEFAULT x''
    )",
    "CREATE TABLE IF NOT EXISTS appsync_versions (
        collection TEXT PRIMARY KEY,
        state TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS appsync_mutation_macs (
        collection TEXT NOT NULL,
        index_mac BLOB NOT NULL,
        version INTEGER NOT NULL,
        value_mac BLOB NOT NULL,
        PRIMARY KEY (collection, index_mac)
    )",
    "CREATE TABLE IF NOT EXISTS group_skdm_recipients (
        group_jid TEXT NOT NULL,
        device_jid TEXT NOT NULL,
        PRIMARY KEY (group_jid, device_jid)
    )",
    "CREATE TABLE IF NOT EXISTS lid_phone_map (
        lid TEXT PRIMARY KEY,
        phone_number TEXT NOT NULL,
        created_at INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL DEFAULT 0,
        learning_source TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS session_base_keys (
        address TEXT NOT NULL,
        message_id TEXT NOT NULL,
        base_key BLOB NOT NULL,
        PRIMARY KEY (address, message_id)
    )",
    "CREATE TABLE IF NOT EXISTS user_device_lists (
        user TEXT PRIMARY KEY,
        record TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sender_key_forget_marks (
        group_jid TEXT NOT NULL,
        participant TEXT NOT NULL,
        PRIMARY KEY (group_jid, participant)
    )",
    "CREATE TABLE IF NOT EXISTS device_snapshot (
        id INTEGER PRIMARY KEY,
        record BLOB NOT NULL
    )",
];

/// Sqlite store implementing the client library's backend traits.
pub struct SessionStore {
    pool: Pool<Sqlite>,
}

impl SessionStore {
    /// Open (or create) the store at `db_path` and ensure the schema.
    pub async fn open(db_path: &Path) -> crate::error::Result<Self> {
        let pool =
            SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path.display())).await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }

    /// Wipe all session material.
    ///
    /// Called after a logout: the client library will not issue fresh
    /// pairing codes over stale keys.
    pub async fn reset(&self) -> crate::error::Result<()> {
        for table in TABLES {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    // ── Row helpers shared by the trait impls ───────────────────────────────

    async fn blob_where_text(&self, sql: &'static str, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as(sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|(blob,)| blob))
    }

    async fn blob_where_id(&self, sql: &'static str, id: u32) -> StoreResult<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as(sql)
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|(blob,)| blob))
    }

    async fn upsert_text_blob(
        &self,
        sql: &'static str,
        key: &str,
        blob: &[u8],
    ) -> StoreResult<()> {
        sqlx::query(sql)
            .bind(key)
            .bind(blob)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_where_text(&self, sql: &'static str, key: &str) -> StoreResult<()> {
        sqlx::query(sql)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

// ── Signal material ─────────────────────────────────────────────────────────

#[async_trait]
impl SignalStore for SessionStore {
    async fn put_identity(&self, address: &str, key: [u8; 32]) -> StoreResult<()> {
        self.upsert_text_blob(
            "INSERT OR REPLACE INTO signal_identities (address, key_data) VALUES (?, ?)",
            address,
            key.as_slice(),
        )
        .await
    }

    async fn load_identity(&self, address: &str) -> StoreResult<Option<Vec<u8>>> {
        self.blob_where_text(
            "SELECT key_data FROM signal_identities WHERE address = ?",
            address,
        )
        .await
    }

    async fn delete_identity(&self, address: &str) -> StoreResult<()> {
        self.delete_where_text("DELETE FROM signal_identities WHERE address = ?", address)
            .await
    }

    async fn get_session(&self, address: &str) -> StoreResult<Option<Vec<u8>>> {
        self.blob_where_text(
            "SELECT record FROM signal_sessions WHERE address = ?",
            address,
        )
        .await
    }

    async fn put_session(&self, address: &str, session: &[u8]) -> StoreResult<()> {
        self.upsert_text_blob(
            "INSERT OR REPLACE INTO signal_sessions (address, record) VALUES (?, ?)",
            address,
            session,
        )
        .await
    }

    async fn delete_session(&self, address: &str) -> StoreResult<()> {
        self.delete_where_text("DELETE FROM signal_sessions WHERE address = ?", address)
            .await
    }

    async fn store_prekey(&self, id: u32, record: &[u8], uploaded: bool) -> StoreResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO signal_prekeys (id, record, uploaded) VALUES (?, ?, ?)",
        )
        .bind(id as i64)
        .bind(record)
        .bind(uploaded as i32)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn load_prekey(&self, id: u32) -> StoreResult<Option<Vec<u8>>> {
        self.blob_where_id("SELECT record FROM signal_prekeys WHERE id = ?", id)
            .await
    }

    async fn remove_prekey(&self, id: u32) -> StoreResult<()> {
        sqlx::query("DELETE FROM signal_prekeys WHERE id = ?")
            .bind(id as i64)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn store_signed_prekey(&self, id: u32, record: &[u8]) -> StoreResult<()> {
        sqlx::query("INSERT OR REPLACE INTO signal_signed_prekeys (id, record) VALUES (?, ?)")
            .bind(id as i64)
            .bind(record)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn load_signed_prekey(&self, id: u32) -> StoreResult<Option<Vec<u8>>> {
        self.blob_where_id("SELECT record FROM signal_signed_prekeys WHERE id = ?", id)
            .await
    }

    async fn load_all_signed_prekeys(&self) -> StoreResult<Vec<(u32, Vec<u8>)>> {
        let rows: Vec<(i64, Vec<u8>)> =
            sqlx::query_as("SELECT id, record FROM signal_signed_prekeys")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(rows.into_iter().map(|(id, r)| (id as u32, r)).collect())
    }

    async fn remove_signed_prekey(&self, id: u32) -> StoreResult<()> {
        sqlx::query("DELETE FROM signal_signed_prekeys WHERE id = ?")
            .bind(id as i64)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn put_sender_key(&self, address: &str, record: &[u8]) -> StoreResult<()> {
        self.upsert_text_blob(
            "INSERT OR REPLACE INTO signal_sender_keys (address, record) VALUES (?, ?)",
            address,
            record,
        )
        .await
    }

    async fn get_sender_key(&self, address: &str) -> StoreResult<Option<Vec<u8>>> {
        self.blob_where_text(
            "SELECT record FROM signal_sender_keys WHERE address = ?",
            address,
        )
        .await
    }

    async fn delete_sender_key(&self, address: &str) -> StoreResult<()> {
        self.delete_where_text("DELETE FROM signal_sender_keys WHERE address = ?", address)
            .await
    }
}

// ── App-state sync ──────────────────────────────────────────────────────────

#[async_trait]
impl AppSyncStore for SessionStore {
    async fn get_sync_key(&self, key_id: &[u8]) -> StoreResult<Option<AppStateSyncKey>> {
        let row: Option<(Vec<u8>, i64, Vec<u8>)> = sqlx::query_as(
            "SELECT key_data, timestamp, fingerprint FROM appsync_keys WHERE key_id = ?",
        )
        .bind(key_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(|(key_data, timestamp, fingerprint)| AppStateSyncKey {
            key_data,
            timestamp,
            fingerprint,
        }))
    }

    async fn set_sync_key(&self, key_id: &[u8], key: AppStateSyncKey) -> StoreResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO appsync_keys (key_id, key_data, timestamp, fingerprint) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(key_id)
        .bind(&key.key_data)
        .bind(key.timestamp)
        .bind(&key.fingerprint)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_version(&self, name: &str) -> StoreResult<HashState> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT state FROM appsync_versions WHERE collection = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        match row {
            Some((state,)) => {
                serde_json::from_str(&state).map_err(|e| StoreError::Serialization(e.to_string()))
            },
            None => Ok(HashState::default()),
        }
    }

    async fn set_version(&self, name: &str, state: HashState) -> StoreResult<()> {
        let state =
            serde_json::to_string(&state).map_err(|e| StoreError::Serialization(e.to_string()))?;
        sqlx::query("INSERT OR REPLACE INTO appsync_versions (collection, state) VALUES (?, ?)")
            .bind(name)
            .bind(&state)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn put_mutation_macs(
        &self,
        name: &str,
        version: u64,
        mutations: &[AppStateMutationMAC],
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for mutation in mutations {
            sqlx::query(
                "INSERT OR REPLACE INTO appsync_mutation_macs \
                 (collection, index_mac, version, value_mac) VALUES (?, ?, ?, ?)",
            )
            .bind(name)
            .bind(&mutation.index_mac)
            .bind(version as i64)
            .bind(&mutation.value_mac)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn get_mutation_mac(&self, name: &str, index_mac: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as(
            "SELECT value_mac FROM appsync_mutation_macs WHERE collection = ? AND index_mac = ?",
        )
        .bind(name)
        .bind(index_mac)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(|(mac,)| mac))
    }

    async fn delete_mutation_macs(&self, name: &str, index_macs: &[Vec<u8>]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for mac in index_macs {
            sqlx::query("DELETE FROM appsync_mutation_macs WHERE collection = ? AND index_mac = ?")
                .bind(name)
                .bind(mac)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}

// ── Protocol bookkeeping ────────────────────────────────────────────────────

#[async_trait]
impl ProtocolStore for SessionStore {
    async fn get_skdm_recipients(&self, group_jid: &str) -> StoreResult<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT device_jid FROM group_skdm_recipients WHERE group_jid = ?")
                .bind(group_jid)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(rows.into_iter().map(|(jid,)| jid).collect())
    }

    async fn add_skdm_recipients(&self, group_jid: &str, device_jids: &[String]) -> StoreResult<()> {
        for device in device_jids {
            sqlx::query(
                "INSERT OR IGNORE INTO group_skdm_recipients (group_jid, device_jid) VALUES (?, ?)",
            )
            .bind(group_jid)
            .bind(device)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        }
        Ok(())
    }

    async fn clear_skdm_recipients(&self, group_jid: &str) -> StoreResult<()> {
        self.delete_where_text(
            "DELETE FROM group_skdm_recipients WHERE group_jid = ?",
            group_jid,
        )
        .await
    }

    async fn get_lid_mapping(&self, lid: &str) -> StoreResult<Option<LidPnMappingEntry>> {
        let row: Option<(String, i64, i64, String)> = sqlx::query_as(
            "SELECT phone_number, created_at, updated_at, learning_source \
             FROM lid_phone_map WHERE lid = ?",
        )
        .bind(lid)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(
            |(phone_number, created_at, updated_at, learning_source)| LidPnMappingEntry {
                lid: lid.to_string(),
                phone_number,
                created_at,
                updated_at,
                learning_source,
            },
        ))
    }

    async fn get_pn_mapping(&self, phone: &str) -> StoreResult<Option<LidPnMappingEntry>> {
        let row: Option<(String, i64, i64, String)> = sqlx::query_as(
            "SELECT lid, created_at, updated_at, learning_source \
             FROM lid_phone_map WHERE phone_number = ?",
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(
            row.map(|(lid, created_at, updated_at, learning_source)| LidPnMappingEntry {
                lid,
                phone_number: phone.to_string(),
                created_at,
                updated_at,
                learning_source,
            }),
        )
    }

    async fn put_lid_mapping(&self, entry: &LidPnMappingEntry) -> StoreResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO lid_phone_map \
             (lid, phone_number, created_at, updated_at, learning_source) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.lid)
        .bind(&entry.phone_number)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .bind(&entry.learning_source)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_all_lid_mappings(&self) -> StoreResult<Vec<LidPnMappingEntry>> {
        let rows: Vec<(String, String, i64, i64, String)> = sqlx::query_as(
            "SELECT lid, phone_number, created_at, updated_at, learning_source FROM lid_phone_map",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(
                |(lid, phone_number, created_at, updated_at, learning_source)| LidPnMappingEntry {
                    lid,
                    phone_number,
                    created_at,
                    updated_at,
                    learning_source,
                },
            )
            .collect())
    }

    async fn save_base_key(
        &self,
        address: &str,
        message_id: &str,
        base_key: &[u8],
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO session_base_keys (address, message_id, base_key) \
             VALUES (?, ?, ?)",
        )
        .bind(address)
        .bind(message_id)
        .bind(base_key)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn has_same_base_key(
        &self,
        address: &str,
        message_id: &str,
        current_base_key: &[u8],
    ) -> StoreResult<bool> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as(
            "SELECT base_key FROM session_base_keys WHERE address = ? AND message_id = ?",
        )
        .bind(address)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.is_some_and(|(key,)| key == current_base_key))
    }

    async fn delete_base_key(&self, address: &str, message_id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM session_base_keys WHERE address = ? AND message_id = ?")
            .bind(address)
            .bind(message_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_device_list(&self, record: DeviceListRecord) -> StoreResult<()> {
        let data =
            serde_json::to_string(&record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        sqlx::query("INSERT OR REPLACE INTO user_device_lists (user, record) VALUES (?, ?)")
            .bind(&record.user)
            .bind(&data)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get_devices(&self, user: &str) -> StoreResult<Option<DeviceListRecord>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT record FROM user_device_lists WHERE user = ?")
                .bind(user)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        match row {
            Some((data,)) => {
                let record = serde_json::from_str(&data)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(record))
            },
            None => Ok(None),
        }
    }

    async fn mark_forget_sender_key(&self, group_jid: &str, participant: &str) -> StoreResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO sender_key_forget_marks (group_jid, participant) VALUES (?, ?)",
        )
        .bind(group_jid)
        .bind(participant)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn consume_forget_marks(&self, group_jid: &str) -> StoreResult<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT participant FROM sender_key_forget_marks WHERE group_jid = ?")
                .bind(group_jid)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;

        sqlx::query("DELETE FROM sender_key_forget_marks WHERE group_jid = ?")
            .bind(group_jid)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(rows.into_iter().map(|(participant,)| participant).collect())
    }
}

// ── Device snapshot ─────────────────────────────────────────────────────────

#[async_trait]
impl DeviceStore for SessionStore {
    async fn save(&self, device: &Device) -> StoreResult<()> {
        // Device uses custom serde (key pairs, big arrays) that needs a
        // binary format; serde_json cannot handle deserialize_bytes.
        let record =
            bincode::serialize(device).map_err(|e| StoreError::Serialization(e.to_string()))?;
        sqlx::query("INSERT OR REPLACE INTO device_snapshot (id, record) VALUES (1, ?)")
            .bind(&record)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn load(&self) -> StoreResult<Option<Device>> {
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT record FROM device_snapshot WHERE id = 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        match row {
            Some((record,)) => {
                let device = bincode::deserialize(&record)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(device))
            },
            None => Ok(None),
        }
    }

    async fn exists(&self) -> StoreResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM device_snapshot WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.is_some())
    }

    async fn create(&self) -> StoreResult<i32> {
        // The snapshot itself is written during pairing via save().
        Ok(1)
    }
}
