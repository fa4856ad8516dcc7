//! SQLite client store

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use super::store::{ClientKey, ClientRecord, ClientStore, ClientUpdate};
use super::{StoreError, StoreResult};

const COLUMNS: &str = "clientMachineId, skuId, machineName, machineIp, applicationId, \
                       licenseStatus, lastRequestTime, lastRequestTimeReadable, kmsEpid, requestCount";

/// SQLite-backed client store
///
/// Thread-safe via internal Mutex (SQLite Connection is not Sync). Every
/// operation runs in its own transaction.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE clients (
///     clientMachineId TEXT NOT NULL,
///     machineName TEXT,
///     machineIp TEXT,
///     applicationId TEXT,
///     skuId TEXT NOT NULL,
///     licenseStatus TEXT,
///     lastRequestTime INTEGER,
///     lastRequestTimeReadable TEXT,
///     kmsEpid TEXT,
///     requestCount INTEGER,
///     PRIMARY KEY (clientMachineId, skuId)
/// );
/// ```
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) a database file
    ///
    /// Failure here is meant to abort startup.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let open_error = |err: rusqlite::Error| StoreError::Open {
            path: path.display().to_string(),
            source: Box::new(err),
        };

        let conn = Connection::open(path).map_err(open_error)?;
        Self::init_schema(&conn).map_err(open_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let open_error = |err: rusqlite::Error| StoreError::Open {
            path: ":memory:".to_owned(),
            source: Box::new(err),
        };

        let conn = Connection::open_in_memory().map_err(open_error)?;
        Self::init_schema(&conn).map_err(open_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS clients (
                clientMachineId TEXT NOT NULL,
                machineName TEXT,
                machineIp TEXT,
                applicationId TEXT,
                skuId TEXT NOT NULL,
                licenseStatus TEXT,
                lastRequestTime INTEGER,
                lastRequestTimeReadable TEXT,
                kmsEpid TEXT,
                requestCount INTEGER,
                PRIMARY KEY (clientMachineId, skuId)
            )",
            [],
        )?;
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn select(conn: &Connection, key: &ClientKey) -> rusqlite::Result<Option<ClientRecord>> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM clients WHERE clientMachineId = ?1 AND skuId = ?2"),
            params![key.client_machine_id.to_string(), key.sku_id.to_string()],
            Self::row_to_record,
        )
        .optional()
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ClientRecord> {
        let parse_uuid = |idx: usize| -> rusqlite::Result<Uuid> {
            let text: String = row.get(idx)?;
            Uuid::parse_str(&text)
                .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
        };

        Ok(ClientRecord {
            key: ClientKey::new(parse_uuid(0)?, parse_uuid(1)?),
            machine_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            machine_ip: row.get(3)?,
            application: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            license_status: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            last_request_time: row.get::<_, Option<i64>>(6)?.unwrap_or_default(),
            last_request_time_readable: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
            kms_epid: row.get::<_, Option<String>>(8)?.filter(|epid| !epid.is_empty()),
            request_count: row
                .get::<_, Option<i64>>(9)?
                .and_then(|count| u64::try_from(count).ok())
                .unwrap_or_default(),
        })
    }
}

impl ClientStore for SqliteStore {
    fn is_persistent(&self) -> bool {
        true
    }

    fn upsert(&self, key: &ClientKey, update: &ClientUpdate) -> StoreResult<Option<ClientRecord>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let previous = Self::select(&tx, key)?;

        let cmid = key.client_machine_id.to_string();
        let sku = key.sku_id.to_string();
        if previous.is_some() {
            tx.execute(
                "UPDATE clients SET machineName = ?3, machineIp = ?4, applicationId = ?5,
                     licenseStatus = ?6, lastRequestTime = ?7, lastRequestTimeReadable = ?8,
                     requestCount = requestCount + 1
                 WHERE clientMachineId = ?1 AND skuId = ?2",
                params![
                    cmid,
                    sku,
                    update.machine_name,
                    update.machine_ip,
                    update.application,
                    update.license_status,
                    update.last_request_time,
                    update.last_request_time_readable,
                ],
            )?;
        } else {
            tx.execute(
                "INSERT INTO clients (clientMachineId, skuId, machineName, machineIp, applicationId,
                     licenseStatus, lastRequestTime, lastRequestTimeReadable, requestCount)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1)",
                params![
                    cmid,
                    sku,
                    update.machine_name,
                    update.machine_ip,
                    update.application,
                    update.license_status,
                    update.last_request_time,
                    update.last_request_time_readable,
                ],
            )?;
        }

        tx.commit()?;
        Ok(previous)
    }

    fn get(&self, key: &ClientKey) -> StoreResult<Option<ClientRecord>> {
        let conn = self.lock()?;
        Ok(Self::select(&conn, key)?)
    }

    fn get_epid(&self, key: &ClientKey) -> StoreResult<Option<String>> {
        Ok(self.get(key)?.and_then(|record| record.kms_epid))
    }

    fn set_epid(&self, key: &ClientKey, epid: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE clients SET kmsEpid = ?3 WHERE clientMachineId = ?1 AND skuId = ?2",
            params![key.client_machine_id.to_string(), key.sku_id.to_string(), epid],
        )?;
        Ok(())
    }

    fn get_or_assign_epid(
        &self,
        key: &ClientKey,
        generate: &mut dyn FnMut() -> String,
    ) -> StoreResult<String> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        if let Some(epid) = Self::select(&tx, key)?.and_then(|record| record.kms_epid) {
            return Ok(epid);
        }

        let epid = generate();
        tx.execute(
            "UPDATE clients SET kmsEpid = ?3 WHERE clientMachineId = ?1 AND skuId = ?2",
            params![key.client_machine_id.to_string(), key.sku_id.to_string(), epid],
        )?;
        tx.commit()?;
        Ok(epid)
    }
}
