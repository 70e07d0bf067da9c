//! # vigil-db
//!
//! libSQL persistence for Vigil.
//!
//! State is split in two kinds of databases: one control-plane database
//! shared by every organization (configs, screenings, matches, whitelists,
//! dataset bookkeeping, data model, cases) and one database per organization
//! (ingested objects, monitored objects, delta tracks). Queries never join
//! across the two; callers pick the database explicitly.
//!
//! Repositories are free functions taking a `&libsql::Connection`, so the same
//! function works on a locked connection ([`DbConn`]) or inside a transaction
//! ([`DbTx`]).

pub mod error;
pub mod helpers;
mod migrations;
pub mod ports;
pub mod repos;

use std::collections::HashMap;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;

use libsql::Builder;
use tokio::sync::{Mutex, OwnedMutexGuard};
use vigil_config::DatabaseConfig;

use error::DatabaseError;
use migrations::{Schema, run_migrations};

const MEMORY: &str = ":memory:";

/// One opened database with its connection and access lock.
struct Handle {
    _db: libsql::Database,
    conn: libsql::Connection,
    lock: Arc<Mutex<()>>,
}

impl Handle {
    async fn open(path: &str, schema: Schema) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;

        run_migrations(&conn, schema).await?;
        Ok(Self {
            _db: db,
            conn,
            lock: Arc::new(Mutex::new(())),
        })
    }

    async fn conn(&self) -> DbConn {
        let guard = Arc::clone(&self.lock).lock_owned().await;
        DbConn {
            conn: self.conn.clone(),
            _guard: guard,
        }
    }

    async fn tx(&self) -> Result<DbTx, DatabaseError> {
        let guard = Arc::clone(&self.lock).lock_owned().await;
        let tx = self.conn.transaction().await?;
        Ok(DbTx { tx, _guard: guard })
    }
}

/// Exclusive access to a database connection outside a transaction.
pub struct DbConn {
    conn: libsql::Connection,
    _guard: OwnedMutexGuard<()>,
}

impl Deref for DbConn {
    type Target = libsql::Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

/// An open transaction. Dropping it without [`DbTx::commit`] rolls back.
pub struct DbTx {
    tx: libsql::Transaction,
    _guard: OwnedMutexGuard<()>,
}

impl DbTx {
    /// # Errors
    ///
    /// Returns `DatabaseError` if the commit fails.
    pub async fn commit(self) -> Result<(), DatabaseError> {
        let Self { tx, _guard } = self;
        tx.commit().await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if the rollback fails.
    pub async fn rollback(self) -> Result<(), DatabaseError> {
        let Self { tx, _guard } = self;
        tx.rollback().await?;
        Ok(())
    }
}

impl Deref for DbTx {
    type Target = libsql::Connection;

    fn deref(&self) -> &Self::Target {
        &self.tx
    }
}

/// Central database handle.
///
/// Constructed once by the host and shared behind an `Arc`. Organization
/// databases are opened on first use and cached for the lifetime of the
/// handle.
pub struct VigilDb {
    control: Handle,
    /// `None` keeps organization databases in memory.
    org_dir: Option<PathBuf>,
    orgs: Mutex<HashMap<String, Arc<Handle>>>,
}

impl VigilDb {
    /// Open the databases described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a directory cannot be created, the control
    /// database cannot be opened, or migrations fail.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        if config.control_path != MEMORY {
            if let Some(parent) = PathBuf::from(&config.control_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }
        let org_dir = PathBuf::from(&config.org_dir);
        std::fs::create_dir_all(&org_dir)?;

        let control = Handle::open(&config.control_path, Schema::Control).await?;
        tracing::debug!(control = %config.control_path, org_dir = %config.org_dir, "opened databases");
        Ok(Self {
            control,
            org_dir: Some(org_dir),
            orgs: Mutex::new(HashMap::new()),
        })
    }

    /// Fresh in-memory databases, for tests.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if migrations fail.
    pub async fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self {
            control: Handle::open(MEMORY, Schema::Control).await?,
            org_dir: None,
            orgs: Mutex::new(HashMap::new()),
        })
    }

    /// Lock the control-plane connection.
    pub async fn control(&self) -> DbConn {
        self.control.conn().await
    }

    /// Begin a control-plane transaction.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the transaction cannot be started.
    pub async fn control_tx(&self) -> Result<DbTx, DatabaseError> {
        self.control.tx().await
    }

    /// Lock the connection of an organization database.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn org(&self, org_id: &str) -> Result<DbConn, DatabaseError> {
        Ok(self.org_handle(org_id).await?.conn().await)
    }

    /// Begin a transaction on an organization database.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or the
    /// transaction cannot be started.
    pub async fn org_tx(&self, org_id: &str) -> Result<DbTx, DatabaseError> {
        self.org_handle(org_id).await?.tx().await
    }

    /// Make sure the organization database exists with its monitoring table.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn provision_org(&self, org_id: &str) -> Result<(), DatabaseError> {
        self.org_handle(org_id).await.map(|_| ())
    }

    async fn org_handle(&self, org_id: &str) -> Result<Arc<Handle>, DatabaseError> {
        validate_org_id(org_id)?;
        let mut orgs = self.orgs.lock().await;
        if let Some(handle) = orgs.get(org_id) {
            return Ok(Arc::clone(handle));
        }

        let path = self.org_dir.as_ref().map_or_else(
            || MEMORY.to_string(),
            |dir| dir.join(format!("{org_id}.db")).to_string_lossy().into_owned(),
        );
        let handle = Arc::new(Handle::open(&path, Schema::Org).await?);
        tracing::debug!(org_id, path, "opened organization database");
        orgs.insert(org_id.to_string(), Arc::clone(&handle));
        Ok(handle)
    }
}

/// Organization ids become file names; keep them to a safe alphabet.
fn validate_org_id(org_id: &str) -> Result<(), DatabaseError> {
    let valid = !org_id.is_empty()
        && org_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(DatabaseError::InvalidState(format!(
            "invalid organization id '{org_id}'"
        )))
    }
}
