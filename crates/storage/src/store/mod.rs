#![forbid(unsafe_code)]

mod bulk_docs;
mod changes;
mod compact;
mod docs;
mod error;
mod local;
mod options;
mod queue;
mod registry;
mod requests;
mod support;
mod types;

pub use changes::ChangesStream;
pub use error::{ErrorKind, StoreError};
pub use options::{DEFAULT_REVS_LIMIT, OpenOptions};
pub use queue::{TransactionQueue, TxOutcome, WriteTx};
pub use registry::{ChangeRegistry, Subscription};
pub use requests::*;
pub use types::*;

use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// A document store backed by one SQLite file.
///
/// Every operation goes through the store's [`TransactionQueue`], so the file
/// sees exactly one writer at a time and operations complete in submission
/// order.
#[derive(Debug)]
pub struct SqliteStore {
    queue: Arc<TransactionQueue>,
    registry: Arc<ChangeRegistry>,
    name: String,
    path: PathBuf,
    instance_id: String,
    schema_version: i64,
    revs_limit: usize,
    deterministic_revs: bool,
    auto_compaction: bool,
}

impl SqliteStore {
    pub async fn open(options: OpenOptions) -> Result<Self, StoreError> {
        let path = options.path().to_path_buf();
        let read_only = options.is_read_only();

        let (conn, state) = if read_only {
            let conn = Connection::open_with_flags(
                &path,
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            support::configure_connection(&conn, true)?;
            let state = support::read_current(&conn)?;
            (conn, state)
        } else {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let mut conn = Connection::open(&path)?;
            support::configure_connection(&conn, false)?;
            let state = support::open_or_create(&mut conn)?;
            (conn, state)
        };

        let name = options.store_name();
        info!(
            name = %name,
            path = %path.display(),
            read_only,
            version = state.version,
            "opened document store"
        );

        Ok(Self {
            queue: Arc::new(TransactionQueue::spawn(conn, read_only)?),
            registry: options.resolve_registry(),
            name,
            path,
            instance_id: state.instance_id,
            schema_version: state.version,
            revs_limit: options.get_revs_limit(),
            deterministic_revs: options.uses_deterministic_revs(),
            auto_compaction: options.uses_auto_compaction(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn schema_version(&self) -> i64 {
        self.schema_version
    }

    pub fn is_read_only(&self) -> bool {
        self.queue.is_read_only()
    }

    /// The store's queue, for callers composing their own transactions.
    pub fn queue(&self) -> &TransactionQueue {
        &self.queue
    }

    pub async fn info(&self) -> Result<StoreInfo, StoreError> {
        let name = self.name.clone();
        let instance_id = self.instance_id.clone();
        let schema_version = self.schema_version;
        self.queue
            .enqueue_read(move |conn| {
                Ok(StoreInfo {
                    name,
                    instance_id,
                    doc_count: support::count_live_docs(conn)?,
                    update_seq: support::update_seq(conn)?,
                    schema_version,
                })
            })
            .await
    }

    /// Finishes queued work and releases the file. Live feeds of this name
    /// are woken so that feeds served by this handle can end.
    pub async fn close(&self) {
        self.queue.close().await;
        self.registry.notify(&self.name);
        info!(name = %self.name, "closed document store");
    }

    /// Closes the store and deletes its file together with the WAL sidecars.
    pub async fn destroy(self) -> Result<(), StoreError> {
        self.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let mut target = self.path.clone().into_os_string();
            target.push(suffix);
            match std::fs::remove_file(&target) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        info!(path = %self.path.display(), "destroyed document store");
        Ok(())
    }

    fn write_context(&self, new_edits: bool) -> support::WriteContext {
        support::WriteContext {
            revs_limit: self.revs_limit,
            deterministic_revs: self.deterministic_revs,
            new_edits,
        }
    }
}
