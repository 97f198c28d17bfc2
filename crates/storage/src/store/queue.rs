#![forbid(unsafe_code)]

//! Single-writer dispatch over a synchronous SQLite connection.
//!
//! The connection lives on one dedicated thread. Reads and writes are queued
//! on one FIFO channel and run strictly one at a time, so at most one write
//! transaction is ever open and callers observe submission order. Async
//! callers await a oneshot reply and never block on the engine.

use super::StoreError;
use rusqlite::{
    Connection, OptionalExtension, Params, Row, Statement, Transaction, TransactionBehavior,
};
use std::panic::{AssertUnwindSafe, catch_unwind};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Request {
    Run(Job),
    Close(oneshot::Sender<()>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxOutcome {
    Committed,
    RolledBack,
    Failed,
}

/// Handle given to queued write operations.
///
/// Returning `Ok` without a terminal call commits; returning `Err` rolls back.
pub struct WriteTx<'conn> {
    tx: Option<Transaction<'conn>>,
    outcome: Option<TxOutcome>,
}

impl<'conn> WriteTx<'conn> {
    fn begin(conn: &'conn mut Connection) -> Result<Self, StoreError> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(Self {
            tx: Some(tx),
            outcome: None,
        })
    }

    /// The open transaction's connection, for helpers shared with the read path.
    pub fn conn(&self) -> Result<&Connection, StoreError> {
        match self.tx.as_ref() {
            Some(tx) => Ok(&**tx),
            None => Err(StoreError::TransactionFinished),
        }
    }

    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize, StoreError> {
        Ok(self.conn()?.execute(sql, params)?)
    }

    pub fn query_row<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Option<T>, StoreError>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        Ok(self.conn()?.query_row(sql, params, f).optional()?)
    }

    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>, StoreError> {
        Ok(self.conn()?.prepare(sql)?)
    }

    pub fn last_insert_rowid(&self) -> Result<i64, StoreError> {
        Ok(self.conn()?.last_insert_rowid())
    }

    pub fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::TransactionFinished)?;
        match tx.commit() {
            Ok(()) => {
                self.outcome = Some(TxOutcome::Committed);
                Ok(())
            }
            Err(err) => {
                self.outcome = Some(TxOutcome::Failed);
                Err(err.into())
            }
        }
    }

    pub fn rollback(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::TransactionFinished)?;
        match tx.rollback() {
            Ok(()) => {
                self.outcome = Some(TxOutcome::RolledBack);
                Ok(())
            }
            Err(err) => {
                self.outcome = Some(TxOutcome::Failed);
                Err(err.into())
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.tx.is_none()
    }

    pub fn outcome(&self) -> Option<TxOutcome> {
        self.outcome
    }

    fn abort(&mut self) {
        if self.is_finished() {
            return;
        }
        if let Err(err) = self.rollback() {
            warn!(error = %err, "rollback after failed write did not complete");
        }
        self.outcome = Some(TxOutcome::Failed);
    }
}

#[derive(Debug)]
pub struct TransactionQueue {
    sender: mpsc::UnboundedSender<Request>,
    read_only: bool,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Run(_) => f.write_str("Run"),
            Self::Close(_) => f.write_str("Close"),
        }
    }
}

impl TransactionQueue {
    /// Moves `conn` onto a dedicated worker thread.
    pub fn spawn(conn: Connection, read_only: bool) -> Result<Self, StoreError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        std::thread::Builder::new()
            .name("dk-txqueue".to_string())
            .spawn(move || run_worker(conn, receiver))?;
        Ok(Self { sender, read_only })
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Runs `op` inside an immediate (write-locked) transaction once every
    /// earlier submission has finished.
    pub async fn enqueue_write<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut WriteTx<'_>) -> Result<T, StoreError> + Send + 'static,
    {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        self.submit(move |conn| run_write(conn, op)).await
    }

    /// Runs `op` without an explicit transaction, in submission order.
    pub async fn enqueue_read<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        self.submit(move |conn| {
            catch_unwind(AssertUnwindSafe(|| op(conn)))
                .unwrap_or(Err(StoreError::Internal("queued read panicked")))
        })
        .await
    }

    /// Lets every already queued operation finish, then releases the connection.
    pub async fn close(&self) {
        let (done, finished) = oneshot::channel();
        if self.sender.send(Request::Close(done)).is_err() {
            return;
        }
        let _ = finished.await;
    }

    async fn submit<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            let _ = reply.send(op(conn));
        });
        self.sender
            .send(Request::Run(job))
            .map_err(|_| StoreError::Closed)?;
        response.await.map_err(|_| StoreError::Closed)?
    }
}

fn run_write<T, F>(conn: &mut Connection, op: F) -> Result<T, StoreError>
where
    F: FnOnce(&mut WriteTx<'_>) -> Result<T, StoreError>,
{
    let mut tx = WriteTx::begin(conn)?;
    let result = catch_unwind(AssertUnwindSafe(|| op(&mut tx)));
    match result {
        Ok(Ok(value)) => {
            if !tx.is_finished() {
                tx.commit()?;
            }
            debug!(outcome = ?tx.outcome(), "write transaction finished");
            Ok(value)
        }
        Ok(Err(err)) => {
            tx.abort();
            warn!(error = %err, "write transaction rolled back");
            Err(err)
        }
        Err(_) => {
            tx.abort();
            warn!("write operation panicked; transaction rolled back");
            Err(StoreError::Internal("queued write panicked"))
        }
    }
}

fn run_worker(mut conn: Connection, mut receiver: mpsc::UnboundedReceiver<Request>) {
    let mut dispatched = 0u64;
    while let Some(request) = receiver.blocking_recv() {
        match request {
            Request::Run(job) => {
                dispatched += 1;
                job(&mut conn);
            }
            Request::Close(done) => {
                receiver.close();
                release(conn, dispatched);
                let _ = done.send(());
                return;
            }
        }
    }
    release(conn, dispatched);
}

fn release(conn: Connection, dispatched: u64) {
    if let Err((_, err)) = conn.close() {
        warn!(error = %err, "sqlite connection did not close cleanly");
    }
    debug!(dispatched, "transaction queue stopped");
}
