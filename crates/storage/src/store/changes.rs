#![forbid(unsafe_code)]

use super::support::query_changes_tx;
use super::*;
use std::sync::Arc;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;

impl SqliteStore {
    pub async fn changes(&self, options: ChangesOptions) -> Result<ChangesResult, StoreError> {
        self.queue
            .enqueue_read(move |conn| query_changes_tx(conn, &options))
            .await
    }

    /// Starts a continuous feed on the current tokio runtime.
    ///
    /// The feed first delivers everything after `options.since`, then one pass
    /// per commit signalled for this store's name. It always runs in ascending
    /// order and ends once `limit` changes were delivered, a filter returns
    /// [`FilterDecision::Stop`], or the store closes.
    pub fn live_changes(&self, options: ChangesOptions) -> ChangesStream {
        let subscription = self.registry.subscribe(&self.name);
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_feed(
            Arc::clone(&self.queue),
            subscription.notify,
            options,
            sender,
        ));
        debug!(name = %self.name, subscriber = subscription.id, "live changes subscribed");

        ChangesStream {
            receiver,
            task,
            registry: Arc::clone(&self.registry),
            name: self.name.clone(),
            id: subscription.id,
        }
    }
}

/// Receiving end of [`SqliteStore::live_changes`]. Dropping it cancels the feed.
#[derive(Debug)]
pub struct ChangesStream {
    receiver: mpsc::UnboundedReceiver<Result<Change, StoreError>>,
    task: JoinHandle<()>,
    registry: Arc<ChangeRegistry>,
    name: String,
    id: u64,
}

impl ChangesStream {
    /// Next change in sequence order; `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<Result<Change, StoreError>> {
        self.receiver.recv().await
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for ChangesStream {
    fn drop(&mut self) {
        self.task.abort();
        self.registry.unsubscribe(&self.name, self.id);
    }
}

async fn run_feed(
    queue: Arc<TransactionQueue>,
    notify: Arc<Notify>,
    mut options: ChangesOptions,
    sender: mpsc::UnboundedSender<Result<Change, StoreError>>,
) {
    options.descending = false;
    let mut remaining = options.limit;

    'feed: loop {
        if remaining == Some(0) {
            break;
        }

        let mut pass = options.clone();
        pass.limit = remaining;
        let batch = match queue.enqueue_read(move |conn| query_changes_tx(conn, &pass)).await {
            Ok(batch) => batch,
            Err(StoreError::Closed) => break,
            Err(err) => {
                let _ = sender.send(Err(err));
                break;
            }
        };

        options.since = batch.last_seq;
        for change in batch.results {
            if sender.send(Ok(change)).is_err() {
                break 'feed;
            }
            if let Some(left) = remaining.as_mut() {
                *left = left.saturating_sub(1);
            }
        }
        if batch.stopped || remaining == Some(0) || queue.is_closed() {
            break;
        }

        tokio::select! {
            _ = notify.notified() => {}
            _ = sender.closed() => break,
        }
    }
    debug!(since = options.since, "live changes feed ended");
}
