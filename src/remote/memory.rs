//! In-process [`RemoteStore`]: documents held in memory, full snapshots
//! fanned out to every subscriber on each change. Deterministic, so tests
//! drive the synchronization store through it instead of a live namespace.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use n0_future::boxed::BoxFuture;
use tokio::sync::mpsc;

use crate::remote::{Document, RemoteStore, RemoteWriteError, Snapshot, SnapshotError, SnapshotStream};

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    documents: Vec<(String, Document)>,
    subscribers: Vec<(String, mpsc::UnboundedSender<Snapshot>)>,
    next_key: u64,
    fail_writes: bool,
    subscriptions: usize,
}

impl Inner {
    fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.documents
            .iter()
            .filter(|(c, _)| c == collection)
            .map(|(_, document)| document.clone())
            .collect()
    }

    fn deliver(&mut self, collection: &str, snapshot: Snapshot) {
        self.subscribers.retain(|(c, tx)| {
            if c == collection {
                tx.send(snapshot.clone()).is_ok()
            } else {
                true
            }
        });
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw document body under a fresh key and notify subscribers.
    ///
    /// The body is not validated; tests use this to plant malformed records.
    pub fn push_document(&self, collection: &str, body: impl Into<Bytes>) {
        let mut inner = self.inner.lock().expect("poisened");
        let key = format!("{collection}/{:08}", inner.next_key);
        inner.next_key += 1;
        let document = Document::new(key.into_bytes(), body.into());
        inner.documents.push((collection.to_string(), document));
        let snapshot = Ok(inner.snapshot(collection));
        inner.deliver(collection, snapshot);
    }

    /// Deliver an error to every subscriber of the collection.
    pub fn push_error(&self, collection: &str, reason: &str) {
        let mut inner = self.inner.lock().expect("poisened");
        inner.deliver(collection, Err(SnapshotError::new(reason)));
    }

    /// Deliver the current snapshot again, unchanged.
    pub fn rebroadcast(&self, collection: &str) {
        let mut inner = self.inner.lock().expect("poisened");
        let snapshot = Ok(inner.snapshot(collection));
        inner.deliver(collection, snapshot);
    }

    /// Make subsequent writes fail with a [`RemoteWriteError`].
    pub fn fail_writes(&self, fail: bool) {
        self.inner.lock().expect("poisened").fail_writes = fail;
    }

    /// Number of subscriptions established over this store's lifetime.
    pub fn subscription_count(&self) -> usize {
        self.inner.lock().expect("poisened").subscriptions
    }
}

impl RemoteStore for MemoryStore {
    fn subscribe(&self, collection: &str) -> BoxFuture<anyhow::Result<SnapshotStream>> {
        let store = self.clone();
        let collection = collection.to_string();
        Box::pin(async move {
            let (tx, rx) = mpsc::unbounded_channel();
            {
                let mut inner = store.inner.lock().expect("poisened");
                inner.subscriptions += 1;
                // The first delivery is the full current collection.
                let _ = tx.send(Ok(inner.snapshot(&collection)));
                inner.subscribers.push((collection, tx));
            }
            let stream: SnapshotStream = Box::pin(n0_future::stream::unfold(rx, |mut rx| {
                async move { rx.recv().await.map(|snapshot| (snapshot, rx)) }
            }));
            Ok(stream)
        })
    }

    fn write_document(
        &self,
        collection: &str,
        body: Bytes,
    ) -> BoxFuture<Result<(), RemoteWriteError>> {
        let store = self.clone();
        let collection = collection.to_string();
        Box::pin(async move {
            if store.inner.lock().expect("poisened").fail_writes {
                return Err(RemoteWriteError::new("write refused: simulated failure"));
            }
            store.push_document(&collection, body);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use n0_future::StreamExt as _;

    #[tokio::test]
    async fn subscription_starts_with_full_collection() {
        let store = MemoryStore::new();
        store.push_document("messages", &b"one"[..]);
        store.push_document("messages", &b"two"[..]);
        store.push_document("other", &b"elsewhere"[..]);

        let mut snapshots = store.subscribe("messages").await.unwrap();
        let initial = snapshots.next().await.unwrap().unwrap();
        assert_eq!(initial.len(), 2);
        assert_eq!(initial[0].body, &b"one"[..]);
        assert_eq!(store.subscription_count(), 1);
    }

    #[tokio::test]
    async fn writes_reach_open_subscriptions() {
        let store = MemoryStore::new();
        let mut snapshots = store.subscribe("messages").await.unwrap();
        assert!(snapshots.next().await.unwrap().unwrap().is_empty());

        store
            .write_document("messages", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        let updated = snapshots.next().await.unwrap().unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].body, &b"hello"[..]);
    }

    #[tokio::test]
    async fn failed_writes_change_nothing() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        let result = store
            .write_document("messages", Bytes::from_static(b"hello"))
            .await;
        assert!(result.is_err());

        let mut snapshots = store.subscribe("messages").await.unwrap();
        assert!(snapshots.next().await.unwrap().unwrap().is_empty());
    }
}
