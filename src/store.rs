//! The canonical local view of "all messages, oldest first", kept live
//! against a remote collection via a standing subscription.

use std::sync::Arc;

use bytes::Bytes;
use n0_future::{
    task::{self, AbortOnDropHandle},
    StreamExt as _,
};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::message::Message;
use crate::remote::{RemoteStore, SnapshotStream};

/// Collection the chat messages live in.
pub const MESSAGE_COLLECTION: &str = "messages";

/// Owns the visible message sequence and the way to publish new messages.
///
/// Readers observe an atomically replaced `Arc<Vec<Message>>`: the listener
/// task is the only writer and swaps in a whole new sequence per snapshot,
/// so no partial update is ever observable.
pub struct MessageStore {
    visible: watch::Receiver<Arc<Vec<Message>>>,
    backing: Backing,
}

// A store is constructed into exactly one of these states and never leaves
// it.
enum Backing {
    /// Fixture data only. No subscription is established and nothing in this
    /// state touches the network.
    Fixture {
        _seed: watch::Sender<Arc<Vec<Message>>>,
    },
    /// One standing subscription for the life of the store. Dropping the
    /// store drops the listener task and with it the subscription.
    Live {
        remote: Arc<dyn RemoteStore>,
        _listener: AbortOnDropHandle<()>,
    },
}

impl MessageStore {
    /// Store seeded with the fixed sample conversation, for tests and demos.
    pub fn mocked() -> Self {
        let (tx, rx) = watch::channel(Arc::new(Message::mocked()));
        Self {
            visible: rx,
            backing: Backing::Fixture { _seed: tx },
        }
    }

    /// Store kept live against `remote`.
    ///
    /// Subscribes exactly once and spawns the listener that owns the visible
    /// sequence from then on. Fails only if the subscription cannot be
    /// established; afterwards every problem is logged and absorbed.
    pub async fn live(remote: impl RemoteStore) -> anyhow::Result<Self> {
        let remote: Arc<dyn RemoteStore> = Arc::new(remote);
        let snapshots = remote.subscribe(MESSAGE_COLLECTION).await?;
        let (tx, rx) = watch::channel(Arc::new(Vec::new()));
        let listener = AbortOnDropHandle::new(task::spawn(run_listener(snapshots, tx)));
        Ok(Self {
            visible: rx,
            backing: Backing::Live {
                remote,
                _listener: listener,
            },
        })
    }

    /// The current visible sequence, oldest first.
    pub fn messages(&self) -> Arc<Vec<Message>> {
        self.visible.borrow().clone()
    }

    /// A handle for observing sequence replacements.
    pub fn watch(&self) -> watch::Receiver<Arc<Vec<Message>>> {
        self.visible.clone()
    }

    /// Publish a new message under the current user's identity.
    ///
    /// Fire-and-forget: the write is scheduled on a background task and this
    /// returns immediately. The message becomes visible locally only once
    /// the subscription delivers a snapshot containing it; a failed write is
    /// logged and the message is treated as never sent.
    pub fn send_message(&self, text: &str, username: &str) {
        let remote = match &self.backing {
            Backing::Live { remote, .. } => remote.clone(),
            Backing::Fixture { .. } => {
                warn!("fixture store: dropping outgoing message");
                return;
            }
        };
        let message = Message::new(text, username);
        let body = match serde_json::to_vec(&message) {
            Ok(body) => Bytes::from(body),
            Err(err) => {
                warn!("failed to encode message {}: {err}", message.id);
                return;
            }
        };
        task::spawn(async move {
            if let Err(err) = remote.write_document(MESSAGE_COLLECTION, body).await {
                warn!("failed to send message {}: {err}", message.id);
            }
        });
    }
}

/// Sole writer of the visible sequence.
///
/// Every delivery is applied wholesale: decode each document, drop the ones
/// that don't decode, sort ascending by timestamp, replace the sequence. An
/// error delivery is discarded and the previous sequence stays visible.
async fn run_listener(mut snapshots: SnapshotStream, visible: watch::Sender<Arc<Vec<Message>>>) {
    while let Some(snapshot) = snapshots.next().await {
        let documents = match snapshot {
            Ok(documents) => documents,
            Err(err) => {
                warn!("{err}");
                continue;
            }
        };
        let mut messages: Vec<Message> = documents
            .iter()
            .filter_map(|document| match serde_json::from_slice(&document.body) {
                Ok(message) => Some(message),
                Err(err) => {
                    warn!("dropping document that does not decode into a message: {err}");
                    None
                }
            })
            .collect();
        // Stable sort: equal timestamps keep the order the backend returned
        // them in.
        messages.sort_by_key(|message| message.timestamp);
        visible.send_replace(Arc::new(messages));
    }
    debug!("snapshot stream ended");
}
