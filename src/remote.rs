//! Contract for the document-oriented realtime store the message
//! synchronization logic runs against. The store consumes full-content
//! snapshots pushed over a standing subscription and publishes new records
//! with auto-assigned document keys; everything transport-level lives behind
//! this seam.

pub mod docs;
pub mod memory;

use bytes::Bytes;
use n0_future::boxed::{BoxFuture, BoxStream};

/// One persisted record in a subscribed collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Backend-assigned document key.
    pub key: Bytes,
    /// Serialized record body, opaque to the backend.
    pub body: Bytes,
}

impl Document {
    pub fn new(key: impl Into<Bytes>, body: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            body: body.into(),
        }
    }
}

/// A full point-in-time listing of a collection, or the reason the delivery
/// is unusable as a whole.
pub type Snapshot = Result<Vec<Document>, SnapshotError>;

/// Push stream of snapshots. The first item carries the full current
/// collection; every later item is a whole-collection re-listing triggered
/// by some remote change.
pub type SnapshotStream = BoxStream<Snapshot>;

/// The subscription delivered an error, or no documents at all. The delivery
/// is discarded; previously visible state is retained.
#[derive(Debug, Clone, thiserror::Error)]
#[error("snapshot discarded: {reason}")]
pub struct SnapshotError {
    reason: String,
}

impl SnapshotError {
    pub fn new(reason: impl std::fmt::Display) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

/// A document write failed on the network/auth/permission level. The record
/// is treated as never sent; there is no retry.
#[derive(Debug, thiserror::Error)]
#[error("remote write failed: {reason}")]
pub struct RemoteWriteError {
    reason: String,
}

impl RemoteWriteError {
    pub fn new(reason: impl std::fmt::Display) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

/// Remote collaborator interface.
///
/// Implementations must deliver snapshots for a named collection across the
/// whole namespace regardless of parent grouping (collection-group
/// semantics), and must make successful writes observable to subsequent
/// snapshots.
pub trait RemoteStore: Send + Sync + 'static {
    /// Establish the standing subscription to `collection`.
    ///
    /// Errors here are establishment failures; once the stream exists,
    /// delivery problems surface as [`SnapshotError`] items, not as stream
    /// termination.
    fn subscribe(&self, collection: &str) -> BoxFuture<anyhow::Result<SnapshotStream>>;

    /// Persist `body` as a new document under a fresh auto-assigned key.
    fn write_document(&self, collection: &str, body: Bytes)
        -> BoxFuture<Result<(), RemoteWriteError>>;
}
