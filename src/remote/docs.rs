//! [`RemoteStore`] implementation over a shared iroh document namespace.
//!
//! Each chat collection lives under a key prefix inside one namespace, so a
//! subscription spans every record with that prefix no matter which author
//! wrote it, which is the collection-group behavior the store relies on.

use anyhow::Result;
use bytes::Bytes;
use iroh_docs::{
    engine::LiveEvent,
    rpc::client::docs::{Doc, ShareMode},
    store::{Query, SortBy, SortDirection},
    AuthorId, DocTicket, NamespaceId,
};
use n0_future::{boxed::BoxFuture, boxed::BoxStream, StreamExt as _};
use tracing::debug;

use crate::node::{BlobsClient, ChatNode, DocsRPCConnector};
use crate::remote::{Document, RemoteStore, RemoteWriteError, SnapshotError, SnapshotStream};
use crate::utils::get_timestamp;

/// Live document store backed by a synchronized namespace.
#[derive(Clone)]
pub struct DocStore {
    doc: Doc<DocsRPCConnector>,
    blobs: BlobsClient,
    author_id: AuthorId,
    ticket: DocTicket,
}

impl DocStore {
    /// Create a fresh namespace, or join an existing one from a ticket.
    pub async fn open(node: &ChatNode, ticket: Option<DocTicket>) -> Result<Self> {
        let author_id = node.docs().authors().create().await?;
        let doc = match ticket {
            None => node.docs().create().await?,
            Some(ticket) => node.docs().import(ticket).await?,
        };
        let ticket = doc.share(ShareMode::Write, Default::default()).await?;
        Ok(Self {
            doc,
            blobs: node.blobs().clone(),
            author_id,
            ticket,
        })
    }

    /// Get the stringified ticket information to share with others.
    pub fn ticket(&self) -> String {
        self.ticket.to_string()
    }

    /// Return the ID of this namespace.
    pub fn id(&self) -> NamespaceId {
        self.doc.id()
    }
}

// Key prefix shared by every document of a collection.
fn collection_prefix(collection: &str) -> Vec<u8> {
    let mut prefix = collection.as_bytes().to_vec();
    prefix.push(b'/');
    prefix
}

// Auto-assigned document keys: sortable by send time, unique per author.
fn document_key(collection: &str, timestamp_micros: u64, author_id: &AuthorId) -> Vec<u8> {
    let mut key = collection_prefix(collection);
    key.extend_from_slice(&timestamp_micros.to_be_bytes());
    key.extend_from_slice(b"_"); // Separator
    key.extend_from_slice(&author_id.as_bytes()[..8]); // Suffix for uniqueness
    key
}

// Events that can change what a collection listing returns.
fn affects_content(event: &LiveEvent) -> bool {
    !matches!(
        event,
        LiveEvent::NeighborUp { .. } | LiveEvent::NeighborDown { .. }
    )
}

/// List the full collection: every entry under the prefix, bodies read from
/// the blob store. Entries whose content has not replicated yet are skipped;
/// they show up in a later snapshot once their `ContentReady` event fires.
async fn materialize(
    doc: &Doc<DocsRPCConnector>,
    blobs: &BlobsClient,
    prefix: &[u8],
) -> Result<Vec<Document>> {
    let query = Query::key_prefix(prefix.to_vec()).sort_by(SortBy::KeyAuthor, SortDirection::Asc);
    let mut entries = doc.get_many(query).await?;
    let mut documents = Vec::new();
    while let Some(entry) = entries.next().await {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("skipping unreadable entry: {err}");
                continue;
            }
        };
        match blobs.read_to_bytes(entry.content_hash()).await {
            Ok(body) => documents.push(Document {
                key: Bytes::copy_from_slice(entry.key()),
                body,
            }),
            Err(err) => debug!("skipping entry without local content: {err}"),
        }
    }
    Ok(documents)
}

impl RemoteStore for DocStore {
    fn subscribe(&self, collection: &str) -> BoxFuture<Result<SnapshotStream>> {
        let doc = self.doc.clone();
        let blobs = self.blobs.clone();
        let prefix = collection_prefix(collection);
        Box::pin(async move {
            let events: BoxStream<Result<LiveEvent>> = Box::pin(doc.subscribe().await?);

            // Deliver the full current collection first, then re-list it on
            // every content-bearing event. Event or query errors become
            // snapshot deliveries the consumer can discard; the stream itself
            // only ends when the event stream does.
            let stream = n0_future::stream::unfold(
                (events, true),
                move |(mut events, initial)| {
                    let doc = doc.clone();
                    let blobs = blobs.clone();
                    let prefix = prefix.clone();
                    async move {
                        if initial {
                            let snapshot = materialize(&doc, &blobs, &prefix)
                                .await
                                .map_err(SnapshotError::new);
                            return Some((snapshot, (events, false)));
                        }
                        loop {
                            match events.next().await {
                                None => return None,
                                Some(Err(err)) => {
                                    return Some((Err(SnapshotError::new(err)), (events, false)))
                                }
                                Some(Ok(event)) if affects_content(&event) => {
                                    let snapshot = materialize(&doc, &blobs, &prefix)
                                        .await
                                        .map_err(SnapshotError::new);
                                    return Some((snapshot, (events, false)));
                                }
                                Some(Ok(_)) => continue,
                            }
                        }
                    }
                },
            );
            let stream: SnapshotStream = Box::pin(stream);
            Ok(stream)
        })
    }

    fn write_document(
        &self,
        collection: &str,
        body: Bytes,
    ) -> BoxFuture<Result<(), RemoteWriteError>> {
        let doc = self.doc.clone();
        let author_id = self.author_id;
        let key = document_key(collection, get_timestamp(), &self.author_id);
        Box::pin(async move {
            doc.set_bytes(author_id, key, body)
                .await
                .map_err(RemoteWriteError::new)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iroh_docs::Author;

    fn author(seed: u8) -> AuthorId {
        Author::from_bytes(&[seed; 32]).id()
    }

    #[test]
    fn document_keys_sort_by_timestamp() {
        let author = author(7);
        let early = document_key("messages", 1_000, &author);
        let late = document_key("messages", 2_000, &author);
        assert!(early < late);
        assert!(early.starts_with(b"messages/"));
    }

    #[test]
    fn document_keys_differ_per_author() {
        let a = document_key("messages", 1_000, &author(1));
        let b = document_key("messages", 1_000, &author(2));
        assert_ne!(a, b);
    }
}
