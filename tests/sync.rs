//! End-to-end properties of the message synchronization store, driven
//! through the in-process remote store.

use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use emberchat::remote::memory::MemoryStore;
use emberchat::{AuthProvider as _, Message, MessageStore, MockAuth, MESSAGE_COLLECTION};
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(5);
// Long enough for the listener task to have drained pending deliveries.
const SETTLE: Duration = Duration::from_millis(200);

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Serialized document body for a message with a fixed timestamp.
fn message_doc(text: &str, username: &str, secs: i64) -> Vec<u8> {
    let message = Message {
        id: format!("{text}-{secs}"),
        text: text.to_string(),
        timestamp: DateTime::from_timestamp(secs, 0).expect("timestamp in range"),
        username: username.to_string(),
    };
    serde_json::to_vec(&message).expect("serialize")
}

async fn wait_for_len(store: &MessageStore, len: usize) -> Arc<Vec<Message>> {
    let mut rx = store.watch();
    let messages = timeout(WAIT, rx.wait_for(|messages| messages.len() == len))
        .await
        .expect("store settled in time")
        .expect("listener alive")
        .clone();
    messages
}

#[tokio::test]
async fn snapshots_are_sorted_ascending_by_timestamp() {
    init_logging();
    let remote = MemoryStore::new();
    remote.push_document(MESSAGE_COLLECTION, message_doc("third", "a@x.com", 3));
    remote.push_document(MESSAGE_COLLECTION, message_doc("first", "a@x.com", 1));
    remote.push_document(MESSAGE_COLLECTION, message_doc("second", "b@x.com", 2));

    let store = MessageStore::live(remote).await.unwrap();
    let messages = wait_for_len(&store, 3).await;

    let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["first", "second", "third"]);
}

#[tokio::test]
async fn equal_timestamps_keep_backend_order() {
    init_logging();
    let remote = MemoryStore::new();
    remote.push_document(MESSAGE_COLLECTION, message_doc("tie-a", "a@x.com", 5));
    remote.push_document(MESSAGE_COLLECTION, message_doc("tie-b", "b@x.com", 5));
    remote.push_document(MESSAGE_COLLECTION, message_doc("early", "a@x.com", 1));

    let store = MessageStore::live(remote).await.unwrap();
    let messages = wait_for_len(&store, 3).await;

    let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["early", "tie-a", "tie-b"]);
}

#[tokio::test]
async fn malformed_documents_never_suppress_the_snapshot() {
    init_logging();
    let remote = MemoryStore::new();
    remote.push_document(MESSAGE_COLLECTION, message_doc("keep-1", "a@x.com", 1));
    remote.push_document(MESSAGE_COLLECTION, &b"not a message"[..]);
    remote.push_document(MESSAGE_COLLECTION, message_doc("keep-2", "b@x.com", 2));

    let store = MessageStore::live(remote).await.unwrap();
    let messages = wait_for_len(&store, 2).await;

    let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["keep-1", "keep-2"]);
}

#[tokio::test]
async fn identical_snapshots_are_idempotent() {
    init_logging();
    let remote = MemoryStore::new();
    remote.push_document(MESSAGE_COLLECTION, message_doc("one", "a@x.com", 1));
    remote.push_document(MESSAGE_COLLECTION, message_doc("two", "b@x.com", 2));

    let store = MessageStore::live(remote.clone()).await.unwrap();
    let before = wait_for_len(&store, 2).await;

    let mut rx = store.watch();
    rx.mark_unchanged();
    remote.rebroadcast(MESSAGE_COLLECTION);
    timeout(WAIT, rx.changed())
        .await
        .expect("second delivery arrived")
        .expect("listener alive");
    assert_eq!(**rx.borrow(), *before);
}

#[tokio::test]
async fn snapshot_errors_retain_previous_state() {
    init_logging();
    let remote = MemoryStore::new();
    remote.push_document(MESSAGE_COLLECTION, message_doc("kept", "a@x.com", 1));

    let store = MessageStore::live(remote.clone()).await.unwrap();
    let before = wait_for_len(&store, 1).await;

    let mut rx = store.watch();
    rx.mark_unchanged();
    remote.push_error(MESSAGE_COLLECTION, "backend hiccup");
    sleep(SETTLE).await;

    // The error delivery produced no replacement at all.
    assert!(!rx.has_changed().unwrap());
    assert_eq!(*store.messages(), *before);

    // And the subscription is still alive afterwards.
    remote.push_document(MESSAGE_COLLECTION, message_doc("later", "a@x.com", 2));
    let messages = wait_for_len(&store, 2).await;
    assert_eq!(messages[0].text, "kept");
}

#[tokio::test]
async fn sent_messages_surface_through_the_subscription_in_timestamp_order() {
    init_logging();
    let auth = MockAuth::new();
    let session = auth.sign_in("a@x.com", "hunter2").await.unwrap();

    let remote = MemoryStore::new();
    // A message far in the future is already in the collection.
    remote.push_document(
        MESSAGE_COLLECTION,
        message_doc("from the future", "b@x.com", 4_102_444_800),
    );

    let store = MessageStore::live(remote.clone()).await.unwrap();
    wait_for_len(&store, 1).await;

    store.send_message("hi", &session.user_email);
    let messages = wait_for_len(&store, 2).await;

    // Sorted by timestamp, not by arrival: the send happened second but its
    // clock value puts it first.
    assert_eq!(messages[0].text, "hi");
    assert_eq!(messages[0].username, "a@x.com");
    assert!(messages[0].is_outgoing(&session.user_email));
    assert!(!messages[1].is_outgoing(&session.user_email));
    assert_eq!(remote.subscription_count(), 1);
}

#[tokio::test]
async fn failed_writes_never_become_visible() {
    init_logging();
    let remote = MemoryStore::new();
    let store = MessageStore::live(remote.clone()).await.unwrap();

    remote.fail_writes(true);
    store.send_message("lost", "a@x.com");
    sleep(SETTLE).await;

    remote.push_document(MESSAGE_COLLECTION, message_doc("sentinel", "b@x.com", 1));
    let messages = wait_for_len(&store, 1).await;
    assert_eq!(messages[0].text, "sentinel");

    // Nothing else trickles in afterwards either.
    sleep(SETTLE).await;
    assert_eq!(store.messages().len(), 1);
}

#[tokio::test]
async fn fixture_store_is_deterministic_and_offline() {
    init_logging();
    let first = MessageStore::mocked();
    let second = MessageStore::mocked();
    assert_eq!(*first.messages(), *second.messages());
    assert_eq!(*first.messages(), Message::mocked());

    // Sending on a fixture store goes nowhere.
    first.send_message("hello", "ada@example.com");
    sleep(SETTLE).await;
    assert_eq!(*first.messages(), Message::mocked());
}
