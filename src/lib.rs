//! One-to-many chat client core.
//!
//! The hard part of this crate is [`store::MessageStore`]: a time-ordered,
//! live-updating view of a remote message collection, replaced wholesale on
//! every snapshot the standing subscription delivers. Publishing goes the
//! other way round: a fire-and-forget document write whose result only ever
//! becomes visible through that same subscription.
//!
//! The remote collection itself sits behind [`remote::RemoteStore`]: in
//! production a shared iroh document namespace ([`remote::docs::DocStore`]
//! running on a [`node::ChatNode`]), in tests an in-process fake
//! ([`remote::memory::MemoryStore`]). Sign-in and the current user identity
//! come from an [`auth::AuthProvider`], which the UI layer consumes; the
//! store itself only ever compares identities as opaque strings.

pub mod auth;
pub mod message;
pub mod node;
pub mod remote;
pub mod store;
mod utils;

pub use auth::{AuthProvider, MockAuth, Session};
pub use message::Message;
pub use node::ChatNode;
pub use remote::RemoteStore;
pub use store::{MessageStore, MESSAGE_COLLECTION};
