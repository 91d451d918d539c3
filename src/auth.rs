//! Authentication collaborator contract. Consumed by the UI layer, not by
//! the message store; the rest of this crate only ever sees the signed-in
//! identity as an opaque string key.

use std::sync::{Arc, Mutex};

use n0_future::boxed::BoxFuture;

/// The current authenticated identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_email: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("not signed in")]
    NotSignedIn,
}

/// Account operations and the current-session accessor.
///
/// Integration with a hosted provider lives behind this seam; the crate
/// ships only the in-memory [`MockAuth`].
pub trait AuthProvider: Send + Sync + 'static {
    fn sign_up(&self, email: &str, password: &str) -> BoxFuture<Result<Session, AuthError>>;

    fn sign_in(&self, email: &str, password: &str) -> BoxFuture<Result<Session, AuthError>>;

    fn sign_out(&self) -> BoxFuture<Result<(), AuthError>>;

    /// Email of the signed-in user, if any.
    fn user_email(&self) -> Option<String>;
}

/// Provider that accepts any non-empty credentials and keeps the session in
/// memory. Never touches the network.
#[derive(Clone, Default)]
pub struct MockAuth {
    session: Arc<Mutex<Option<Session>>>,
}

impl MockAuth {
    pub fn new() -> Self {
        Self::default()
    }

    fn establish(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        let session = Session {
            user_email: email.to_string(),
        };
        *self.session.lock().expect("poisened") = Some(session.clone());
        Ok(session)
    }
}

impl AuthProvider for MockAuth {
    fn sign_up(&self, email: &str, password: &str) -> BoxFuture<Result<Session, AuthError>> {
        let result = self.establish(email, password);
        Box::pin(async move { result })
    }

    fn sign_in(&self, email: &str, password: &str) -> BoxFuture<Result<Session, AuthError>> {
        let result = self.establish(email, password);
        Box::pin(async move { result })
    }

    fn sign_out(&self) -> BoxFuture<Result<(), AuthError>> {
        let session = self.session.clone();
        Box::pin(async move {
            match session.lock().expect("poisened").take() {
                Some(_) => Ok(()),
                None => Err(AuthError::NotSignedIn),
            }
        })
    }

    fn user_email(&self) -> Option<String> {
        self.session
            .lock()
            .expect("poisened")
            .as_ref()
            .map(|session| session.user_email.clone())
    }
}
