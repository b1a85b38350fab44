//! API key state shared between the generator and the scheduler.
//!
//! [`Credentials`] wraps a [`tokio::sync::watch`] sender shared by every
//! clone, so an invalidation from the scheduler is seen at once by the
//! generator. The generator reads the latest key on every submission.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// Environment variables checked for a key, in order.
pub const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "API_KEY"];

/// An API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Currently selected API key, if any.
#[derive(Clone)]
pub struct Credentials {
    tx: Arc<watch::Sender<Option<ApiKey>>>,
}

impl Credentials {
    pub fn new(key: Option<ApiKey>) -> Self {
        let (tx, _) = watch::channel(key);
        Self { tx: Arc::new(tx) }
    }

    /// No key selected.
    pub fn empty() -> Self {
        Self::new(None)
    }

    /// Read the first non-blank key from [`API_KEY_ENV_VARS`].
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let key = API_KEY_ENV_VARS
            .iter()
            .filter_map(|var| lookup(var))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
            .map(ApiKey);
        Self::new(key)
    }

    pub fn is_selected(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn current(&self) -> Option<ApiKey> {
        self.tx.borrow().clone()
    }

    /// Select a new key, e.g. after the user re-authenticates.
    pub fn select(&self, key: ApiKey) {
        self.tx.send_replace(Some(key));
        tracing::info!("API key selected");
    }

    /// Drop the stored key. Submissions are refused until [`select`](Self::select)
    /// is called again.
    pub fn invalidate(&self) {
        if self.tx.send_replace(None).is_some() {
            tracing::warn!("API key invalidated");
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("selected", &self.is_selected())
            .finish()
    }
}
