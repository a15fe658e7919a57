//! Credential pool with an active-index cursor.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// An API credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw secret, for building request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Last four characters only, for logs.
    ///
    /// ```rust
    /// use waymark_core::generation::ApiKey;
    ///
    /// assert_eq!(ApiKey::new("sk-abcdef1234").redacted(), "…1234");
    /// assert_eq!(ApiKey::new("abc").redacted(), "…");
    /// ```
    pub fn redacted(&self) -> String {
        let count = self.0.chars().count();
        if count <= 4 {
            return "…".to_string();
        }
        let tail: String = self.0.chars().skip(count - 4).collect();
        format!("…{tail}")
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey({})", self.redacted())
    }
}

/// Ordered credentials with one designated active index.
///
/// The cursor is only moved by the resilience layer, and only on quota
/// exhaustion. Pool size is configuration: a pool of one degenerates to
/// backoff-only behavior.
#[derive(Debug, Default)]
pub struct ApiKeyPool {
    keys: Vec<ApiKey>,
    active: AtomicUsize,
}

impl ApiKeyPool {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(ApiKey::new).collect(),
            active: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn get(&self, index: usize) -> Option<&ApiKey> {
        self.keys.get(index)
    }

    pub fn active(&self) -> Option<&ApiKey> {
        self.get(self.active_index())
    }

    /// Moves the cursor. Out-of-range indexes are ignored.
    pub fn set_active(&self, index: usize) {
        if index < self.keys.len() {
            self.active.store(index, Ordering::SeqCst);
        }
    }

    /// The first index after the active one (wrapping) whose `tried` flag
    /// is unset.
    pub fn next_untried(&self, tried: &[bool]) -> Option<usize> {
        let len = self.keys.len();
        let start = self.active_index();
        (1..=len)
            .map(|offset| (start + offset) % len)
            .find(|&index| !tried.get(index).copied().unwrap_or(false))
    }
}
