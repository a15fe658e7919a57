//! Composite cancellation for a single workflow run.
//!
//! A run observes several independent cancellation sources: the operation
//! initiator's cancel and the progress surface's cancel button. Each source
//! is a [`CancellationToken`] owned by whoever created it. The
//! [`CancellationScope`] merges them into one fire-once signal that every
//! handler, generation call and spawned command watches.
//!
//! Cancellation is cooperative. Firing the scope never interrupts a future;
//! in-flight work is expected to check [`CancellationScope::is_cancelled`] or
//! race against [`CancellationScope::cancelled`] and exit promptly.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use futures::future::select_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type Listener = Box<dyn FnOnce() + Send>;

struct Shared {
    composite: CancellationToken,
    fired: AtomicBool,
    listeners: Mutex<Vec<Listener>>,
}

impl Shared {
    /// Fires the composite signal. Only the first call has any effect.
    fn fire(&self) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        self.composite.cancel();
        let listeners = match self.listeners.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for listener in listeners {
            listener();
        }
    }
}

/// Read-only composite of N cancellation sources.
///
/// Created fresh per run and dropped at run end; dropping stops the watcher
/// that links the sources but never cancels them.
pub struct CancellationScope {
    sources: Vec<CancellationToken>,
    shared: Arc<Shared>,
    watcher: Option<JoinHandle<()>>,
}

impl CancellationScope {
    /// Composes the given sources into one signal.
    ///
    /// Must be called from within a tokio runtime when `sources` is
    /// non-empty, since a watcher task links them to the composite.
    pub fn new(sources: Vec<CancellationToken>) -> Self {
        let shared = Arc::new(Shared {
            composite: CancellationToken::new(),
            fired: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
        });

        let watcher = if sources.is_empty() {
            None
        } else {
            let watched = sources.clone();
            let linked = Arc::clone(&shared);
            Some(tokio::spawn(async move {
                let waits = watched
                    .iter()
                    .map(|token| Box::pin(token.cancelled()))
                    .collect::<Vec<_>>();
                let _ = select_all(waits).await;
                linked.fire();
            }))
        };

        Self {
            sources,
            shared,
            watcher,
        }
    }

    /// A scope with no external sources; it only fires through
    /// [`CancellationScope::cancel`].
    pub fn detached() -> Self {
        Self::new(Vec::new())
    }

    /// True iff any constituent source (or the scope itself) has fired.
    pub fn is_cancelled(&self) -> bool {
        if self.shared.fired.load(Ordering::SeqCst) {
            return true;
        }
        if self.sources.iter().any(CancellationToken::is_cancelled) {
            // The watcher may not have been polled yet; fire eagerly so
            // listeners observe cancellation before any further work.
            self.shared.fire();
            return true;
        }
        false
    }

    /// Resolves once the composite signal has fired.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.shared.composite.cancelled().await;
    }

    /// Fires the composite directly. Constituent sources are untouched.
    pub fn cancel(&self) {
        self.shared.fire();
    }

    /// Registers a listener that runs exactly once when the scope fires.
    ///
    /// A listener registered after the scope already fired runs immediately.
    pub fn on_cancel<F>(&self, listener: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_cancelled() {
            listener();
            return;
        }
        match self.shared.listeners.lock() {
            Ok(mut guard) => guard.push(Box::new(listener)),
            Err(poisoned) => poisoned.into_inner().push(Box::new(listener)),
        }
        // Close the race with a concurrent fire that drained the list
        // before our push landed.
        if self.shared.fired.load(Ordering::SeqCst) {
            let pending = match self.shared.listeners.lock() {
                Ok(mut guard) => std::mem::take(&mut *guard),
                Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
            };
            for listener in pending {
                listener();
            }
        }
    }

    /// A child token that is cancelled when the scope fires, for APIs that
    /// take a plain [`CancellationToken`].
    pub fn child_token(&self) -> CancellationToken {
        self.shared.composite.child_token()
    }
}

impl Drop for CancellationScope {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

impl std::fmt::Debug for CancellationScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationScope")
            .field("sources", &self.sources.len())
            .field("cancelled", &self.shared.fired.load(Ordering::SeqCst))
            .finish()
    }
}
