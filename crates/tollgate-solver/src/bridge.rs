//! Event bridge for third-party CAPTCHA widgets.
//!
//! A widget runs out of band (injected script, webview, headless browser)
//! and reports back through callbacks. Each render registers a request id
//! and gets a one-shot receiver; whoever hosts the widget dispatches events
//! by id. Nothing is keyed by ambient names. A receiver that has been
//! dropped makes dispatch return `false`, and its entry is pruned on the
//! next `register` or `pending` call.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::oneshot;

/// Identifies one widget render
pub type WidgetId = u64;

/// What a widget can report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetEvent {
    /// Solved; `token` goes to `/verify-captcha`
    Verified { token: String },
    /// Widget or provider error code
    Error { code: String },
    /// A previously issued token expired
    Expired,
    /// The user did not finish in time
    Timeout,
}

/// Request-id keyed dispatch table
#[derive(Debug, Default)]
pub struct WidgetBridge {
    next_id: AtomicU64,
    pending: Mutex<HashMap<WidgetId, oneshot::Sender<WidgetEvent>>>,
}

impl WidgetBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id and the receiver its first event will arrive on
    pub fn register(&self) -> (WidgetId, oneshot::Receiver<WidgetEvent>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        let mut pending = self.lock();
        prune_abandoned(&mut pending);
        pending.insert(id, tx);
        drop(pending);
        tracing::debug!(widget_id = id, "Widget registered");
        (id, rx)
    }

    /// Deliver `event` to the waiter for `id`.
    ///
    /// Returns false for unknown ids, repeated events and waiters that have
    /// gone away.
    pub fn dispatch(&self, id: WidgetId, event: WidgetEvent) -> bool {
        let Some(tx) = self.lock().remove(&id) else {
            tracing::debug!(widget_id = id, "Event for unknown widget dropped");
            return false;
        };

        match tx.send(event) {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!(widget_id = id, "Widget waiter gone, event dropped");
                false
            }
        }
    }

    /// Forget `id`; its receiver then resolves with an error
    pub fn cancel(&self, id: WidgetId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Number of widgets still waiting for an event
    pub fn pending(&self) -> usize {
        let mut pending = self.lock();
        prune_abandoned(&mut pending);
        pending.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<WidgetId, oneshot::Sender<WidgetEvent>>> {
        // A panic while holding the lock cannot leave the map inconsistent
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Drop entries whose receiver is gone
fn prune_abandoned(pending: &mut HashMap<WidgetId, oneshot::Sender<WidgetEvent>>) {
    pending.retain(|_, tx| !tx.is_closed());
}
