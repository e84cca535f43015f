//! Recurring metrics polling shared across subscribers.
//!
//! [`SubscriptionRegistry`] owns at most one polling task per workspace id,
//! however many connections subscribe to it. Subscribers are reference
//! counted; the task is cancelled when the last one leaves.
//!
//! ## Fan-out
//!
//! Each polling task publishes into a bounded `broadcast` channel. A
//! subscriber that falls behind loses the oldest snapshots (it sees
//! `RecvError::Lagged`) instead of growing an unbounded queue.
//!
//! ## Cancellation
//!
//! Teardown cancels the task's [`CancellationToken`]. A tick that is already
//! waiting on `docker` runs to completion, but its result is dropped: the task
//! re-checks the token before publishing.
//!
//! ## Concurrency
//!
//! The registry map is behind a `Mutex` held across the state transition and
//! its effect, so two concurrent subscribes for one id cannot both start a
//! task.

pub mod connection;
pub mod state;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::runtime::collector::MetricsCollector;
use crate::runtime::stats::MetricsSnapshot;
use crate::workspace::WorkspaceId;
use state::{transition, Effect, StreamEvent, StreamState};

pub use connection::ConnectionSubscriptions;

/// Identifies one subscribing connection.
pub type SubscriberId = Uuid;

/// One published reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsEvent {
    pub workspace_id: WorkspaceId,
    pub data: MetricsSnapshot,
}

impl MetricsEvent {
    /// Wire form: `{"type":"metrics","workspaceId":..,"workspaceName":..,"data":..}`.
    ///
    /// `workspaceName` carries the same id for clients that still read the
    /// legacy field.
    pub fn to_message(&self) -> Value {
        json!({
            "type": "metrics",
            "workspaceId": self.workspace_id,
            "workspaceName": self.workspace_id,
            "data": self.data,
        })
    }
}

struct Subscription {
    subscribers: HashSet<SubscriberId>,
    events: broadcast::Sender<Arc<MetricsEvent>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Subscription {
    fn state(&self) -> StreamState {
        if self.subscribers.is_empty() {
            StreamState::Idle
        } else {
            StreamState::Polling {
                subscribers: self.subscribers.len(),
            }
        }
    }
}

/// Process-wide registry of workspace polling tasks.
///
/// Cloneable — all clones share the same inner map.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    subscriptions: Arc<Mutex<HashMap<WorkspaceId, Subscription>>>,
    collector: MetricsCollector,
    poll_interval: Duration,
    queue_depth: usize,
}

impl SubscriptionRegistry {
    pub fn new(collector: MetricsCollector, poll_interval: Duration, queue_depth: usize) -> Self {
        Self {
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            collector,
            poll_interval,
            queue_depth: queue_depth.max(1),
        }
    }

    /// Register `subscriber` for `workspace`.
    ///
    /// Returns a receiver for the workspace's events, or `None` if this
    /// subscriber was already registered (subscribing twice is a no-op).
    pub async fn subscribe(
        &self,
        subscriber: SubscriberId,
        workspace: &WorkspaceId,
    ) -> Option<broadcast::Receiver<Arc<MetricsEvent>>> {
        let mut subs = self.subscriptions.lock().await;
        let current = subs.get(workspace).map_or(StreamState::Idle, Subscription::state);
        if subs
            .get(workspace)
            .is_some_and(|s| s.subscribers.contains(&subscriber))
        {
            return None;
        }

        let (next, effect) = transition(current, StreamEvent::Subscribe);
        if effect == Effect::StartPolling {
            let (events, _) = broadcast::channel(self.queue_depth);
            let cancel = CancellationToken::new();
            let task = tokio::spawn(poll_task(
                workspace.clone(),
                self.collector.clone(),
                self.poll_interval,
                events.clone(),
                cancel.clone(),
            ));
            info!(workspace = %workspace, "metrics polling started");
            subs.insert(
                workspace.clone(),
                Subscription {
                    subscribers: HashSet::new(),
                    events,
                    cancel,
                    task,
                },
            );
        }

        let entry = subs.get_mut(workspace)?;
        entry.subscribers.insert(subscriber);
        debug_assert_eq!(entry.state(), next);
        Some(entry.events.subscribe())
    }

    /// Remove `subscriber` from `workspace`; stops polling when it was the
    /// last one. Returns `false` if it was not subscribed.
    pub async fn unsubscribe(&self, subscriber: SubscriberId, workspace: &WorkspaceId) -> bool {
        let mut subs = self.subscriptions.lock().await;
        let Some(entry) = subs.get_mut(workspace) else {
            return false;
        };
        let current = entry.state();
        if !entry.subscribers.remove(&subscriber) {
            return false;
        }
        let (_, effect) = transition(current, StreamEvent::Unsubscribe);
        if effect == Effect::StopPolling {
            if let Some(sub) = subs.remove(workspace) {
                sub.cancel.cancel();
                info!(workspace = %workspace, "metrics polling stopped");
            }
        }
        true
    }

    /// Number of workspaces with a live polling task.
    pub async fn active_polls(&self) -> usize {
        self.subscriptions.lock().await.len()
    }

    /// Number of subscribers for `workspace` (0 when idle).
    pub async fn subscriber_count(&self, workspace: &WorkspaceId) -> usize {
        self.subscriptions
            .lock()
            .await
            .get(workspace)
            .map_or(0, |s| s.subscribers.len())
    }

    /// Stop every polling task. In-flight commands are killed.
    pub async fn shutdown(&self) {
        let mut subs = self.subscriptions.lock().await;
        for (_, sub) in subs.drain() {
            sub.cancel.cancel();
            sub.task.abort();
        }
    }
}

/// Poll `workspace` every `period` until `cancel` fires.
///
/// The first reading is taken one full period after start. A failed reading
/// is logged and published as an `unknown` snapshot; polling continues.
async fn poll_task(
    workspace: WorkspaceId,
    collector: MetricsCollector,
    period: Duration,
    events: broadcast::Sender<Arc<MetricsEvent>>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let data = match collector.collect(&workspace).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(workspace = %workspace, "metrics tick failed: {e}");
                MetricsSnapshot::unknown()
            }
        };

        if cancel.is_cancelled() {
            debug!(workspace = %workspace, "discarding reading for cancelled subscription");
            break;
        }

        // Err only means no receiver is currently attached.
        let _ = events.send(Arc::new(MetricsEvent {
            workspace_id: workspace.clone(),
            data,
        }));
    }
}
