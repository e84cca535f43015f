//! Per-connection view of the subscription registry.
//!
//! Each WebSocket connection owns one [`ConnectionSubscriptions`]. It tracks
//! which workspace ids this connection subscribed to and runs one forwarder
//! task per id that copies registry events onto the connection's outbound
//! queue. Closing the connection releases every id it held.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use super::{MetricsEvent, SubscriberId, SubscriptionRegistry};
use crate::workspace::WorkspaceId;

pub struct ConnectionSubscriptions {
    id: SubscriberId,
    registry: SubscriptionRegistry,
    outbound: mpsc::Sender<Value>,
    forwarders: HashMap<WorkspaceId, JoinHandle<()>>,
}

impl ConnectionSubscriptions {
    pub fn new(registry: SubscriptionRegistry, outbound: mpsc::Sender<Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            registry,
            outbound,
            forwarders: HashMap::new(),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Start receiving metrics for `workspace`. Returns `false` if this
    /// connection was already subscribed.
    pub async fn subscribe(&mut self, workspace: &WorkspaceId) -> bool {
        if self.forwarders.contains_key(workspace) {
            return false;
        }
        let Some(rx) = self.registry.subscribe(self.id, workspace).await else {
            return false;
        };
        let task = tokio::spawn(forward(workspace.clone(), rx, self.outbound.clone()));
        self.forwarders.insert(workspace.clone(), task);
        true
    }

    /// Stop receiving metrics for `workspace`. Returns `false` if this
    /// connection was not subscribed.
    pub async fn unsubscribe(&mut self, workspace: &WorkspaceId) -> bool {
        let Some(task) = self.forwarders.remove(workspace) else {
            return false;
        };
        // Nothing queued for this id may reach the client after this point.
        task.abort();
        self.registry.unsubscribe(self.id, workspace).await;
        true
    }

    /// Drop every subscription this connection holds. Returns how many.
    pub async fn unsubscribe_all(&mut self) -> usize {
        let ids: Vec<WorkspaceId> = self.forwarders.keys().cloned().collect();
        for id in &ids {
            self.unsubscribe(id).await;
        }
        ids.len()
    }

    /// Workspace ids this connection is subscribed to, sorted.
    pub fn workspaces(&self) -> Vec<WorkspaceId> {
        let mut ids: Vec<WorkspaceId> = self.forwarders.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Release everything on disconnect.
    pub async fn close(mut self) {
        self.unsubscribe_all().await;
    }
}

/// Copy events for one workspace onto the connection's outbound queue until
/// either side closes.
async fn forward(
    workspace: WorkspaceId,
    mut events: broadcast::Receiver<Arc<MetricsEvent>>,
    outbound: mpsc::Sender<Value>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if outbound.send(event.to_message()).await.is_err() {
                    return;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(workspace = %workspace, "slow subscriber, dropped {skipped} oldest snapshots");
            }
            Err(RecvError::Closed) => return,
        }
    }
}
