//! Upstream notification of neighbor table changes

use crate::types::{NdpOperation, NeighborInfo, NeighborKey};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// One neighbor table change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NeighborEvent {
    pub operation: NdpOperation,
    pub ifindex: u32,
    pub interface: String,
    /// "ip_mac" key of the neighbor
    pub key: String,
    /// Present on CREATE and DELETE
    pub neighbor: Option<NeighborInfo>,
}

impl NeighborEvent {
    pub fn new(
        operation: NdpOperation,
        ifindex: u32,
        interface: &str,
        key: &NeighborKey,
        neighbor: Option<NeighborInfo>,
    ) -> Self {
        Self {
            operation,
            ifindex,
            interface: interface.to_string(),
            key: key.to_string(),
            neighbor,
        }
    }
}

/// Receiver of neighbor table changes (routing, management, ...)
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: NeighborEvent);
}

/// Forwards events into an unbounded tokio channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<NeighborEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NeighborEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, event: NeighborEvent) {
        if self.tx.send(event).is_err() {
            debug!("Notification receiver dropped");
        }
    }
}

/// Writes every change to the log
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, event: NeighborEvent) {
        info!(
            operation = ?event.operation,
            interface = %event.interface,
            neighbor = %event.key,
            "Neighbor table changed"
        );
    }
}
