//! Per-interface worker task
//!
//! Each interface is driven by exactly one tokio task that drains a bounded
//! event queue. Packets, timer firings and management requests are all
//! serialized through that queue, so the NUD engine itself needs no locks.

use crate::config::{GlobalConfig, InterfaceConfig};
use crate::error::{NdpError, Result};
use crate::interface::Interface;
use crate::metrics::MetricsCollector;
use crate::notify::{NeighborEvent, NotificationSink};
use crate::packet::NdInfo;
use crate::timer::TokioTimers;
use crate::transport::NdTransport;
use crate::types::{NdpOperation, NeighborInfo, NeighborKey, NeighborSnapshot, PacketCounters};
use serde::Serialize;
use std::net::Ipv6Addr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Work item for an interface task
#[derive(Debug)]
pub enum InterfaceEvent {
    /// Decoded ND packet received on the port
    Packet(NdInfo),
    /// Neighbor timer fired
    TimerExpired { key: NeighborKey, generation: u64 },
    Snapshot(oneshot::Sender<InterfaceSnapshot>),
    Reconfigure(InterfaceConfig),
    /// Multicast a solicitation for an address
    Resolve(Ipv6Addr),
    /// Drop all neighbors (port down)
    Flush,
    Shutdown,
}

/// Point-in-time view of one interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceSnapshot {
    pub name: String,
    pub ifindex: u32,
    pub counters: PacketCounters,
    pub neighbors: Vec<NeighborSnapshot>,
}

/// Cloneable handle for posting work to an interface task
#[derive(Debug, Clone)]
pub struct InterfaceHandle {
    name: String,
    tx: mpsc::Sender<InterfaceEvent>,
}

impl InterfaceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn post(&self, event: InterfaceEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| NdpError::ChannelClosed(self.name.clone()))
    }

    /// Queue a received packet, waiting if the queue is full
    pub async fn deliver(&self, nd: NdInfo) -> Result<()> {
        self.post(InterfaceEvent::Packet(nd)).await
    }

    pub async fn snapshot(&self) -> Result<InterfaceSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.post(InterfaceEvent::Snapshot(tx)).await?;
        rx.await
            .map_err(|_| NdpError::ChannelClosed(self.name.clone()))
    }

    /// Copies of every cached neighbor
    pub async fn neighbors(&self) -> Result<Vec<NeighborSnapshot>> {
        Ok(self.snapshot().await?.neighbors)
    }

    pub async fn counters(&self) -> Result<PacketCounters> {
        Ok(self.snapshot().await?.counters)
    }

    pub async fn reconfigure(&self, config: InterfaceConfig) -> Result<()> {
        self.post(InterfaceEvent::Reconfigure(config)).await
    }

    pub async fn resolve(&self, target: Ipv6Addr) -> Result<()> {
        self.post(InterfaceEvent::Resolve(target)).await
    }

    pub async fn flush(&self) -> Result<()> {
        self.post(InterfaceEvent::Flush).await
    }

    /// Ask the task to stop; pending timers are cancelled with it
    pub async fn shutdown(&self) -> Result<()> {
        self.post(InterfaceEvent::Shutdown).await
    }
}

/// Start the worker task for one interface
pub fn spawn_interface(
    config: InterfaceConfig,
    global: &GlobalConfig,
    transport: Arc<dyn NdTransport>,
    sink: Arc<dyn NotificationSink>,
    metrics: MetricsCollector,
) -> (InterfaceHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(global.event_queue_depth);
    let timers = TokioTimers::new(tx.downgrade());
    let handle = InterfaceHandle {
        name: config.name.clone(),
        tx,
    };

    let interface = Interface::new(
        config,
        global.max_unicast_solicit,
        transport,
        Box::new(timers),
        metrics,
    );
    let task = tokio::spawn(run(interface, rx, sink));
    (handle, task)
}

async fn run(
    mut interface: Interface,
    mut rx: mpsc::Receiver<InterfaceEvent>,
    sink: Arc<dyn NotificationSink>,
) {
    info!(interface = %interface.name(), ifindex = interface.ifindex(), "Interface worker started");

    while let Some(event) = rx.recv().await {
        match event {
            InterfaceEvent::Packet(nd) => {
                let key = nd.neighbor_key();
                let (info, op) = interface.process_packet(&nd);
                publish(&interface, sink.as_ref(), &key, info, op);
            }
            InterfaceEvent::TimerExpired { key, generation } => {
                let (info, op) = interface.on_timer_expired(key, generation);
                publish(&interface, sink.as_ref(), &key, info, op);
            }
            InterfaceEvent::Snapshot(reply) => {
                let snapshot = InterfaceSnapshot {
                    name: interface.name().to_string(),
                    ifindex: interface.ifindex(),
                    counters: interface.counters(),
                    neighbors: interface.neighbors(),
                };
                if reply.send(snapshot).is_err() {
                    debug!(interface = %interface.name(), "Snapshot requester went away");
                }
            }
            InterfaceEvent::Reconfigure(config) => interface.reconfigure(config),
            InterfaceEvent::Resolve(target) => {
                if let Err(e) = interface.resolve(target) {
                    warn!(
                        interface = %interface.name(),
                        %target,
                        error = %e,
                        "Address resolution failed"
                    );
                }
            }
            InterfaceEvent::Flush => {
                for info in interface.flush() {
                    let key = NeighborKey::new(info.ip, info.mac);
                    publish(&interface, sink.as_ref(), &key, Some(info), NdpOperation::Delete);
                }
            }
            InterfaceEvent::Shutdown => break,
        }
    }

    info!(
        interface = %interface.name(),
        neighbors = interface.neighbor_count(),
        "Interface worker stopped"
    );
}

fn publish(
    interface: &Interface,
    sink: &dyn NotificationSink,
    key: &NeighborKey,
    info: Option<NeighborInfo>,
    op: NdpOperation,
) {
    if op == NdpOperation::Ignore {
        return;
    }
    sink.notify(NeighborEvent::new(
        op,
        interface.ifindex(),
        interface.name(),
        key,
        info,
    ));
}
