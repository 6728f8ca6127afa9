//! NDP server: owns the set of managed interfaces
//!
//! The server is constructed explicitly and torn down with
//! [`NdpServer::shutdown`]. Every interface gets its own worker task and, when
//! started from configuration, a receive task reading its raw socket.

use crate::config::{GlobalConfig, InterfaceConfig, NdpdConfig};
use crate::error::{NdpError, Result};
use crate::metrics::MetricsCollector;
use crate::notify::NotificationSink;
use crate::packet;
use crate::transport::{FrameSource, NdTransport, RawSocket};
use crate::worker::{InterfaceHandle, InterfaceSnapshot, spawn_interface};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, trace, warn};

/// Large enough for a jumbo frame
const RECV_BUFFER_SIZE: usize = 9216;

struct ManagedInterface {
    handle: InterfaceHandle,
    worker: JoinHandle<()>,
    receiver: Option<JoinHandle<()>>,
}

pub struct NdpServer {
    global: GlobalConfig,
    sink: Arc<dyn NotificationSink>,
    metrics: MetricsCollector,
    interfaces: Vec<ManagedInterface>,
}

impl NdpServer {
    pub fn new(
        global: GlobalConfig,
        sink: Arc<dyn NotificationSink>,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            global,
            sink,
            metrics,
            interfaces: Vec::new(),
        }
    }

    /// Build a server with a raw socket and receive task per configured
    /// interface.
    ///
    /// Requires CAP_NET_RAW. Fails on the first interface that cannot be
    /// opened; interfaces already started are shut down again.
    ///
    /// # NIST Controls
    /// - AC-3: Access Enforcement - Raw sockets need CAP_NET_RAW
    /// - SC-7: Boundary Protection - One socket bound per managed port
    #[instrument(skip_all, fields(interfaces = config.interfaces.len()))]
    pub async fn start(
        config: &NdpdConfig,
        sink: Arc<dyn NotificationSink>,
        metrics: MetricsCollector,
    ) -> Result<Self> {
        let mut server = Self::new(config.global.clone(), sink, metrics);

        for intf in &config.interfaces {
            if let Err(e) = server.open_interface(intf.clone()) {
                error!(interface = %intf.name, error = %e, "Failed to start interface");
                server.shutdown().await;
                return Err(e);
            }
        }

        info!(interfaces = server.interfaces.len(), "NDP server started");
        Ok(server)
    }

    fn open_interface(&mut self, mut config: InterfaceConfig) -> Result<()> {
        config.resolve_ifindex()?;
        let socket = Arc::new(RawSocket::open(&config.name, config.ifindex)?);
        self.add_receiving_interface(config, socket)?;
        Ok(())
    }

    /// Start managing an interface whose port both sends solicitations and
    /// yields received frames.
    ///
    /// A receive task decodes every frame from `port`; frames that are not
    /// well-formed ND are dropped before they reach the interface.
    pub fn add_receiving_interface<P>(
        &mut self,
        config: InterfaceConfig,
        port: Arc<P>,
    ) -> Result<InterfaceHandle>
    where
        P: NdTransport + FrameSource,
    {
        let handle = self.add_interface(config, port.clone())?;
        let receiver = tokio::spawn(receive_loop(port, handle.clone()));

        if let Some(managed) = self.interfaces.last_mut() {
            managed.receiver = Some(receiver);
        }
        Ok(handle)
    }

    /// Start managing an interface over `transport`.
    ///
    /// Inbound packets are not read by the server for interfaces added this
    /// way; the caller feeds them through the returned handle.
    pub fn add_interface(
        &mut self,
        config: InterfaceConfig,
        transport: Arc<dyn NdTransport>,
    ) -> Result<InterfaceHandle> {
        if self.handle(&config.name).is_some() {
            return Err(NdpError::Config(format!(
                "interface {} already managed",
                config.name
            )));
        }

        let (handle, worker) = spawn_interface(
            config,
            &self.global,
            transport,
            self.sink.clone(),
            self.metrics.clone(),
        );
        self.interfaces.push(ManagedInterface {
            handle: handle.clone(),
            worker,
            receiver: None,
        });
        self.metrics.interfaces.set(self.interfaces.len() as f64);
        Ok(handle)
    }

    pub fn handles(&self) -> Vec<InterfaceHandle> {
        self.interfaces.iter().map(|m| m.handle.clone()).collect()
    }

    pub fn handle(&self, name: &str) -> Option<InterfaceHandle> {
        self.interfaces
            .iter()
            .find(|m| m.handle.name() == name)
            .map(|m| m.handle.clone())
    }

    /// Snapshot every interface, in the order they were added
    pub async fn snapshot_all(&self) -> Result<Vec<InterfaceSnapshot>> {
        let mut snapshots = Vec::with_capacity(self.interfaces.len());
        for managed in &self.interfaces {
            snapshots.push(managed.handle.snapshot().await?);
        }
        Ok(snapshots)
    }

    /// Stop every receive and worker task and wait for the workers to exit
    pub async fn shutdown(mut self) {
        for managed in self.interfaces.drain(..) {
            if let Some(receiver) = managed.receiver {
                receiver.abort();
            }
            if managed.handle.shutdown().await.is_err() {
                trace!(interface = %managed.handle.name(), "Worker already stopped");
            }
            if let Err(e) = managed.worker.await {
                warn!(interface = %managed.handle.name(), error = %e, "Worker task failed");
            }
        }
        self.metrics.interfaces.set(0.0);
        info!("NDP server stopped");
    }
}

async fn receive_loop<S: FrameSource>(source: Arc<S>, handle: InterfaceHandle) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    loop {
        let len = match source.next_frame(&mut buf).await {
            Ok(len) => len,
            Err(e) => {
                error!(
                    interface = %handle.name(),
                    error = %e,
                    "Receive failed, stopping receiver"
                );
                return;
            }
        };

        // Every IPv6 frame arrives here; most are not ND
        let nd = match packet::decode(&buf[..len]) {
            Ok(nd) => nd,
            Err(e) => {
                trace!(interface = %handle.name(), error = %e, "Dropping frame");
                continue;
            }
        };

        if handle.deliver(nd).await.is_err() {
            return;
        }
    }
}
