//! IPv6 Neighbor Discovery daemon
//!
//! Learns neighbors from received Neighbor Solicitations and keeps them
//! verified with Neighbor Unreachability Detection (RFC 4861 §7.3): cached
//! neighbors are probed with unicast solicitations when their reachability
//! lapses and evicted once a bounded number of probes go unanswered. Every
//! table change is reported upstream as a CREATE / UPDATE / DELETE event.
//!
//! # Architecture
//!
//! ```text
//!   raw socket ──decode──▶ InterfaceHandle ──queue──▶ interface worker
//!                                                     │  Interface
//!   timer tasks ─────────────── TimerExpired ───────▶ │   ├─ NeighborCache
//!                                                     │   ├─ process_ns / process_na
//!                                                     │   └─ send_unicast_ns ──▶ NdTransport
//!                                                     ▼
//!                                              NotificationSink
//! ```
//!
//! One worker task per interface owns that interface's cache; nothing in the
//! NUD engine is shared between tasks.

pub mod api;
pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
mod inbound;
pub mod interface;
pub mod metrics;
pub mod notify;
pub mod packet;
mod scheduler;
pub mod server;
pub mod timer;
pub mod transport;
pub mod types;
pub mod worker;

pub use cache::NeighborCache;
pub use config::{GlobalConfig, InterfaceConfig, NdpdConfig};
pub use entry::{NeighborEntry, TimerKind};
pub use error::{NdpError, Result};
pub use interface::Interface;
pub use metrics::MetricsCollector;
pub use notify::{ChannelSink, LogSink, NeighborEvent, NotificationSink};
pub use packet::{NdInfo, NdMessageType, NdOption, Solicitation};
pub use server::NdpServer;
pub use timer::{ManualTimers, TimerService, TokioTimers};
pub use transport::{NdTransport, RawSocket};
pub use types::{
    MacAddress, NdpOperation, NeighborInfo, NeighborKey, NeighborSnapshot, NeighborState,
    PacketCounters,
};
pub use worker::{InterfaceHandle, InterfaceSnapshot, spawn_interface};
