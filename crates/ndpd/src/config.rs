//! Configuration file support for ndpd
//!
//! Loads and validates configuration from TOML files.
//! Default location: /etc/ndpd/ndpd.conf

use crate::entry::TimerKind;
use crate::error::{NdpError, Result};
use crate::types::{MacAddress, is_link_local};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ndpd/ndpd.conf";

/// Daemon-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Unicast probes sent before a neighbor is evicted
    #[serde(default = "default_max_unicast_solicit")]
    pub max_unicast_solicit: u32,

    /// Per-interface event queue capacity
    #[serde(default = "default_event_queue_depth")]
    pub event_queue_depth: usize,

    /// Management HTTP port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Serve the management HTTP endpoint
    #[serde(default = "default_api_enabled")]
    pub api_enabled: bool,
}

/// Per-interface settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Interface name (e.g. "Ethernet0")
    pub name: String,

    /// Kernel interface index; 0 resolves it from the name at startup
    #[serde(default)]
    pub ifindex: u32,

    /// Our hardware address on this port
    pub mac: MacAddress,

    /// Source address for link-local targets
    pub link_local: IpAddr,

    /// Source address for everything else; link-local is used when absent
    #[serde(default)]
    pub global: Option<IpAddr>,

    #[serde(default = "default_reachable_time_ms")]
    pub reachable_time_ms: u64,

    #[serde(default = "default_retrans_time_ms")]
    pub retrans_time_ms: u64,

    #[serde(default = "default_delay_first_probe_time_ms")]
    pub delay_first_probe_time_ms: u64,
}

/// Complete ndpd configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NdpdConfig {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub interfaces: Vec<InterfaceConfig>,
}

// Default functions (RFC 4861 protocol constants)
fn default_max_unicast_solicit() -> u32 {
    3
}

fn default_event_queue_depth() -> usize {
    1024
}

fn default_api_port() -> u16 {
    9092
}

fn default_api_enabled() -> bool {
    true
}

fn default_reachable_time_ms() -> u64 {
    30_000
}

fn default_retrans_time_ms() -> u64 {
    1_000
}

fn default_delay_first_probe_time_ms() -> u64 {
    5_000
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            max_unicast_solicit: default_max_unicast_solicit(),
            event_queue_depth: default_event_queue_depth(),
            api_port: default_api_port(),
            api_enabled: default_api_enabled(),
        }
    }
}

impl InterfaceConfig {
    /// Interface with protocol-default timers
    pub fn new(name: impl Into<String>, ifindex: u32, mac: MacAddress, link_local: IpAddr) -> Self {
        Self {
            name: name.into(),
            ifindex,
            mac,
            link_local,
            global: None,
            reachable_time_ms: default_reachable_time_ms(),
            retrans_time_ms: default_retrans_time_ms(),
            delay_first_probe_time_ms: default_delay_first_probe_time_ms(),
        }
    }

    pub fn with_global(mut self, global: IpAddr) -> Self {
        self.global = Some(global);
        self
    }

    pub fn reachable_time(&self) -> Duration {
        Duration::from_millis(self.reachable_time_ms)
    }

    pub fn retrans_time(&self) -> Duration {
        Duration::from_millis(self.retrans_time_ms)
    }

    pub fn delay_first_probe_time(&self) -> Duration {
        Duration::from_millis(self.delay_first_probe_time_ms)
    }

    /// How long a timer of `kind` runs on this interface
    pub fn timer_interval(&self, kind: TimerKind) -> Duration {
        match kind {
            TimerKind::Reachable => self.reachable_time(),
            TimerKind::DelayProbe => self.delay_first_probe_time(),
            TimerKind::Retransmit => self.retrans_time(),
        }
    }

    /// Source address by scope of the target
    pub fn source_for(&self, target: &IpAddr) -> IpAddr {
        if is_link_local(target) {
            self.link_local
        } else {
            self.global.unwrap_or(self.link_local)
        }
    }

    /// Fill in the interface index from the kernel when not configured
    #[cfg(target_os = "linux")]
    pub fn resolve_ifindex(&mut self) -> Result<()> {
        if self.ifindex == 0 {
            self.ifindex = nix::net::if_::if_nametoindex(self.name.as_str())
                .map_err(|_| NdpError::InterfaceNotFound(self.name.clone()))?;
        }
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    pub fn resolve_ifindex(&mut self) -> Result<()> {
        if self.ifindex == 0 {
            return Err(NdpError::InterfaceNotFound(self.name.clone()));
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(NdpError::Config("interface name must not be empty".to_string()));
        }
        if self.mac.is_zero() || self.mac.is_multicast() {
            return Err(NdpError::Config(format!(
                "{}: mac {} is not a unicast address",
                self.name, self.mac
            )));
        }
        if !is_link_local(&self.link_local) {
            return Err(NdpError::Config(format!(
                "{}: link_local {} is not link-local scope",
                self.name, self.link_local
            )));
        }
        if let Some(global) = &self.global {
            if is_link_local(global) || global.is_unspecified() || global.is_multicast() {
                return Err(NdpError::Config(format!(
                    "{}: global {} is not a global unicast address",
                    self.name, global
                )));
            }
        }
        if self.reachable_time_ms == 0
            || self.retrans_time_ms == 0
            || self.delay_first_probe_time_ms == 0
        {
            return Err(NdpError::Config(format!(
                "{}: timer intervals must be > 0",
                self.name
            )));
        }
        Ok(())
    }
}

impl NdpdConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).map_err(|e| match e {
                NdpError::Config(msg) => NdpError::Config(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    msg
                )),
                other => other,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(NdpError::Io(e)),
        }
    }

    /// Load from default location or defaults
    pub fn load() -> Result<Self> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| NdpError::Config(e.to_string()))
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| NdpError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    ///
    /// # NIST Controls
    /// - CM-6: Configuration Settings - Bounds checked before use
    pub fn validate(&self) -> Result<()> {
        if self.global.max_unicast_solicit == 0 {
            return Err(NdpError::Config("max_unicast_solicit must be > 0".to_string()));
        }
        if self.global.event_queue_depth == 0 {
            return Err(NdpError::Config("event_queue_depth must be > 0".to_string()));
        }

        let mut names = HashSet::new();
        for intf in &self.interfaces {
            intf.validate()?;
            if !names.insert(intf.name.as_str()) {
                return Err(NdpError::Config(format!(
                    "interface {} configured twice",
                    intf.name
                )));
            }
        }
        Ok(())
    }
}
