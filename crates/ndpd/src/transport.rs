//! Packet transport for neighbor discovery frames
//!
//! The NUD core only needs to hand a [`Solicitation`] to something that puts
//! it on the wire. On Linux that is an AF_PACKET socket bound to the port,
//! polled through tokio's `AsyncFd` for the receive side.

use crate::error::Result;
use crate::packet::Solicitation;
use std::future::Future;

/// Sends solicitations on one interface.
///
/// Implementations must not block indefinitely; a failure is reported and
/// the caller absorbs it.
pub trait NdTransport: Send + Sync {
    fn send_solicitation(&self, ns: &Solicitation) -> Result<()>;
}

/// Yields raw Ethernet frames received on one interface.
///
/// An error ends the receive loop reading from the source.
pub trait FrameSource: Send + Sync + 'static {
    fn next_frame<'a>(
        &'a self,
        buf: &'a mut [u8],
    ) -> impl Future<Output = Result<usize>> + Send + 'a;
}

#[cfg(target_os = "linux")]
mod linux {
    use super::{FrameSource, NdTransport};
    use crate::error::{NdpError, Result};
    use crate::packet::{Solicitation, encode_solicitation};
    use std::future::Future;
    use std::io;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
    use tokio::io::unix::AsyncFd;
    use tracing::{debug, instrument, warn};

    /// Socket receive buffer size, sized for ND bursts on a busy port
    const SOCKET_RECV_BUFFER_SIZE: libc::c_int = 256 * 1024;

    /// Raw packet socket bound to one interface, receiving IPv6 frames
    pub struct RawSocket {
        fd: AsyncFd<OwnedFd>,
        name: String,
        ifindex: u32,
    }

    impl RawSocket {
        /// Open a non-blocking AF_PACKET socket on `ifindex`.
        ///
        /// Requires CAP_NET_RAW and a running tokio runtime.
        #[instrument]
        pub fn open(name: &str, ifindex: u32) -> Result<Self> {
            let protocol = (libc::ETH_P_IPV6 as u16).to_be();

            let raw = unsafe {
                libc::socket(
                    libc::AF_PACKET,
                    libc::SOCK_RAW | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                    libc::c_int::from(protocol),
                )
            };
            if raw < 0 {
                return Err(NdpError::Transport(format!(
                    "{}: failed to create socket: {}",
                    name,
                    io::Error::last_os_error()
                )));
            }
            let owned = unsafe { OwnedFd::from_raw_fd(raw) };

            let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
            addr.sll_family = libc::AF_PACKET as libc::c_ushort;
            addr.sll_protocol = protocol;
            addr.sll_ifindex = ifindex as libc::c_int;

            let ret = unsafe {
                libc::bind(
                    owned.as_raw_fd(),
                    &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                    std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
                )
            };
            if ret < 0 {
                return Err(NdpError::Transport(format!(
                    "{}: failed to bind to ifindex {}: {}",
                    name,
                    ifindex,
                    io::Error::last_os_error()
                )));
            }

            let ret = unsafe {
                libc::setsockopt(
                    owned.as_raw_fd(),
                    libc::SOL_SOCKET,
                    libc::SO_RCVBUF,
                    &SOCKET_RECV_BUFFER_SIZE as *const _ as *const libc::c_void,
                    std::mem::size_of::<libc::c_int>() as libc::socklen_t,
                )
            };
            if ret < 0 {
                warn!(interface = name, "Failed to set SO_RCVBUF, using default buffer size");
            }

            let fd = AsyncFd::new(owned).map_err(|e| {
                NdpError::Transport(format!("{}: failed to create AsyncFd: {}", name, e))
            })?;

            debug!(interface = name, ifindex, "Raw ND socket bound");
            Ok(Self {
                fd,
                name: name.to_string(),
                ifindex,
            })
        }

        pub fn ifindex(&self) -> u32 {
            self.ifindex
        }

        /// Receive the next inbound frame into `buf`, returning its length.
        ///
        /// Our own transmissions looped back by the kernel are skipped.
        pub async fn recv_frame(&self, buf: &mut [u8]) -> Result<usize> {
            loop {
                let mut guard = self.fd.readable().await?;

                let result = guard.try_io(|inner| {
                    let mut from: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
                    let mut from_len = std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t;
                    let n = unsafe {
                        libc::recvfrom(
                            inner.as_raw_fd(),
                            buf.as_mut_ptr() as *mut libc::c_void,
                            buf.len(),
                            0,
                            &mut from as *mut libc::sockaddr_ll as *mut libc::sockaddr,
                            &mut from_len,
                        )
                    };
                    if n < 0 {
                        Err(io::Error::last_os_error())
                    } else {
                        Ok((n as usize, from.sll_pkttype))
                    }
                });

                match result {
                    Ok(Ok((_, pkttype))) if pkttype == libc::PACKET_OUTGOING => continue,
                    Ok(Ok((len, _))) => return Ok(len),
                    Ok(Err(e)) => return Err(NdpError::Io(e)),
                    Err(_would_block) => continue,
                }
            }
        }
    }

    impl FrameSource for RawSocket {
        fn next_frame<'a>(
            &'a self,
            buf: &'a mut [u8],
        ) -> impl Future<Output = Result<usize>> + Send + 'a {
            self.recv_frame(buf)
        }
    }

    impl NdTransport for RawSocket {
        fn send_solicitation(&self, ns: &Solicitation) -> Result<()> {
            let frame = encode_solicitation(ns)?;
            let n = unsafe {
                libc::send(
                    self.fd.as_raw_fd(),
                    frame.as_ptr() as *const libc::c_void,
                    frame.len(),
                    libc::MSG_DONTWAIT,
                )
            };
            if n < 0 {
                return Err(NdpError::Transport(format!(
                    "{}: send failed: {}",
                    self.name,
                    io::Error::last_os_error()
                )));
            }
            if n as usize != frame.len() {
                return Err(NdpError::Transport(format!(
                    "{}: short send {} of {} bytes",
                    self.name,
                    n,
                    frame.len()
                )));
            }
            Ok(())
        }
    }
}

#[cfg(target_os = "linux")]
pub use linux::*;

/// Mock implementation for non-Linux platforms (development only)
#[cfg(not(target_os = "linux"))]
mod mock {
    use super::{FrameSource, NdTransport};
    use crate::error::{NdpError, Result};
    use crate::packet::Solicitation;
    use std::future::Future;

    pub struct RawSocket {
        ifindex: u32,
    }

    impl RawSocket {
        pub fn open(name: &str, _ifindex: u32) -> Result<Self> {
            Err(NdpError::Transport(format!(
                "{}: raw packet sockets are only supported on Linux",
                name
            )))
        }

        pub fn ifindex(&self) -> u32 {
            self.ifindex
        }

        pub async fn recv_frame(&self, _buf: &mut [u8]) -> Result<usize> {
            std::future::pending().await
        }
    }

    impl FrameSource for RawSocket {
        fn next_frame<'a>(
            &'a self,
            buf: &'a mut [u8],
        ) -> impl Future<Output = Result<usize>> + Send + 'a {
            self.recv_frame(buf)
        }
    }

    impl NdTransport for RawSocket {
        fn send_solicitation(&self, _ns: &Solicitation) -> Result<()> {
            Err(NdpError::Transport("unsupported platform".into()))
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub use mock::*;
