//! Packet sources feeding the reassembly engine

use crate::error::{RecvError, RecvResult};
use sfdaq_common::consts::{BUFFER_UDP_US_TIMEOUT, BYTES_PER_PACKET};
use sfdaq_common::formats::PacketFrame;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::mem::MaybeUninit;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Anything that can deliver detector packets of one module.
pub trait PacketSource {
    /// Fill the front of `packets` with whatever is available.
    ///
    /// Returns how many packets were written; `Ok(0)` means nothing arrived
    /// within the source's wait period and the caller may try again.
    fn receive(&mut self, packets: &mut [PacketFrame]) -> RecvResult<usize>;
}

/// UDP socket bound to one module's port.
///
/// A receive call waits up to `BUFFER_UDP_US_TIMEOUT` for the first packet
/// and then drains whatever else the kernel already holds, without waiting.
/// Datagrams that are not exactly one packet long are discarded.
pub struct UdpPacketSource {
    socket: Socket,
    port: u16,
    n_dropped: u64,
}

impl UdpPacketSource {
    /// Bind `0.0.0.0:port`, asking the kernel for `rcvbuf_bytes` of receive buffer.
    pub fn bind(port: u16, rcvbuf_bytes: usize) -> RecvResult<Self> {
        let bind_err = |source: io::Error| RecvError::Bind { port, source };

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(bind_err)?;
        socket.set_reuse_address(true).map_err(bind_err)?;

        if let Err(e) = socket.set_recv_buffer_size(rcvbuf_bytes) {
            warn!(port, error = %e, "Failed to set UDP receive buffer size");
        } else if let Ok(actual) = socket.recv_buffer_size() {
            // Linux reports twice the effective value and caps at rmem_max.
            if actual < rcvbuf_bytes {
                warn!(
                    port,
                    requested = rcvbuf_bytes,
                    actual,
                    "UDP receive buffer smaller than requested (check net.core.rmem_max)"
                );
            }
        }

        socket
            .set_read_timeout(Some(Duration::from_micros(BUFFER_UDP_US_TIMEOUT)))
            .map_err(bind_err)?;

        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        socket.bind(&addr.into()).map_err(bind_err)?;

        let source = Self {
            socket,
            port,
            n_dropped: 0,
        };
        info!(port = source.local_addr().map(|a| a.port()).unwrap_or(port), "UDP receiver bound");
        Ok(source)
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket
            .local_addr()?
            .as_socket()
            .ok_or_else(|| io::Error::other("socket has no inet address"))
    }

    /// Datagrams discarded because of their size
    pub fn n_dropped(&self) -> u64 {
        self.n_dropped
    }

    /// Receive one datagram straight into `packet`, returning its real length.
    fn recv_packet(&self, packet: &mut PacketFrame, flags: libc::c_int) -> io::Result<usize> {
        let bytes = packet.as_bytes_mut();
        // SAFETY: MaybeUninit<u8> has the layout of u8 and the bytes are initialised.
        let buf = unsafe {
            std::slice::from_raw_parts_mut(bytes.as_mut_ptr() as *mut MaybeUninit<u8>, bytes.len())
        };
        // MSG_TRUNC makes the kernel report the full datagram length.
        self.socket.recv_with_flags(buf, flags | libc::MSG_TRUNC)
    }
}

impl PacketSource for UdpPacketSource {
    fn receive(&mut self, packets: &mut [PacketFrame]) -> RecvResult<usize> {
        let mut n_packets = 0;
        let mut flags = 0;

        while n_packets < packets.len() {
            match self.recv_packet(&mut packets[n_packets], flags) {
                Ok(n_bytes) if n_bytes == BYTES_PER_PACKET => n_packets += 1,
                Ok(n_bytes) => {
                    self.n_dropped += 1;
                    debug!(port = self.port, n_bytes, "Dropped datagram of unexpected size");
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock
                            | io::ErrorKind::TimedOut
                            | io::ErrorKind::Interrupted
                    ) =>
                {
                    break;
                }
                Err(e) => return Err(e.into()),
            }
            flags = libc::MSG_DONTWAIT;
        }

        Ok(n_packets)
    }
}
