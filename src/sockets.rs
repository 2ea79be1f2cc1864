// Copyright 2024 the phosphene-stream contributors
// SPDX-License-Identifier: MPL-2.0

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use log::{info, warn};
use socket2::{Domain, Protocol, SockRef, Socket, Type};

use crate::RECEIVE_POLL_INTERVAL_MS;

/// Kernel receive queue asked for on the camera socket. A frame arrives as
/// one burst of `width * height / 1024` dgrams, which overflows the default
/// queue at camera resolutions while the receive loop is busy publishing.
pub const CAMERA_RECV_BUFFER_SIZE: usize = 1 << 20;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:4906";
pub const DEFAULT_DEST_ADDR: &str = "127.0.0.1:9003";

/// Something the receive loop can pull dgrams from.
pub trait DatagramSource {
    /// Receives one dgram into `buf` and returns its length. A timeout is
    /// reported as `WouldBlock` or `TimedOut`, not as a failure.
    fn recv_datagram(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Something the chunked sender can push dgrams into.
pub trait DatagramSink {
    fn send_datagram(&mut self, payload: &[u8]) -> io::Result<usize>;
}

/// Inbound camera socket with an enlarged receive queue. The read timeout
/// keeps the receive loop from blocking forever so it can keep polling for
/// shutdown.
pub fn get_camera_socket(bind_addr: SocketAddr) -> Result<UdpSocket, io::Error> {
    let socket = Socket::new(
        Domain::for_address(bind_addr),
        Type::DGRAM,
        Some(Protocol::UDP),
    )?;
    socket.set_recv_buffer_size(CAMERA_RECV_BUFFER_SIZE)?;
    socket.bind(&bind_addr.into())?;
    let socket: UdpSocket = socket.into();
    socket.set_read_timeout(Some(Duration::from_millis(RECEIVE_POLL_INTERVAL_MS)))?;

    // The OS may clamp the request (net.core.rmem_max on Linux).
    let granted = recv_buffer_size(&socket)?;
    if granted < CAMERA_RECV_BUFFER_SIZE {
        warn!(
            "Camera socket receive buffer is {granted} bytes, asked for {CAMERA_RECV_BUFFER_SIZE}"
        );
    } else {
        info!("Camera socket receive buffer is {granted} bytes");
    }
    return Ok(socket);
}

/// Size of the kernel receive queue the OS granted `socket`.
pub fn recv_buffer_size(socket: &UdpSocket) -> Result<usize, io::Error> {
    return SockRef::from(socket).recv_buffer_size();
}

/// Outbound phosphene socket. Bound to an ephemeral port on the same
/// interface family as `dest`, so no other socket is involved.
pub fn get_phosphene_socket(dest: SocketAddr) -> Result<UdpSocket, io::Error> {
    let bind_addr = if dest.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    return UdpSocket::bind(bind_addr);
}

pub fn is_timeout(err: &io::Error) -> bool {
    return matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    );
}

impl DatagramSource for UdpSocket {
    fn recv_datagram(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let (amt, _src) = self.recv_from(buf)?;
        return Ok(amt);
    }
}

/// A [`UdpSocket`] paired with the fixed address every dgram goes to.
pub struct UdpSink {
    socket: UdpSocket,
    dest: SocketAddr,
}

impl UdpSink {
    pub fn new(socket: UdpSocket, dest: SocketAddr) -> UdpSink {
        return UdpSink {
            socket: socket,
            dest: dest,
        };
    }

    pub fn dest(&self) -> SocketAddr {
        return self.dest;
    }
}

impl DatagramSink for UdpSink {
    fn send_datagram(&mut self, payload: &[u8]) -> io::Result<usize> {
        return self.socket.send_to(payload, self.dest);
    }
}
