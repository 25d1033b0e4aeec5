//! The runtime loop that drives one [`Connection`] from a real `UdpSocket`
//! and real stdio: binds and arms non-blocking I/O, then alternates between
//! draining the socket and waking the connection's timer.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, UdpSocket};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::time::{Duration, Instant};

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::poll::{poll, PollFd, PollFlags};

use crate::connection::Connection;
use crate::error::HostError;
use crate::io::{ByteSink, ByteSource, PacketSink, ReadOutcome};
use crate::packet::MAX_DATA_LEN;

/// `ByteSource` over stdin. A `WouldBlock` read is reported as "nothing
/// available right now", not end-of-file.
struct Stdin(io::Stdin);

impl ByteSource for Stdin {
    fn read(&mut self, buf: &mut [u8]) -> ReadOutcome {
        match self.0.read(buf) {
            Ok(0) => ReadOutcome::Eof,
            Ok(n) => ReadOutcome::Read(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => ReadOutcome::Read(0),
            Err(e) => {
                log::warn!("stdin read error: {e}");
                ReadOutcome::Read(0)
            }
        }
    }
}

/// `ByteSink` over stdout.
struct Stdout(io::Stdout);

impl ByteSink for Stdout {
    fn write(&mut self, buf: &[u8]) -> usize {
        match self.0.write(buf) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => 0,
            Err(e) => {
                log::warn!("stdout write error: {e}");
                0
            }
        }
    }
}

/// `PacketSink` over a UDP socket bound to a single peer.
struct SocketSink {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl PacketSink for SocketSink {
    fn send(&mut self, datagram: &[u8]) {
        if let Err(e) = self.socket.send_to(datagram, self.peer) {
            log::warn!("failed to send datagram to {}: {e}", self.peer);
        }
    }
}

fn set_nonblocking(fd: RawFd) -> Result<(), HostError> {
    let current = fcntl(fd, FcntlArg::F_GETFL)?;
    let mut flags = OFlag::from_bits_truncate(current);
    flags.insert(OFlag::O_NONBLOCK);
    fcntl(fd, FcntlArg::F_SETFL(flags))?;
    Ok(())
}

/// Run the connection to completion: binds `listen`, talks to `peer`, and
/// returns once `Connection::is_done()`.
pub fn run(listen: SocketAddr, peer: SocketAddr, window: u32, tick: Duration) -> Result<(), HostError> {
    let socket = UdpSocket::bind(listen).map_err(|source| HostError::Bind {
        addr: listen.to_string(),
        source,
    })?;
    socket.set_nonblocking(true)?;

    let stdin = io::stdin();
    set_nonblocking(stdin.as_raw_fd())?;
    set_nonblocking(io::stdout().as_raw_fd())?;

    let sink_socket = socket.try_clone()?;
    let mut connection = Connection::new(
        window,
        Stdin(io::stdin()),
        Stdout(io::stdout()),
        SocketSink {
            socket: sink_socket,
            peer,
        },
    );

    let mut recv_buf = [0u8; MAX_DATA_LEN];
    let socket_fd: BorrowedFd<'_> = socket.as_fd();
    let stdin_fd: BorrowedFd<'_> = stdin.as_fd();

    // `on_tick` is the periodic retransmission/input-pump timer (§4.6), a
    // separate entry point from `on_packet`'s packet-arrival demultiplexing.
    // It must fire on its own schedule, not once per `poll` wakeup: a burst
    // of inbound datagrams would otherwise wake the loop far more often than
    // `tick` implies and drive the sweep/fill-up policy far too eagerly.
    let mut next_tick = Instant::now() + tick;

    while !connection.is_done() {
        let remaining = next_tick.saturating_duration_since(Instant::now());
        let timeout_ms = remaining.as_millis().min(i32::MAX as u128) as i32;
        let mut fds = [
            PollFd::new(socket_fd, PollFlags::POLLIN),
            PollFd::new(stdin_fd, PollFlags::POLLIN),
        ];
        poll(&mut fds, timeout_ms)?;

        // Bounded per wake: draining an unbounded flood of inbound datagrams
        // here would starve the timer tick (and thus retransmission).
        const MAX_DATAGRAMS_PER_WAKE: usize = 64;
        for _ in 0..MAX_DATAGRAMS_PER_WAKE {
            match socket.recv_from(&mut recv_buf) {
                Ok((n, from)) if from == peer => connection.on_packet(&recv_buf[..n]),
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("socket recv error: {e}");
                    break;
                }
            }
        }

        if Instant::now() >= next_tick {
            connection.on_tick();
            next_tick = Instant::now() + tick;
        }
    }

    log::info!("connection to {peer} finished");
    Ok(())
}
