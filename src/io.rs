//! Host-provided interfaces the core consumes (§6 of the design): a
//! non-blocking byte source for application input, a non-blocking byte sink
//! for application output, and a raw datagram sink for the wire. The host
//! runtime (`crate::host`) implements these over stdin, stdout, and a
//! `UdpSocket`; tests implement them over in-memory buffers.

/// Result of a single non-blocking read attempt from the application source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were read into the buffer (`n == 0` means nothing was
    /// available right now, not end-of-stream).
    Read(usize),
    /// The source has reached end-of-file and will yield no more bytes.
    Eof,
}

/// A non-blocking source of application bytes to send to the peer.
pub trait ByteSource {
    /// Read up to `buf.len()` bytes without blocking.
    fn read(&mut self, buf: &mut [u8]) -> ReadOutcome;
}

/// A non-blocking sink for bytes delivered from the peer, in order.
pub trait ByteSink {
    /// Write as many of `buf`'s bytes as can be accepted right now, returning
    /// how many were actually consumed (possibly 0, possibly a partial count).
    fn write(&mut self, buf: &[u8]) -> usize;
}

/// Hands a single already-encoded datagram to the UDP socket.
pub trait PacketSink {
    fn send(&mut self, datagram: &[u8]);
}
