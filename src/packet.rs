//! Wire format codec: header layout, checksum, and encode/decode of the two
//! packet shapes (ack-only and data) described by the protocol.

/// Size of the common header: checksum (2) + length (2) + ackno (4).
pub const HEADER_LEN: usize = 8;
/// Size of the sequence number field present on every data packet.
pub const SEQNO_LEN: usize = 4;
/// Largest payload a single segment may carry.
pub const MAX_PAYLOAD: usize = 500;
/// Smallest a data packet can be: header + seqno, no payload (the EOF marker).
pub const EOF_LEN: usize = HEADER_LEN + SEQNO_LEN;
/// Largest a data packet can be: header + seqno + a full payload.
pub const MAX_DATA_LEN: usize = EOF_LEN + MAX_PAYLOAD;
/// Exact size of an ack-only packet.
pub const ACK_LEN: usize = HEADER_LEN;

/// Accumulates an RFC 1071 Internet checksum.
///
/// Mirrors the running-sum-then-fold idiom used for IP/TCP/UDP checksums:
/// bytes are summed two at a time as big-endian 16-bit words, and the final
/// accumulator is folded down to 16 bits and complemented.
#[derive(Clone, Default)]
pub struct Checksum {
    acc: u32,
}

impl Checksum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the checksum of `bytes` in one call.
    pub fn of(bytes: &[u8]) -> Self {
        let mut csum = Self::new();
        csum.push(bytes);
        csum
    }

    /// Fold more bytes into the running sum.
    pub fn push(&mut self, bytes: &[u8]) {
        let mut chunks = bytes.chunks_exact(2);
        for word in &mut chunks {
            self.acc += u16::from_be_bytes([word[0], word[1]]) as u32;
        }
        if let [last] = *chunks.remainder() {
            self.acc += (last as u32) << 8;
        }
    }

    /// Fold the accumulator to 16 bits and complement it.
    pub fn finish(self) -> u16 {
        let mut acc = self.acc;
        while acc >> 16 != 0 {
            acc = (acc & 0xFFFF) + (acc >> 16);
        }
        !(acc as u16)
    }
}

/// A decoded packet, borrowing its payload from the datagram it was parsed from.
#[derive(Debug, PartialEq, Eq)]
pub enum Packet<'a> {
    /// An ack-only packet (8 bytes on the wire).
    Ack { ackno: u32 },
    /// A data packet. A zero-length `payload` is the EOF marker.
    Data {
        ackno: u32,
        seqno: u32,
        payload: &'a [u8],
    },
}

impl<'a> Packet<'a> {
    /// The piggyback/standalone ack number every packet carries.
    pub fn ackno(&self) -> u32 {
        match *self {
            Packet::Ack { ackno } => ackno,
            Packet::Data { ackno, .. } => ackno,
        }
    }

    /// Validate and parse a received datagram.
    ///
    /// Returns `None` for anything the protocol says to silently discard:
    /// too short, a length field that doesn't match the received byte count,
    /// or a checksum that doesn't verify.
    pub fn decode(bytes: &[u8]) -> Option<Packet<'_>> {
        if bytes.len() < HEADER_LEN {
            return None;
        }

        let len = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
        if len != bytes.len() {
            return None;
        }

        if Checksum::of(bytes).finish() != 0 {
            return None;
        }

        let ackno = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);

        if len == ACK_LEN {
            return Some(Packet::Ack { ackno });
        }

        if len < EOF_LEN || len > MAX_DATA_LEN {
            return None;
        }

        let seqno = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let payload = &bytes[EOF_LEN..len];

        Some(Packet::Data {
            ackno,
            seqno,
            payload,
        })
    }

    /// Encode an ack-only packet into `buf`, returning the bytes used (always [`ACK_LEN`]).
    pub fn encode_ack(buf: &mut [u8; ACK_LEN], ackno: u32) -> usize {
        buf[2..4].copy_from_slice(&(ACK_LEN as u16).to_be_bytes());
        buf[4..8].copy_from_slice(&ackno.to_be_bytes());
        buf[0..2].copy_from_slice(&[0, 0]);

        let csum = Checksum::of(&buf[..]).finish();
        buf[0..2].copy_from_slice(&csum.to_be_bytes());

        ACK_LEN
    }

    /// Encode a data packet (or, if `payload` is empty, an EOF marker) into `buf`.
    ///
    /// `buf` must be at least [`MAX_DATA_LEN`] bytes. Returns the number of bytes written.
    pub fn encode_data(buf: &mut [u8], ackno: u32, seqno: u32, payload: &[u8]) -> usize {
        debug_assert!(payload.len() <= MAX_PAYLOAD);
        let len = EOF_LEN + payload.len();

        buf[2..4].copy_from_slice(&(len as u16).to_be_bytes());
        buf[4..8].copy_from_slice(&ackno.to_be_bytes());
        buf[8..12].copy_from_slice(&seqno.to_be_bytes());
        buf[12..len].copy_from_slice(payload);
        buf[0..2].copy_from_slice(&[0, 0]);

        let csum = Checksum::of(&buf[..len]).finish();
        buf[0..2].copy_from_slice(&csum.to_be_bytes());

        len
    }
}
