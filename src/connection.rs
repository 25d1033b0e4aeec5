//! The per-connection reliability state machine: paired send/receive sliding
//! windows, packet acceptance, retransmission, and the end-of-stream teardown
//! handshake. This is the heart of the crate; everything else exists to
//! drive it from a real UDP socket and real stdio (see `crate::host`).

use crate::flags::Flags;
use crate::io::{ByteSink, ByteSource, PacketSink, ReadOutcome};
use crate::packet::{Packet, ACK_LEN, MAX_DATA_LEN, MAX_PAYLOAD};
use crate::slot::Window;

/// Sequence numbers start at 1; wraparound is not handled (see DESIGN.md).
const FIRST_SEQNO: u32 = 1;

/// One reliable byte-stream connection, generic over the three host-provided
/// I/O interfaces it drives. Monomorphized rather than `dyn`-dispatched: there
/// is exactly one of each per connection and no runtime polymorphism is
/// needed on the hot path.
pub struct Connection<S, O, P> {
    recv: Window,
    send: Window,
    recv_seqno: u32,
    send_seqno: u32,
    window_size: u32,
    already_written: usize,
    flags: Flags,
    source: S,
    sink: O,
    packets: P,
}

impl<S, O, P> Connection<S, O, P>
where
    S: ByteSource,
    O: ByteSink,
    P: PacketSink,
{
    /// Create a new connection with the given window size and host I/O.
    pub fn new(window_size: u32, source: S, sink: O, packets: P) -> Self {
        Self {
            recv: Window::new(window_size),
            send: Window::new(window_size),
            recv_seqno: FIRST_SEQNO,
            send_seqno: FIRST_SEQNO,
            window_size,
            already_written: 0,
            flags: Flags::default(),
            source,
            sink,
            packets,
        }
    }

    /// True once all four teardown flags are set and the connection may be destroyed.
    pub fn is_done(&self) -> bool {
        self.flags.is_done()
    }

    /// Entry point for a datagram arriving off the wire.
    pub fn on_packet(&mut self, datagram: &[u8]) {
        let Some(pkt) = Packet::decode(datagram) else {
            log::trace!("discarding malformed datagram ({} bytes)", datagram.len());
            return;
        };

        self.accept_ack(pkt.ackno());

        let (seqno, payload) = match pkt {
            Packet::Ack { .. } => return,
            Packet::Data { seqno, payload, .. } => (seqno, payload),
        };

        if !self.in_recv_window(seqno) {
            log::trace!("discarding out-of-window seqno {seqno}");
            return;
        }

        let slot = self.recv.get_mut(seqno);
        if slot.is_occupied() {
            log::trace!("discarding duplicate seqno {seqno}");
            return;
        }

        if payload.is_empty() {
            log::debug!("received EOF marker at seqno {seqno}");
            self.flags.eof_recv = true;
        }
        slot.store(payload);

        if seqno == self.recv_seqno {
            self.output_pump();
        }
    }

    /// Entry point for the periodic timer: retransmit everything already
    /// outstanding, pull fresh app input, retry any stalled delivery, and
    /// advance teardown state.
    ///
    /// The sweep runs *before* the input pump so a slot the fill-up policy
    /// allocates or extends this tick is never retransmitted in the same
    /// tick it was formed in (see `retransmit_sweep`); the output pump runs
    /// last so a previously sink-throttled delivery gets retried every tick,
    /// not only when a fresh in-order packet arrives.
    pub fn on_tick(&mut self) {
        self.retransmit_sweep();
        self.input_pump();
        self.output_pump();

        if self.flags.eof_read && self.send_window_empty() {
            self.flags.all_sent_acknowledged = true;
        }
    }

    // --- receive side -----------------------------------------------------

    fn in_recv_window(&self, seqno: u32) -> bool {
        seqno >= self.recv_seqno && seqno < self.recv_seqno + self.window_size
    }

    fn accept_ack(&mut self, ackno: u32) {
        if ackno <= self.send_seqno {
            return;
        }

        let mut seq = self.send_seqno;
        while seq != ackno {
            let slot = self.send.get_mut(seq);
            if slot.len() < MAX_PAYLOAD {
                self.flags.small_packet_online = false;
            }
            slot.clear();
            seq = seq.wrapping_add(1);
        }
        self.send_seqno = ackno;
    }

    /// Deliver contiguous received data to the application, in order.
    fn output_pump(&mut self) {
        let mut delivered = false;

        loop {
            let seq = self.recv_seqno;
            let slot = self.recv.get_mut(seq);
            if !slot.is_occupied() {
                break;
            }

            let remaining_len = slot.len() - self.already_written;
            let mut remaining = [0u8; MAX_PAYLOAD];
            remaining[..remaining_len].copy_from_slice(&slot.payload()[self.already_written..]);

            let written = self.sink.write(&remaining[..remaining_len]);

            if written == remaining_len {
                self.recv.get_mut(seq).clear();
                self.already_written = 0;
                self.recv_seqno = self.recv_seqno.wrapping_add(1);
                delivered = true;
            } else {
                self.already_written += written;
                break;
            }
        }

        if delivered {
            self.send_ack();
        }

        if self.flags.eof_recv && self.recv_window_empty() {
            self.flags.all_written = true;
        }
    }

    fn recv_window_empty(&self) -> bool {
        (0..self.window_size).all(|i| !self.recv.get(self.recv_seqno.wrapping_add(i)).is_occupied())
    }

    fn send_ack(&mut self) {
        let mut buf = [0u8; ACK_LEN];
        Packet::encode_ack(&mut buf, self.recv_seqno);
        self.packets.send(&buf);
    }

    // --- send side ----------------------------------------------------------

    fn send_window_empty(&self) -> bool {
        (0..self.window_size).all(|i| !self.send.get(self.send_seqno.wrapping_add(i)).is_occupied())
    }

    /// The smallest sequence `>= send_seqno` whose send slot is unoccupied, or
    /// `None` if the window is full.
    fn first_free(&self) -> Option<u32> {
        (0..self.window_size)
            .map(|i| self.send_seqno.wrapping_add(i))
            .find(|&seq| !self.send.get(seq).is_occupied())
    }

    /// Pull application bytes and form segments, applying the fill-up policy.
    fn input_pump(&mut self) {
        if self.flags.eof_read {
            return;
        }

        let Some(first_free) = self.first_free() else {
            return;
        };

        let target = if self.flags.last_allocated_already_sent {
            first_free
        } else {
            first_free.wrapping_sub(1)
        };

        let available = self.send.get(target).remaining_capacity();
        if available == 0 {
            return;
        }

        let mut buf = [0u8; MAX_PAYLOAD];
        match self.source.read(&mut buf[..available]) {
            ReadOutcome::Read(0) => {}
            ReadOutcome::Read(n) => {
                let slot = self.send.get_mut(target);
                if slot.is_occupied() {
                    slot.extend(&buf[..n]);
                } else {
                    slot.store(&buf[..n]);
                }
                self.apply_transmit_decision(target);
            }
            ReadOutcome::Eof => {
                log::debug!("input source reached EOF, sending EOF marker at seqno {first_free}");
                self.flags.eof_read = true;

                // `target` may be a held-back slot from the fill-up policy
                // that has accumulated real bytes but was never put on the
                // wire. Once `eof_read` is set, `input_pump` never runs
                // again, so if we didn't flush it here it would sit occupied
                // and unsent forever and the connection would never reach
                // `all_sent_acknowledged`.
                if target != first_free && self.send.get(target).is_occupied() {
                    self.transmit(target);
                }

                if !self.send.get(first_free).is_occupied() {
                    self.send.get_mut(first_free).store(&[]);
                }
                self.transmit(first_free);
                self.flags.last_allocated_already_sent = true;
                self.flags.small_packet_online = true;
            }
        }
    }

    /// Send immediately when the slot is now full or no other small packet is
    /// in flight; otherwise hold it back so a later input can top it up.
    fn apply_transmit_decision(&mut self, seq: u32) {
        let full = self.send.get(seq).len() == MAX_PAYLOAD;

        if full || !self.flags.small_packet_online {
            self.transmit(seq);
            self.flags.last_allocated_already_sent = true;
            self.flags.small_packet_online = !full;
        } else {
            self.flags.last_allocated_already_sent = false;
        }
    }

    /// Retransmit every in-window send slot that has actually been placed on
    /// the wire at least once. There is no per-packet deadline: every tick
    /// resends everything outstanding.
    ///
    /// A slot the fill-up policy is holding back (`Slot::is_sent() == false`)
    /// is deliberately excluded: it has not been decided on yet, and may
    /// still be extended with more bytes next tick. Sweeping it anyway would
    /// put a stale, incomplete payload on the wire under a sequence number
    /// the sender believes is still unsent, and any bytes appended after
    /// that point would be indistinguishable from a duplicate to the peer
    /// and silently dropped (see `Connection::on_packet`'s duplicate check).
    fn retransmit_sweep(&mut self) {
        let pending: Vec<u32> = (0..self.window_size)
            .map(|i| self.send_seqno.wrapping_add(i))
            .filter(|&seq| {
                let slot = self.send.get(seq);
                slot.is_occupied() && slot.is_sent()
            })
            .collect();

        for seqno in pending {
            self.transmit(seqno);
        }
    }

    /// Encode and send the slot at `seqno`, marking it sent so future
    /// retransmission sweeps pick it back up until it is acknowledged.
    fn transmit(&mut self, seqno: u32) {
        let ackno = self.recv_seqno;
        let slot = self.send.get(seqno);
        let len = slot.len();

        let mut payload = [0u8; MAX_PAYLOAD];
        payload[..len].copy_from_slice(slot.payload());

        let mut buf = [0u8; MAX_DATA_LEN];
        let total = Packet::encode_data(&mut buf, ackno, seqno, &payload[..len]);
        self.packets.send(&buf[..total]);
        self.send.get_mut(seqno).mark_sent();
    }
}
