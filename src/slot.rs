//! The fixed-capacity segment slot and the circular window of slots it lives in.
//!
//! Both the send and receive sides are an array of `W` slots indexed by
//! `sequence_number mod W`; factoring that indexing out here means the
//! connection logic never does raw modulo arithmetic on its own.

use crate::packet::MAX_PAYLOAD;

/// A single segment slot: up to [`MAX_PAYLOAD`] bytes, plus whether it currently
/// holds unconsumed data.
#[derive(Clone)]
pub struct Slot {
    occupied: bool,
    /// Whether this slot's current contents have been put on the wire at
    /// least once. A slot the fill-up policy is still holding back (not yet
    /// transmitted) must read `false` here, so the retransmission sweep does
    /// not put a not-yet-finalized payload on the wire out from under it.
    sent: bool,
    len: usize,
    buf: [u8; MAX_PAYLOAD],
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            occupied: false,
            sent: false,
            len: 0,
            buf: [0; MAX_PAYLOAD],
        }
    }
}

impl Slot {
    pub fn is_occupied(&self) -> bool {
        self.occupied
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Record that this slot's current contents have gone out on the wire.
    pub fn mark_sent(&mut self) {
        self.sent = true;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn payload(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Mark the slot unoccupied and reset its length. Does not zero the buffer;
    /// the bytes are simply no longer meaningful.
    pub fn clear(&mut self) {
        self.occupied = false;
        self.sent = false;
        self.len = 0;
    }

    /// Replace the slot's contents with `data` and mark it occupied. The new
    /// contents have not been sent yet.
    pub fn store(&mut self, data: &[u8]) {
        debug_assert!(data.len() <= MAX_PAYLOAD);
        self.buf[..data.len()].copy_from_slice(data);
        self.len = data.len();
        self.occupied = true;
        self.sent = false;
    }

    /// Append `data` to an already-occupied slot. Only ever called on a slot
    /// the fill-up policy is holding back, so `sent` is left untouched (it is
    /// already `false`).
    pub fn extend(&mut self, data: &[u8]) {
        debug_assert!(self.len + data.len() <= MAX_PAYLOAD);
        debug_assert!(!self.sent, "extending a slot already placed on the wire");
        self.buf[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();
    }

    pub fn remaining_capacity(&self) -> usize {
        MAX_PAYLOAD - self.len
    }
}

/// A ring of `W` slots indexed by sequence number modulo `W`.
pub struct Window {
    slots: Box<[Slot]>,
}

impl Window {
    pub fn new(capacity: u32) -> Self {
        assert!(capacity > 0, "window size must be positive");
        Self {
            slots: (0..capacity).map(|_| Slot::default()).collect(),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    fn index(&self, seq: u32) -> usize {
        (seq % self.capacity()) as usize
    }

    pub fn get(&self, seq: u32) -> &Slot {
        &self.slots[self.index(seq)]
    }

    pub fn get_mut(&mut self, seq: u32) -> &mut Slot {
        let idx = self.index(seq);
        &mut self.slots[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_window_is_empty() {
        let win = Window::new(4);
        for seq in 0..8 {
            assert!(!win.get(seq).is_occupied());
        }
    }

    #[test]
    fn store_then_clear_round_trips() {
        let mut win = Window::new(4);
        win.get_mut(5).store(b"hi");
        assert!(win.get(5).is_occupied());
        assert_eq!(win.get(5).payload(), b"hi");
        // seq 1 aliases seq 5 modulo 4
        assert!(win.get(1).is_occupied());

        win.get_mut(5).clear();
        assert!(!win.get(5).is_occupied());
    }

    #[test]
    fn extend_appends() {
        let mut win = Window::new(4);
        win.get_mut(0).store(b"ab");
        win.get_mut(0).extend(b"cd");
        assert_eq!(win.get(0).payload(), b"abcd");
        assert_eq!(win.get(0).remaining_capacity(), MAX_PAYLOAD - 4);
    }
}
