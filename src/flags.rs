//! The connection's lifecycle flags.
//!
//! The source packs these into a handful of bits on one struct field; here
//! they are named booleans instead — there are only six of them, their
//! co-occurrence rules are simple, and naming them directly reads better than
//! either a bitmask or an enum of the reachable combinations.

/// Lifecycle and fill-up-policy state for one [`crate::connection::Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    /// The peer's end-of-stream packet has entered the receive window.
    pub eof_recv: bool,
    /// The application input source has signaled end-of-file.
    pub eof_read: bool,
    /// Every segment ever transmitted has been acknowledged.
    pub all_sent_acknowledged: bool,
    /// Every received segment has been delivered to the application sink.
    pub all_written: bool,
    /// The most recently allocated outbound slot has already been put on the wire at least once.
    pub last_allocated_already_sent: bool,
    /// At least one outbound, unacknowledged segment currently carries fewer than a full payload.
    pub small_packet_online: bool,
}

impl Default for Flags {
    /// All flags clear except `last_allocated_already_sent`: no slot has been
    /// allocated yet, so the next allocation must take a fresh one.
    fn default() -> Self {
        Self {
            eof_recv: false,
            eof_read: false,
            all_sent_acknowledged: false,
            all_written: false,
            last_allocated_already_sent: true,
            small_packet_online: false,
        }
    }
}

impl Flags {
    /// The four-flag teardown handshake: true once destruction is permitted.
    pub fn is_done(&self) -> bool {
        self.eof_recv && self.eof_read && self.all_sent_acknowledged && self.all_written
    }
}
