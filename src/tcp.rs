//! The TCP transport: wrapping sequence numbers, the sender and receiver
//! state machines, and the codec that puts segments on a real IPv4 wire.

use bitflags::bitflags;

pub mod codec;
pub mod receiver;
pub mod sender;
pub mod sequence;

use self::sequence::SeqNo;

/// Largest payload carried by a single segment. Leaves room for the IP and
/// TCP headers plus tunnel overhead inside a 1500-byte link MTU.
pub const MAX_PAYLOAD_SIZE: usize = 1452;

bitflags! {
    /// Control bits a segment can carry.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentFlags: u8 {
        const SYN = 0b001;
        const FIN = 0b010;
        const RST = 0b100;
    }
}

/// One sender-to-receiver message: the unit of transmission, acknowledgement
/// and retransmission.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TcpSegment {
    pub seqno: SeqNo,
    pub flags: SegmentFlags,
    pub payload: Vec<u8>,
}

impl TcpSegment {
    /// Sequence numbers this segment occupies: SYN and FIN each count one,
    /// plus one per payload byte.
    pub fn sequence_length(&self) -> u64 {
        self.flags.contains(SegmentFlags::SYN) as u64
            + self.payload.len() as u64
            + self.flags.contains(SegmentFlags::FIN) as u64
    }
}

/// One receiver-to-sender message: what the peer has, and how much more it
/// will take.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TcpAck {
    /// Next sequence number the receiver expects. Absent until a SYN has
    /// been seen.
    pub ackno: Option<SeqNo>,
    pub window_size: u16,
    pub rst: bool,
}
