//! A small user-space TCP/IP stack: reliable byte streams over a TCP
//! sender/receiver pair, carried across an ARP-resolving Ethernet interface
//! and an IPv4 longest-prefix-match router.
//!
//! The stack is single-threaded and never blocks: frames and segments move
//! through explicit calls, and time advances only through `tick`. Wiring it
//! to the outside world means giving each interface an output port and
//! feeding it received frames; see the `netstack` binary for a tap-device
//! example.

pub mod interface;
pub mod reassembler;
pub mod router;
pub mod stream;
pub mod tcp;
pub mod wire;

pub use interface::{NetworkInterface, OutputPort};
pub use reassembler::Reassembler;
pub use router::Router;
pub use stream::ByteStream;
pub use tcp::receiver::TcpReceiver;
pub use tcp::sender::TcpSender;
pub use tcp::sequence::SeqNo;
pub use tcp::{SegmentFlags, TcpAck, TcpSegment};
pub use wire::{EthernetAddress, EthernetFrame, Ipv4Datagram};
