//! Owned wire-format types for the link and internet layers.
//!
//! Ethernet II and IPv4 headers are parsed and serialised by `etherparse`;
//! ARP is a fixed 28-byte RFC 826 message handled here directly. All parse
//! failures map onto [`ParseError`] so callers can drop bad input without
//! caring why it was bad.

use std::fmt;
use std::io;
use std::net::Ipv4Addr;

use etherparse::{EtherType, Ethernet2Header, Ethernet2HeaderSlice, Ipv4Header, Ipv4HeaderSlice};

pub type EthernetAddress = [u8; 6];

/// Destination of ARP requests and anything else meant for the whole link.
pub const ETHERNET_BROADCAST: EthernetAddress = [0xff; 6];

pub const ARP_OPCODE_REQUEST: u16 = 1;
pub const ARP_OPCODE_REPLY: u16 = 2;

const ARP_MESSAGE_LEN: usize = 28;
const ARP_HTYPE_ETHERNET: u16 = 1;
const ARP_PTYPE_IPV4: u16 = 0x0800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Input shorter than the format requires.
    Truncated,
    /// A header field has a value the stack does not handle.
    BadHeader,
    /// IPv4 header checksum mismatch.
    BadChecksum,
    /// ARP message for a hardware/protocol pair other than Ethernet/IPv4.
    UnsupportedArp,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Truncated => write!(f, "truncated input"),
            ParseError::BadHeader => write!(f, "malformed header"),
            ParseError::BadChecksum => write!(f, "bad IPv4 header checksum"),
            ParseError::UnsupportedArp => write!(f, "unsupported ARP message"),
        }
    }
}

impl std::error::Error for ParseError {}

/// A single Ethernet II frame.
#[derive(Debug, Clone, PartialEq)]
pub struct EthernetFrame {
    pub header: Ethernet2Header,
    pub payload: Vec<u8>,
}

impl EthernetFrame {
    pub fn new(
        destination: EthernetAddress,
        source: EthernetAddress,
        ether_type: EtherType,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            header: Ethernet2Header {
                destination,
                source,
                ether_type,
            },
            payload,
        }
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        let slice = Ethernet2HeaderSlice::from_slice(buf).map_err(|_| ParseError::Truncated)?;
        let header_len = slice.slice().len();
        Ok(Self {
            header: slice.to_header(),
            payload: buf[header_len..].to_vec(),
        })
    }

    pub fn serialize(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(14 + self.payload.len());
        self.header.write(&mut out)?;
        out.extend_from_slice(&self.payload);
        Ok(out)
    }
}

/// A single IPv4 datagram: validated header plus payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Ipv4Datagram {
    pub header: Ipv4Header,
    pub payload: Vec<u8>,
}

impl Ipv4Datagram {
    pub fn source(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.header.source)
    }

    pub fn destination(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.header.destination)
    }

    /// Parse and validate a datagram. The total-length field governs how
    /// much of `buf` belongs to the datagram (links may pad frames); bytes
    /// beyond it are ignored, and a total length past the end of `buf` is
    /// an error, as is a checksum mismatch.
    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        let slice = Ipv4HeaderSlice::from_slice(buf).map_err(|_| ParseError::BadHeader)?;
        let header_len = slice.slice().len();
        let total_len = slice.total_len() as usize;
        if total_len < header_len || total_len > buf.len() {
            return Err(ParseError::Truncated);
        }
        let header = slice.to_header();
        if header.calc_header_checksum() != header.header_checksum {
            return Err(ParseError::BadChecksum);
        }
        Ok(Self {
            header,
            payload: buf[header_len..total_len].to_vec(),
        })
    }

    pub fn serialize(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.header.header_len() as usize + self.payload.len());
        self.header.write(&mut out)?;
        out.extend_from_slice(&self.payload);
        Ok(out)
    }
}

/// RFC 826 address-resolution message for Ethernet/IPv4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpMessage {
    pub opcode: u16,
    pub sender_mac: EthernetAddress,
    pub sender_ip: Ipv4Addr,
    pub target_mac: EthernetAddress,
    pub target_ip: Ipv4Addr,
}

impl ArpMessage {
    /// A request for the MAC owning `target_ip`. The target hardware
    /// address is zero: that is what the request is asking for.
    pub fn request(sender_mac: EthernetAddress, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            opcode: ARP_OPCODE_REQUEST,
            sender_mac,
            sender_ip,
            target_mac: [0; 6],
            target_ip,
        }
    }

    pub fn is_request(&self) -> bool {
        self.opcode == ARP_OPCODE_REQUEST
    }

    pub fn to_bytes(&self) -> [u8; ARP_MESSAGE_LEN] {
        let mut out = [0u8; ARP_MESSAGE_LEN];
        out[0..2].copy_from_slice(&ARP_HTYPE_ETHERNET.to_be_bytes());
        out[2..4].copy_from_slice(&ARP_PTYPE_IPV4.to_be_bytes());
        out[4] = 6; // hardware address length
        out[5] = 4; // protocol address length
        out[6..8].copy_from_slice(&self.opcode.to_be_bytes());
        out[8..14].copy_from_slice(&self.sender_mac);
        out[14..18].copy_from_slice(&self.sender_ip.octets());
        out[18..24].copy_from_slice(&self.target_mac);
        out[24..28].copy_from_slice(&self.target_ip.octets());
        out
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() < ARP_MESSAGE_LEN {
            return Err(ParseError::Truncated);
        }
        let field_u16 = |i: usize| u16::from_be_bytes([buf[i], buf[i + 1]]);
        if field_u16(0) != ARP_HTYPE_ETHERNET
            || field_u16(2) != ARP_PTYPE_IPV4
            || buf[4] != 6
            || buf[5] != 4
        {
            return Err(ParseError::UnsupportedArp);
        }
        let opcode = field_u16(6);
        if opcode != ARP_OPCODE_REQUEST && opcode != ARP_OPCODE_REPLY {
            return Err(ParseError::UnsupportedArp);
        }

        let mac = |i: usize| -> EthernetAddress { buf[i..i + 6].try_into().unwrap_or([0; 6]) };
        let ip = |i: usize| Ipv4Addr::new(buf[i], buf[i + 1], buf[i + 2], buf[i + 3]);
        Ok(Self {
            opcode,
            sender_mac: mac(8),
            sender_ip: ip(14),
            target_mac: mac(18),
            target_ip: ip(24),
        })
    }
}
