use std::io;
use std::net::Ipv4Addr;

use etherparse::{IpNumber, Ipv4Header, TcpHeader, TcpHeaderSlice};

use crate::tcp::sequence::SeqNo;
use crate::tcp::{SegmentFlags, TcpAck, TcpSegment};
use crate::wire::Ipv4Datagram;

const TTL: u8 = 64;

/// The four endpoint coordinates naming one TCP connection, from the local
/// peer's point of view.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct Tcp4Tuple {
    pub src: (Ipv4Addr, u16),
    pub dst: (Ipv4Addr, u16),
}

impl Tcp4Tuple {
    /// The same connection as seen by the remote peer.
    pub fn reversed(&self) -> Self {
        Self {
            src: self.dst,
            dst: self.src,
        }
    }
}

/// Puts a [`TcpSegment`] and the piggybacked [`TcpAck`] on the wire as a
/// real RFC 793 header inside an IPv4 datagram, and takes them back off.
/// One codec serves one connection; datagrams for other ports or protocols
/// decode to `None`.
#[derive(Debug, Clone, Copy)]
pub struct TcpOverIp {
    tuple: Tcp4Tuple,
}

impl TcpOverIp {
    pub fn new(tuple: Tcp4Tuple) -> Self {
        Self { tuple }
    }

    pub fn encode(&self, segment: &TcpSegment, ack: &TcpAck) -> io::Result<Ipv4Datagram> {
        let (src_ip, src_port) = self.tuple.src;
        let (dst_ip, dst_port) = self.tuple.dst;

        let mut tcp = TcpHeader::new(src_port, dst_port, segment.seqno.raw(), ack.window_size);
        tcp.syn = segment.flags.contains(SegmentFlags::SYN);
        tcp.fin = segment.flags.contains(SegmentFlags::FIN);
        tcp.rst = segment.flags.contains(SegmentFlags::RST) || ack.rst;
        if let Some(ackno) = ack.ackno {
            tcp.ack = true;
            tcp.acknowledgment_number = ackno.raw();
        }

        let ip = Ipv4Header::new(
            (tcp.header_len() as usize + segment.payload.len()) as u16,
            TTL,
            IpNumber::TCP,
            src_ip.octets(),
            dst_ip.octets(),
        )
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        tcp.checksum = tcp
            .calc_checksum_ipv4(&ip, &segment.payload)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

        let mut payload = Vec::with_capacity(tcp.header_len() as usize + segment.payload.len());
        tcp.write(&mut payload)?;
        payload.extend_from_slice(&segment.payload);

        Ok(Ipv4Datagram {
            header: ip,
            payload,
        })
    }

    /// Decode a datagram sent by the remote peer on this connection.
    pub fn decode(&self, dgram: &Ipv4Datagram) -> Option<(TcpSegment, TcpAck)> {
        if dgram.header.protocol != IpNumber::TCP {
            return None;
        }
        let remote = self.tuple.reversed();
        if (dgram.source(), dgram.destination()) != (remote.src.0, remote.dst.0) {
            return None;
        }
        let tcp = TcpHeaderSlice::from_slice(&dgram.payload).ok()?;
        if (tcp.source_port(), tcp.destination_port()) != (remote.src.1, remote.dst.1) {
            return None;
        }

        let mut flags = SegmentFlags::empty();
        if tcp.syn() {
            flags |= SegmentFlags::SYN;
        }
        if tcp.fin() {
            flags |= SegmentFlags::FIN;
        }
        if tcp.rst() {
            flags |= SegmentFlags::RST;
        }
        let segment = TcpSegment {
            seqno: SeqNo::new(tcp.sequence_number()),
            flags,
            payload: dgram.payload[tcp.slice().len()..].to_vec(),
        };
        let ack = TcpAck {
            ackno: tcp.ack().then(|| SeqNo::new(tcp.acknowledgment_number())),
            window_size: tcp.window_size(),
            rst: tcp.rst(),
        };
        Some((segment, ack))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn tuple() -> Tcp4Tuple {
        Tcp4Tuple {
            src: (Ipv4Addr::new(192, 168, 0, 1), 4000),
            dst: (Ipv4Addr::new(192, 168, 0, 9), 80),
        }
    }

    #[test]
    fn segment_and_ack_survive_the_wire() {
        let local = TcpOverIp::new(tuple());
        let remote = TcpOverIp::new(tuple().reversed());

        let segment = TcpSegment {
            seqno: SeqNo::new(12345),
            flags: SegmentFlags::SYN | SegmentFlags::FIN,
            payload: b"greetings".to_vec(),
        };
        let ack = TcpAck {
            ackno: Some(SeqNo::new(777)),
            window_size: 512,
            rst: false,
        };

        let dgram = local.encode(&segment, &ack).unwrap();
        assert_eq!(dgram.header.protocol, IpNumber::TCP);
        let (got_segment, got_ack) = remote.decode(&dgram).unwrap();
        assert_eq!(got_segment, segment);
        assert_eq!(got_ack, ack);
    }

    #[test]
    fn ackless_header_decodes_to_no_ackno() {
        let local = TcpOverIp::new(tuple());
        let remote = TcpOverIp::new(tuple().reversed());
        let segment = TcpSegment {
            seqno: SeqNo::new(1),
            flags: SegmentFlags::SYN,
            payload: Vec::new(),
        };
        let ack = TcpAck::default();

        let (_, got_ack) = remote
            .decode(&local.encode(&segment, &ack).unwrap())
            .unwrap();
        assert_eq!(got_ack.ackno, None);
        assert_eq!(got_ack.window_size, 0);
    }

    #[test]
    fn foreign_traffic_is_not_decoded() {
        let local = TcpOverIp::new(tuple());
        let remote = TcpOverIp::new(tuple().reversed());
        let dgram = local
            .encode(&TcpSegment::default(), &TcpAck::default())
            .unwrap();

        // the sender's own codec must not decode its own outbound traffic
        assert!(local.decode(&dgram).is_none());

        // different connection, same direction
        let mut other = tuple();
        other.dst.1 = 81;
        assert!(TcpOverIp::new(other.reversed()).decode(&dgram).is_none());
        assert!(remote.decode(&dgram).is_some());
    }

    #[test]
    fn rst_is_carried_either_way() {
        let local = TcpOverIp::new(tuple());
        let remote = TcpOverIp::new(tuple().reversed());

        let mut ack = TcpAck::default();
        ack.rst = true;
        let (seg, got_ack) = remote
            .decode(&local.encode(&TcpSegment::default(), &ack).unwrap())
            .unwrap();
        assert!(seg.flags.contains(SegmentFlags::RST));
        assert!(got_ack.rst);
    }
}
