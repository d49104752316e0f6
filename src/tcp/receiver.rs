use crate::reassembler::Reassembler;
use crate::stream::{ByteStream, Reader};
use crate::tcp::sequence::SeqNo;
use crate::tcp::{SegmentFlags, TcpAck, TcpSegment};

/// Receive side of a TCP connection.
///
/// Translates wire sequence numbers into absolute stream indices and hands
/// the payload to the [`Reassembler`]; everything before the peer's SYN is
/// noise. The acknowledgements it generates account for the SYN and, once
/// the stream closes, the FIN, on top of the bytes actually assembled.
#[derive(Debug)]
pub struct TcpReceiver {
    /// The peer's initial sequence number, fixed by the first SYN.
    zero_point: Option<SeqNo>,
    reassembler: Reassembler,
}

impl TcpReceiver {
    pub fn new(capacity: u64) -> Self {
        Self {
            zero_point: None,
            reassembler: Reassembler::new(ByteStream::new(capacity)),
        }
    }

    /// Read half of the assembled output stream, for the application.
    pub fn reader(&mut self) -> Reader<'_> {
        self.reassembler.reader()
    }

    pub fn output(&self) -> &ByteStream {
        self.reassembler.output()
    }

    pub fn receive(&mut self, segment: &TcpSegment) {
        if segment.flags.contains(SegmentFlags::RST) {
            self.reassembler.reader().set_error();
            return;
        }

        let syn = segment.flags.contains(SegmentFlags::SYN);
        if syn && self.zero_point.is_none() {
            self.zero_point = Some(segment.seqno);
        }
        let Some(zero_point) = self.zero_point else {
            // No SYN yet: nothing to anchor sequence numbers to.
            return;
        };

        let checkpoint = self.reassembler.output().bytes_pushed();
        let seq_abs = segment.seqno.unwrap(zero_point, checkpoint);
        // SYN occupies sequence number zero; payload stream indices start
        // one below the sequence number unless this segment is the SYN.
        let first_index = if syn {
            seq_abs
        } else {
            match seq_abs.checked_sub(1) {
                Some(index) => index,
                None => return, // non-SYN segment at the zero point
            }
        };

        self.reassembler.insert(
            first_index,
            &segment.payload,
            segment.flags.contains(SegmentFlags::FIN),
        );
    }

    pub fn ack(&self) -> TcpAck {
        let output = self.reassembler.output();
        let ackno = self.zero_point.map(|zero_point| {
            // bytes assembled, plus the SYN, plus the FIN once the stream
            // has closed
            let mut abs = output.bytes_pushed() + 1;
            if output.is_closed() {
                abs += 1;
            }
            SeqNo::wrap(abs, zero_point)
        });
        TcpAck {
            ackno,
            window_size: std::cmp::min(output.available_capacity(), u16::MAX as u64) as u16,
            rst: output.has_error(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn segment(seqno: u32, flags: SegmentFlags, payload: &[u8]) -> TcpSegment {
        TcpSegment {
            seqno: SeqNo::new(seqno),
            flags,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn no_ackno_before_syn() {
        let mut r = TcpReceiver::new(64);
        r.receive(&segment(17, SegmentFlags::empty(), b"ignored"));
        let ack = r.ack();
        assert_eq!(ack.ackno, None);
        assert_eq!(ack.window_size, 64);
        assert_eq!(r.output().bytes_pushed(), 0);
    }

    #[test]
    fn syn_fixes_the_zero_point() {
        let mut r = TcpReceiver::new(64);
        r.receive(&segment(100, SegmentFlags::SYN, b""));
        assert_eq!(r.ack().ackno, Some(SeqNo::new(101)));

        // a later stray SYN does not move it
        r.receive(&segment(900, SegmentFlags::SYN, b""));
        assert_eq!(r.ack().ackno, Some(SeqNo::new(101)));
    }

    #[test]
    fn payload_lands_at_the_right_stream_index() {
        let mut r = TcpReceiver::new(64);
        r.receive(&segment(100, SegmentFlags::SYN, b"ab"));
        r.receive(&segment(103, SegmentFlags::empty(), b"cd"));
        let mut out = Vec::new();
        {
            let reader = r.reader();
            out.extend_from_slice(reader.peek());
        }
        assert_eq!(out, b"abcd");
        assert_eq!(r.ack().ackno, Some(SeqNo::new(105)));
    }

    #[test]
    fn out_of_order_segments_wait_for_the_gap() {
        let mut r = TcpReceiver::new(64);
        r.receive(&segment(0, SegmentFlags::SYN, b""));
        r.receive(&segment(3, SegmentFlags::empty(), b"cd"));
        assert_eq!(r.ack().ackno, Some(SeqNo::new(1)));

        r.receive(&segment(1, SegmentFlags::empty(), b"ab"));
        assert_eq!(r.ack().ackno, Some(SeqNo::new(5)));
    }

    #[test]
    fn fin_bumps_the_ackno_once_the_stream_closes() {
        let mut r = TcpReceiver::new(64);
        r.receive(&segment(0, SegmentFlags::SYN, b""));
        r.receive(&segment(1, SegmentFlags::FIN, b"hi"));
        assert_eq!(r.ack().ackno, Some(SeqNo::new(4))); // SYN + "hi" + FIN
        assert!(r.output().is_closed());
    }

    #[test]
    fn fin_with_a_gap_is_not_acknowledged_early() {
        let mut r = TcpReceiver::new(64);
        r.receive(&segment(0, SegmentFlags::SYN, b""));
        r.receive(&segment(3, SegmentFlags::FIN, b"cd"));
        assert_eq!(r.ack().ackno, Some(SeqNo::new(1)));
        r.receive(&segment(1, SegmentFlags::empty(), b"ab"));
        assert_eq!(r.ack().ackno, Some(SeqNo::new(6)));
    }

    #[test]
    fn window_size_reflects_remaining_capacity_and_clamps() {
        let mut r = TcpReceiver::new(100_000);
        assert_eq!(r.ack().window_size, u16::MAX);
        r.receive(&segment(0, SegmentFlags::SYN, b""));
        r.receive(&segment(1, SegmentFlags::empty(), &vec![b'x'; 40_000]));
        assert_eq!(r.ack().window_size, 60_000);
        r.receive(&segment(40_001, SegmentFlags::empty(), &vec![b'y'; 40_000]));
        assert_eq!(r.ack().window_size, 20_000);
    }

    #[test]
    fn rst_sets_the_error_and_is_mirrored() {
        let mut r = TcpReceiver::new(64);
        r.receive(&segment(0, SegmentFlags::SYN, b"data"));
        r.receive(&segment(99, SegmentFlags::RST, b""));
        assert!(r.output().has_error());
        assert!(r.ack().rst);
    }

    #[test]
    fn non_syn_segment_at_the_zero_point_is_dropped() {
        let mut r = TcpReceiver::new(64);
        r.receive(&segment(5, SegmentFlags::SYN, b""));
        // same seqno as the SYN, but without the flag: indexes before the stream
        r.receive(&segment(5, SegmentFlags::empty(), b"xx"));
        assert_eq!(r.output().bytes_pushed(), 0);
    }
}
