use std::collections::VecDeque;

use crate::stream::{ByteStream, Reader, Writer};
use crate::tcp::sequence::SeqNo;
use crate::tcp::{SegmentFlags, TcpAck, TcpSegment, MAX_PAYLOAD_SIZE};

/// Send side of a TCP connection.
///
/// Reads from its input [`ByteStream`], cuts the bytes into segments that
/// fit the peer's advertised window, and keeps every unacknowledged segment
/// queued for retransmission. A single timer covers the earliest
/// outstanding segment; its timeout doubles on every expiry while the peer
/// advertises a non-zero window (RFC 6298 style backoff). An advertised
/// window of zero is probed as if it were one, without backoff, so the
/// reopened window is eventually discovered.
#[derive(Debug)]
pub struct TcpSender {
    input: ByteStream,
    isn: SeqNo,
    initial_rto_ms: u64,

    /// Next absolute sequence number to assign.
    next_abs: u64,
    /// Highest absolute sequence number the peer has acknowledged.
    acked_abs: u64,
    /// Last advertised window. Starts at 1: room for the SYN.
    window: u64,
    syn_sent: bool,
    fin_sent: bool,

    /// Unacknowledged segments, ascending sequence order.
    outstanding: VecDeque<TcpSegment>,
    in_flight: u64,

    rto_ms: u64,
    timer_ms: u64,
    retransmissions: u64,
}

impl TcpSender {
    pub fn new(input: ByteStream, isn: SeqNo, initial_rto_ms: u64) -> Self {
        Self {
            input,
            isn,
            initial_rto_ms,
            next_abs: 0,
            acked_abs: 0,
            window: 1,
            syn_sent: false,
            fin_sent: false,
            outstanding: VecDeque::new(),
            in_flight: 0,
            rto_ms: initial_rto_ms,
            timer_ms: 0,
            retransmissions: 0,
        }
    }

    /// Write half of the input stream, for the application.
    pub fn writer(&mut self) -> Writer<'_> {
        self.input.writer()
    }

    /// Read half of the input stream.
    pub fn reader(&mut self) -> Reader<'_> {
        self.input.reader()
    }

    pub fn sequence_numbers_in_flight(&self) -> u64 {
        self.in_flight
    }

    pub fn consecutive_retransmissions(&self) -> u64 {
        self.retransmissions
    }

    /// Cut as many segments as the window allows and hand each to
    /// `transmit`. The first segment carries SYN; FIN rides along once the
    /// input stream is finished and the window has room for it.
    pub fn push<F: FnMut(&TcpSegment)>(&mut self, mut transmit: F) {
        loop {
            // A closed window is probed with a single sequence number, so
            // the peer's next ack can reopen it.
            let window = std::cmp::max(self.window, 1);

            let mut flags = SegmentFlags::empty();
            if self.input.has_error() {
                flags |= SegmentFlags::RST;
            }
            if !self.syn_sent {
                flags |= SegmentFlags::SYN;
            }
            let syn_len = flags.contains(SegmentFlags::SYN) as u64;

            let budget = window.saturating_sub(self.in_flight + syn_len);
            let payload = {
                let reader = self.input.reader();
                let chunk = reader.peek();
                let take = std::cmp::min(budget, MAX_PAYLOAD_SIZE as u64) as usize;
                chunk[..std::cmp::min(take, chunk.len())].to_vec()
            };
            self.input.reader().pop(payload.len() as u64);

            let mut seq_len = syn_len + payload.len() as u64;
            if !self.fin_sent
                && self.input.is_finished()
                && seq_len + 1 + self.in_flight <= window
            {
                flags |= SegmentFlags::FIN;
                self.fin_sent = true;
                seq_len += 1;
            }

            if seq_len == 0 {
                break;
            }
            self.syn_sent = true;

            let segment = TcpSegment {
                seqno: SeqNo::wrap(self.next_abs, self.isn),
                flags,
                payload,
            };
            self.next_abs += seq_len;
            self.in_flight += seq_len;
            self.outstanding.push_back(segment.clone());
            transmit(&segment);
        }
    }

    /// A zero-length segment at the current sequence number, used for bare
    /// acknowledgements and reset notification.
    pub fn make_empty_segment(&self) -> TcpSegment {
        let mut flags = SegmentFlags::empty();
        if self.input.has_error() {
            flags |= SegmentFlags::RST;
        }
        TcpSegment {
            seqno: SeqNo::wrap(self.next_abs, self.isn),
            flags,
            payload: Vec::new(),
        }
    }

    /// Process the peer's acknowledgement: adopt the advertised window,
    /// retire fully-acknowledged segments, and restart the retransmission
    /// timer whenever the ackno moves forward.
    pub fn receive(&mut self, ack: &TcpAck) {
        self.window = ack.window_size as u64;
        if ack.rst {
            self.input.reader().set_error();
        }
        let Some(ackno) = ack.ackno else {
            return;
        };

        let ack_abs = ackno.unwrap(self.isn, self.next_abs);
        if ack_abs > self.next_abs {
            // Acknowledges data never sent; ignore.
            return;
        }

        while let Some(front) = self.outstanding.front() {
            let start = front.seqno.unwrap(self.isn, self.next_abs);
            if start + front.sequence_length() > ack_abs {
                break;
            }
            self.in_flight -= front.sequence_length();
            self.outstanding.pop_front();
        }

        if ack_abs > self.acked_abs {
            self.acked_abs = ack_abs;
            self.rto_ms = self.initial_rto_ms;
            self.timer_ms = 0;
            self.retransmissions = 0;
        }
    }

    /// Advance the retransmission timer by `ms` milliseconds. On expiry the
    /// earliest outstanding segment is retransmitted; the timeout doubles
    /// only while the peer's window is open.
    pub fn tick<F: FnMut(&TcpSegment)>(&mut self, ms: u64, mut transmit: F) {
        if self.outstanding.is_empty() {
            self.timer_ms = 0;
            self.retransmissions = 0;
            self.rto_ms = self.initial_rto_ms;
            return;
        }

        self.timer_ms += ms;
        if self.timer_ms < self.rto_ms {
            return;
        }

        if let Some(front) = self.outstanding.front() {
            log::trace!(
                "retransmitting seqno {} ({} sequence numbers)",
                front.seqno.raw(),
                front.sequence_length()
            );
            transmit(front);
        }
        if self.window > 0 {
            self.retransmissions += 1;
            self.rto_ms *= 2;
        }
        self.timer_ms = 0;
    }
}
