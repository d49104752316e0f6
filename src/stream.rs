use std::collections::VecDeque;

/// A finite-capacity FIFO of bytes with separate writer and reader views.
///
/// The writer pushes bytes until it declares the stream closed; the reader
/// pops them in order. Both halves observe the sticky error flag, which is
/// how a peer reset reaches the application. Capacity bounds the bytes
/// buffered at any instant, not the lifetime total.
#[derive(Debug)]
pub struct ByteStream {
    capacity: u64,
    buffer: VecDeque<u8>,
    closed: bool,
    error: bool,
    pushed: u64,
    popped: u64,
}

impl ByteStream {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            buffer: VecDeque::new(),
            closed: false,
            error: false,
            pushed: 0,
            popped: 0,
        }
    }

    /// Writer view of the stream.
    pub fn writer(&mut self) -> Writer<'_> {
        Writer { stream: self }
    }

    /// Reader view of the stream.
    pub fn reader(&mut self) -> Reader<'_> {
        Reader { stream: self }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn available_capacity(&self) -> u64 {
        self.capacity - self.buffer.len() as u64
    }

    pub fn bytes_buffered(&self) -> u64 {
        self.buffer.len() as u64
    }

    pub fn bytes_pushed(&self) -> u64 {
        self.pushed
    }

    pub fn bytes_popped(&self) -> u64 {
        self.popped
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closed and fully drained.
    pub fn is_finished(&self) -> bool {
        self.closed && self.buffer.is_empty()
    }

    pub fn has_error(&self) -> bool {
        self.error
    }
}

/// Write half of a [`ByteStream`].
pub struct Writer<'a> {
    stream: &'a mut ByteStream,
}

impl Writer<'_> {
    /// Push as much of `data` as capacity allows; the remainder is dropped.
    /// No-op once the stream is closed.
    pub fn push(&mut self, data: &[u8]) {
        if self.stream.closed {
            return;
        }
        let take = std::cmp::min(data.len() as u64, self.stream.available_capacity()) as usize;
        self.stream.buffer.extend(&data[..take]);
        self.stream.pushed += take as u64;
    }

    /// Declare end of input. Idempotent.
    pub fn close(&mut self) {
        self.stream.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.stream.closed
    }

    pub fn available_capacity(&self) -> u64 {
        self.stream.available_capacity()
    }

    pub fn bytes_pushed(&self) -> u64 {
        self.stream.pushed
    }

    pub fn has_error(&self) -> bool {
        self.stream.error
    }
}

/// Read half of a [`ByteStream`].
pub struct Reader<'a> {
    stream: &'a mut ByteStream,
}

impl Reader<'_> {
    /// A contiguous prefix of the buffered bytes. Non-empty whenever the
    /// buffer is non-empty, but possibly shorter than the whole buffer.
    pub fn peek(&self) -> &[u8] {
        self.stream.buffer.as_slices().0
    }

    /// Remove the first `len` buffered bytes (clamped to what is buffered).
    pub fn pop(&mut self, len: u64) {
        let take = std::cmp::min(len, self.stream.buffer.len() as u64) as usize;
        drop(self.stream.buffer.drain(..take));
        self.stream.popped += take as u64;
    }

    pub fn is_finished(&self) -> bool {
        self.stream.is_finished()
    }

    pub fn bytes_buffered(&self) -> u64 {
        self.stream.bytes_buffered()
    }

    pub fn bytes_popped(&self) -> u64 {
        self.stream.popped
    }

    pub fn has_error(&self) -> bool {
        self.stream.error
    }

    /// Mark the stream dead. Sticky.
    pub fn set_error(&mut self) {
        self.stream.error = true;
    }
}
