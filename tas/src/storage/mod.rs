//! Accounting of the circular connection byte buffers.
//!
//! The bytes themselves live in the shared buffer memory. These types only track which part of a
//! buffer belongs to whom and how much progress has not yet been reported to the fast path. The
//! reported progress, a bump, is always a delta: the fast path never learns absolute offsets from
//! an application.
//!
//! A transmit buffer is divided, starting at its head, into bytes sent but not acknowledged
//! (behind the head), bytes allocated to the application but not sent (after the head) and free
//! space:
//!
//! ```text
//!          sent        allocated
//!     |..........|:::::::::::::::|            |
//!                ^ head
//! ```
//!
//! A receive buffer is divided into bytes received but not yet consumed by the application, which
//! end at the head, and free space.
use crate::{Error, Result};


/// A contiguous range of a circular buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    /// Offset of the first byte within the buffer.
    pub pos: u32,
    /// Number of bytes.
    pub len: u32,
}

/// The application's view of a transmit buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxBuffer {
    len: u32,
    head: u32,
    sent: u32,
    allocated: u32,
    bump: u32,
}

/// The application's view of a receive buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RxBuffer {
    len: u32,
    head: u32,
    used: u32,
    bump: u32,
}

impl Span {
    /// The offset one past the last byte, `None` if it does not fit a `u32`.
    pub fn end(&self) -> Option<u32> {
        self.pos.checked_add(self.len)
    }

    /// The span covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Split `len` bytes starting at `pos` of a circular buffer of `buf_len` bytes at the wrap.
///
/// The second span is only present if the range wraps.
pub fn split(pos: u32, len: u32, buf_len: u32) -> (Span, Option<Span>) {
    debug_assert!(pos < buf_len && len <= buf_len);
    let first = len.min(buf_len - pos);
    let head = Span { pos, len: first };
    if first == len {
        (head, None)
    } else {
        (head, Some(Span { pos: 0, len: len - first }))
    }
}

fn advance(pos: u32, by: u32, len: u32) -> u32 {
    let next = u64::from(pos) + u64::from(by);
    (next % u64::from(len)) as u32
}

/// The distance from `from` forward to `to` in a buffer of `len` bytes.
fn distance(from: u32, to: u32, len: u32) -> u32 {
    let to = u64::from(to) + u64::from(len);
    ((to - u64::from(from)) % u64::from(len)) as u32
}

/// Whether `span` lies inside `len` bytes starting at `start` without crossing the wrap.
fn within(span: Span, start: u32, len: u32, buf_len: u32) -> bool {
    match span.end() {
        Some(end) if span.pos < buf_len && end <= buf_len => {},
        _ => return false,
    }
    let offset = distance(start, span.pos, buf_len);
    u64::from(offset) + u64::from(span.len) <= u64::from(len)
}

impl TxBuffer {
    /// An empty buffer of `len` bytes, must be non-zero.
    pub fn new(len: u32) -> Result<Self> {
        if len == 0 {
            return Err(Error::Illegal);
        }
        Ok(TxBuffer { len, head: 0, sent: 0, allocated: 0, bump: 0 })
    }

    /// Size of the buffer in bytes.
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Nothing is allocated or in flight.
    pub fn is_empty(&self) -> bool {
        self.sent == 0 && self.allocated == 0
    }

    /// The position of the next byte to be sent.
    pub fn head(&self) -> u32 {
        self.head
    }

    /// Bytes handed to the fast path and not yet acknowledged.
    pub fn sent(&self) -> u32 {
        self.sent
    }

    /// Bytes allocated to the application and not yet sent.
    pub fn allocated(&self) -> u32 {
        self.allocated
    }

    /// Bytes free for allocation.
    pub fn available(&self) -> u32 {
        self.len - self.sent - self.allocated
    }

    /// Sent bytes not yet reported to the fast path.
    pub fn pending_bump(&self) -> u32 {
        self.bump
    }

    /// Allocate up to `want` contiguous bytes.
    ///
    /// The allocation is cut short at the end of the buffer or at the first unavailable byte,
    /// whichever comes first. Fails with `WouldBlock` only if no byte at all is available.
    pub fn alloc(&mut self, want: u32) -> Result<Span> {
        let pos = self.alloc_pos();
        let contiguous = self.available().min(self.len - pos);
        self.reserve(pos, want.min(contiguous))
    }

    /// Allocate up to `want` bytes, as two spans if the allocation wraps.
    pub fn alloc2(&mut self, want: u32) -> Result<(Span, Option<Span>)> {
        let pos = self.alloc_pos();
        let len = want.min(self.available());
        let (first, second) = split(pos, len, self.len);
        self.reserve(first.pos, len)?;
        Ok((first, second))
    }

    fn alloc_pos(&self) -> u32 {
        advance(self.head, self.allocated, self.len)
    }

    fn reserve(&mut self, pos: u32, len: u32) -> Result<Span> {
        if len == 0 && self.available() == 0 {
            return Err(Error::WouldBlock);
        }
        self.allocated += len;
        Ok(Span { pos, len })
    }

    /// Mark the first `bytes` allocated bytes as ready to send.
    pub fn send(&mut self, bytes: u32) -> Result<()> {
        if bytes > self.allocated {
            return Err(Error::Illegal);
        }
        self.allocated -= bytes;
        self.sent += bytes;
        self.head = advance(self.head, bytes, self.len);
        self.bump += bytes;
        Ok(())
    }

    /// Release `bytes` acknowledged by the peer.
    pub fn ack(&mut self, bytes: u32) -> Result<()> {
        if bytes > self.sent {
            return Err(Error::Illegal);
        }
        self.sent -= bytes;
        Ok(())
    }

    /// Take the progress to report to the fast path.
    pub fn take_bump(&mut self) -> u32 {
        core::mem::replace(&mut self.bump, 0)
    }

    /// Report `bytes` already sent a second time, after an earlier report was lost.
    ///
    /// Progress in flight can never exceed the bytes still unacknowledged.
    pub fn resend(&mut self, bytes: u32) -> Result<()> {
        match self.bump.checked_add(bytes) {
            Some(bump) if bump <= self.sent => {
                self.bump = bump;
                Ok(())
            },
            _ => Err(Error::Illegal),
        }
    }

    /// Whether `span` is part of the allocated, unsent bytes and does not wrap.
    pub fn is_allocated(&self, span: Span) -> bool {
        within(span, self.head, self.allocated, self.len)
    }
}

impl RxBuffer {
    /// An empty buffer of `len` bytes, must be non-zero.
    pub fn new(len: u32) -> Result<Self> {
        if len == 0 {
            return Err(Error::Illegal);
        }
        Ok(RxBuffer { len, head: 0, used: 0, bump: 0 })
    }

    /// Size of the buffer in bytes.
    pub fn len(&self) -> u32 {
        self.len
    }

    /// No unconsumed data.
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// The position where the next received byte is placed.
    pub fn head(&self) -> u32 {
        self.head
    }

    /// Bytes received and not yet consumed.
    pub fn used(&self) -> u32 {
        self.used
    }

    /// Free space.
    pub fn space(&self) -> u32 {
        self.len - self.used
    }

    /// Consumed bytes not yet reported to the fast path.
    pub fn pending_bump(&self) -> u32 {
        self.bump
    }

    /// Account for `bytes` newly received at the head.
    ///
    /// Returns the span of the new data, which may wrap.
    pub fn receive(&mut self, bytes: u32) -> Result<(Span, Option<Span>)> {
        if bytes > self.space() {
            return Err(Error::Illegal);
        }
        let spans = split(self.head, bytes, self.len);
        self.used += bytes;
        self.head = advance(self.head, bytes, self.len);
        Ok(spans)
    }

    /// The application is done with the oldest `bytes` received bytes.
    pub fn done(&mut self, bytes: u32) -> Result<()> {
        if bytes > self.used {
            return Err(Error::Illegal);
        }
        self.used -= bytes;
        self.bump += bytes;
        Ok(())
    }

    /// Take the progress to report to the fast path.
    pub fn take_bump(&mut self) -> u32 {
        core::mem::replace(&mut self.bump, 0)
    }

    /// Report `bytes` of freed space a second time, after an earlier report was lost.
    pub fn resend(&mut self, bytes: u32) -> Result<()> {
        match self.bump.checked_add(bytes) {
            Some(bump) if bump <= self.space() => {
                self.bump = bump;
                Ok(())
            },
            _ => Err(Error::Illegal),
        }
    }

    /// Whether `span` holds received data not yet consumed and does not wrap.
    pub fn is_unconsumed(&self, span: Span) -> bool {
        let start = distance(self.used, self.head, self.len);
        within(span, start, self.used, self.len)
    }
}
