//! Per-session sequence counter for request numbering.
//!
//! # What is a sequence number? (for beginners)
//!
//! Every request a session sends carries a 16-bit sequence number, and the
//! daemon echoes it back in the response.  Because one socket carries exactly
//! one request at a time, the response to request `n` must carry `n`.  A
//! mismatch means a frame was skipped or duplicated somewhere and the stream
//! can no longer be trusted.
//!
//! # Overflow
//!
//! The wire field is a `u16`.  Wrapping back to a value already used on the
//! same connection would make a stale response indistinguishable from a
//! fresh one, so the counter refuses to go past `u16::MAX` instead.  The
//! caller must open a new connection.
//!
//! # Thread safety
//!
//! The counter is a plain value.  It lives inside the session's locked state,
//! and the lock is held for the whole round trip, so no atomics are needed.

/// First sequence number issued on a fresh connection.
pub const FIRST_SEQUENCE: u16 = 1;

/// A monotonically increasing, non-wrapping counter for request sequence numbers.
///
/// # Examples
///
/// ```rust
/// use peary_core::protocol::SequenceCounter;
///
/// let mut counter = SequenceCounter::new();
/// assert_eq!(counter.next(), Some(1));
/// assert_eq!(counter.next(), Some(2));
/// assert_eq!(counter.peek(), Some(3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceCounter {
    /// The value the next call to [`SequenceCounter::next`] hands out, or
    /// `None` once `u16::MAX` has been issued.
    next: Option<u16>,
}

impl SequenceCounter {
    /// Creates a new counter starting at [`FIRST_SEQUENCE`].
    pub fn new() -> Self {
        Self::starting_at(FIRST_SEQUENCE)
    }

    /// Creates a counter whose first issued value is `first`.
    pub fn starting_at(first: u16) -> Self {
        Self { next: Some(first) }
    }

    /// Returns the next sequence number and advances the counter.
    ///
    /// Returns `None` once every value up to and including `u16::MAX` has
    /// been issued.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<u16> {
        let current = self.next?;
        self.next = current.checked_add(1);
        Some(current)
    }

    /// Returns the value the next call to [`SequenceCounter::next`] would
    /// issue, without advancing.
    pub fn peek(&self) -> Option<u16> {
        self.next
    }

    /// Returns `true` once the counter can issue no further values.
    pub fn is_exhausted(&self) -> bool {
        self.next.is_none()
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
