use bytes::{Buf, Bytes, BytesMut};
use std::collections::VecDeque;

/// A segmented buffer optimized for zero-copy operations.
///
/// This buffer holds multiple `Bytes` segments and provides efficient
/// extraction without unnecessary copies. When data is requested and
/// fits within a single segment, it can be returned with zero copies
/// (just a refcount increment on the underlying `Bytes`).
///
/// # Use Cases
///
/// - Protocol decoders reading frames from streaming data
/// - Minimizing memcpy overhead for small messages (< 8KB)
/// - Preserving read-buffer segments through the pipeline
///
/// # Tradeoffs
///
/// - **Fast path**: Single-segment extraction is O(1) with no copy
/// - **Slow path**: Multi-segment extraction requires copying into contiguous buffer
/// - For large messages spanning many reads, the copy cost is unavoidable
#[derive(Debug, Default)]
pub struct SegmentedBuffer {
    segs: VecDeque<Bytes>,
    len: usize,
}

impl SegmentedBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            segs: VecDeque::new(),
            len: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn push(&mut self, bytes: Bytes) {
        if bytes.is_empty() {
            return;
        }
        self.len += bytes.len();
        self.segs.push_back(bytes);
    }

    /// Copy the first `n` bytes into `dst`.
    ///
    /// Returns `false` if fewer than `n` bytes are available.
    pub fn copy_prefix(&self, n: usize, dst: &mut [u8]) -> bool {
        if n > self.len || dst.len() < n {
            return false;
        }

        let mut remaining = n;
        let mut out_off = 0;
        for seg in &self.segs {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(seg.len());
            dst[out_off..out_off + take].copy_from_slice(&seg[..take]);
            out_off += take;
            remaining -= take;
        }
        true
    }

    /// Advance the queue by `n` bytes, dropping fully-consumed segments.
    ///
    /// # Panics
    ///
    /// Panics if `n > self.len`.
    pub fn advance(&mut self, mut n: usize) {
        assert!(n <= self.len);
        self.len -= n;

        while n > 0 {
            let Some(mut front) = self.segs.pop_front() else {
                break;
            };
            if n >= front.len() {
                n -= front.len();
                continue;
            }
            // partially consumed
            front.advance(n);
            self.segs.push_front(front);
            break;
        }
    }

    /// Take exactly `n` bytes from the front of the queue.
    ///
    /// If the first segment contains all `n` bytes, this is zero-copy.
    /// If the bytes span multiple segments, this copies into a contiguous buffer.
    pub fn take_bytes(&mut self, n: usize) -> Option<Bytes> {
        if n == 0 {
            return Some(Bytes::new());
        }
        if n > self.len {
            return None;
        }

        let Some(front) = self.segs.front_mut() else {
            return None;
        };

        if front.len() >= n {
            self.len -= n;
            let out = front.split_to(n);
            if front.is_empty() {
                self.segs.pop_front();
            }
            return Some(out);
        }

        // Spans segments: copy.
        let mut out = BytesMut::with_capacity(n);
        let mut remaining = n;
        while remaining > 0 {
            let seg = self.segs.pop_front().expect("len check ensures segments exist");
            let take = remaining.min(seg.len());
            out.extend_from_slice(&seg[..take]);
            remaining -= take;
            self.len -= take;
            if take < seg.len() {
                let mut rest = seg;
                rest.advance(take);
                self.segs.push_front(rest);
            }
        }

        Some(out.freeze())
    }
}

/// An ack-cumulative, sequence-keyed FIFO of in-flight payloads.
///
/// The reliable transport client pushes every outbound payload here before
/// writing it to the wire, tagging it with a monotonically increasing
/// sequence number. When the server acks a sequence, every entry up to and
/// including that sequence is considered delivered and dropped. On
/// reconnect, whatever remains (not yet acked) is replayed in order via
/// [`SequentialBuffer::reset`].
///
/// This mirrors the original transport's `SequentialBuffer` interface
/// (`CanAdd`/`Add`/`Ack`/`Len`/`Reset`), reimplemented here over a
/// `VecDeque` rather than a channel-as-ring-buffer — the latter is a
/// Go-specific trick that doesn't translate into an idiomatic Rust
/// collection.
#[derive(Debug)]
pub struct SequentialBuffer {
    items: VecDeque<(u64, Bytes)>,
    capacity: usize,
    next_seq: u64,
}

impl SequentialBuffer {
    /// Create a new buffer with room for `hwm + 1` outstanding entries.
    ///
    /// A fresh buffer assigns sequence number 1 to its first entry, per the
    /// sequential-buffer invariant: sequence numbers start at 1 and increase
    /// by 1 on every `add`.
    #[must_use]
    pub fn new(hwm: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity: hwm + 1,
            next_seq: 1,
        }
    }

    /// Whether another item can be added without exceeding capacity.
    #[must_use]
    pub fn can_add(&self) -> bool {
        self.items.len() < self.capacity
    }

    /// Number of outstanding (unacked) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add a new payload, returning its assigned sequence number.
    ///
    /// # Errors
    ///
    /// Returns a programming error if called when [`SequentialBuffer::can_add`]
    /// is false; callers are expected to check capacity first.
    pub fn add(&mut self, payload: Bytes) -> crate::error::Result<u64> {
        if !self.can_add() {
            return Err(crate::error::CoreError::programming(
                "SequentialBuffer::add called at capacity",
            ));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.items.push_back((seq, payload));
        Ok(seq)
    }

    /// Acknowledge everything up to and including `seq`, dropping it from
    /// the buffer. Acks for sequences already dropped are ignored.
    pub fn ack(&mut self, seq: u64) {
        while let Some((front_seq, _)) = self.items.front() {
            if *front_seq > seq {
                break;
            }
            self.items.pop_front();
        }
    }

    /// Re-sequence every outstanding (unacked) entry starting at 1 — the
    /// sequence numbers a fresh peer on the other end of a new connection
    /// will expect — and return the renumbered snapshot in order for replay.
    ///
    /// The entries stay in the buffer (still unacked; the peer hasn't seen
    /// them yet under any sequence number), so `len()` is unchanged and the
    /// next `add` assigns `len() + 1`.
    pub fn reset(&mut self) -> Vec<(u64, Bytes)> {
        let renumbered: VecDeque<(u64, Bytes)> = self
            .items
            .drain(..)
            .enumerate()
            .map(|(i, (_, payload))| ((i + 1) as u64, payload))
            .collect();
        self.items = renumbered;
        self.next_seq = self.items.len() as u64 + 1;
        self.items.iter().cloned().collect()
    }
}
