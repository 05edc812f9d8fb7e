use crate::invariants::debug_assert_ring_conserved;

/// A fixed-capacity byte ring buffer with single-producer / single-consumer
/// discipline.
///
/// Unlike a lock-free ring, this buffer performs no synchronization of its
/// own: callers (the [`crate::AsyncInputStream`]) are responsible for
/// guarding every access with a mutex. It exists purely to give the producer
/// and the consumer a contiguous window to copy into/out of, so that filling
/// or draining the buffer costs at most two `memcpy`-equivalent calls.
pub struct RingBuffer {
    data: Box<[u8]>,
    /// Index of the first readable byte.
    read_pos: usize,
    /// Number of readable bytes currently stored.
    len: usize,
}

impl RingBuffer {
    /// Creates a new ring buffer with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            read_pos: 0,
            len: 0,
        }
    }

    /// Total capacity `C` of the buffer.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of readable bytes (`readable`).
    #[inline]
    pub fn size(&self) -> usize {
        self.len
    }

    /// Returns `true` if there are no readable bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The largest contiguous readable region without wrapping. Empty iff
    /// the buffer is empty.
    #[inline]
    pub fn read_window(&self) -> &[u8] {
        let cap = self.capacity();
        let avail = self.len.min(cap - self.read_pos);
        &self.data[self.read_pos..self.read_pos + avail]
    }

    /// The largest contiguous writable region without wrapping. Empty iff
    /// the buffer is full.
    #[inline]
    pub fn write_window(&mut self) -> &mut [u8] {
        let cap = self.capacity();
        let write_pos = (self.read_pos + self.len) % cap;
        let free = cap - self.len;
        let avail = free.min(cap - write_pos);
        &mut self.data[write_pos..write_pos + avail]
    }

    /// Advances the read cursor by `n` bytes. `n` must not exceed
    /// `read_window().len()`.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.read_window().len(), "consume() beyond read window");
        let cap = self.capacity();
        self.read_pos = (self.read_pos + n) % cap;
        self.len -= n;
        debug_assert_ring_conserved!(self.len, self.capacity());
    }

    /// Advances the write cursor by `n` bytes, marking them readable. `n`
    /// must not exceed `write_window().len()`.
    pub fn append(&mut self, n: usize) {
        debug_assert!(self.len + n <= self.capacity(), "append() beyond capacity");
        self.len += n;
        debug_assert_ring_conserved!(self.len, self.capacity());
    }

    /// Copies `src` into the buffer, wrapping around at most once (at most
    /// two copies total). Panics if `src` does not fit in the remaining
    /// writable space — callers must check capacity first.
    pub fn append_bytes(&mut self, src: &[u8]) {
        assert!(
            src.len() <= self.capacity() - self.len,
            "append_bytes: {} bytes do not fit in {} remaining",
            src.len(),
            self.capacity() - self.len
        );

        let w = self.write_window();
        let first = w.len().min(src.len());
        w[..first].copy_from_slice(&src[..first]);
        self.append(first);

        let remaining = src.len() - first;
        if remaining > 0 {
            let w = self.write_window();
            debug_assert!(w.len() >= remaining);
            w[..remaining].copy_from_slice(&src[first..]);
            self.append(remaining);
        }
    }

    /// Empties the buffer, discarding all readable bytes.
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_has_full_write_window() {
        let mut b = RingBuffer::new(16);
        assert_eq!(b.read_window().len(), 0);
        assert_eq!(b.write_window().len(), 16);
    }

    #[test]
    fn append_then_read_round_trips() {
        let mut b = RingBuffer::new(8);
        b.append_bytes(b"hello");
        assert_eq!(b.size(), 5);
        assert_eq!(b.read_window(), b"hello");
        b.consume(5);
        assert_eq!(b.size(), 0);
    }

    #[test]
    fn wrap_around_uses_two_windows() {
        let mut b = RingBuffer::new(8);
        b.append_bytes(&[1, 2, 3, 4, 5, 6]);
        b.consume(6);
        // write cursor is now at index 6 with 8 bytes capacity: window of 2
        // bytes, then wraps.
        b.append_bytes(&[7, 8, 9, 10]);
        assert_eq!(b.size(), 4);
        let mut out = Vec::new();
        while !b.is_empty() {
            let r = b.read_window();
            out.extend_from_slice(r);
            let n = r.len();
            b.consume(n);
        }
        assert_eq!(out, vec![7, 8, 9, 10]);
    }

    #[test]
    fn round_trip_arbitrary_chunking() {
        let cap = 64;
        let mut b = RingBuffer::new(cap);
        let data: Vec<u8> = (0..200u32).map(|i| (i % 256) as u8).collect();
        let mut produced = 0;
        let mut consumed_out = Vec::new();

        while consumed_out.len() < data.len() {
            // Fill as much as fits.
            while produced < data.len() && b.size() < cap {
                let chunk = (produced % 5) + 1;
                let free = cap - b.size();
                let n = chunk.min(free).min(data.len() - produced);
                if n == 0 {
                    break;
                }
                b.append_bytes(&data[produced..produced + n]);
                produced += n;
            }
            // Drain everything available.
            while !b.is_empty() {
                let r = b.read_window();
                consumed_out.extend_from_slice(r);
                let n = r.len();
                b.consume(n);
            }
        }

        assert_eq!(consumed_out, data);
    }

    #[test]
    fn clear_empties_buffer() {
        let mut b = RingBuffer::new(8);
        b.append_bytes(b"abcd");
        b.clear();
        assert_eq!(b.size(), 0);
        assert_eq!(b.write_window().len(), 8);
    }
}
