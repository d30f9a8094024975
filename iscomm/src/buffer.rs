use core::ops::Range;

use log::trace;

use crate::error::CommError;

/// Fixed-capacity receive buffer over caller-owned storage.
///
/// Bytes live in `[head, tail)` of the storage. `scan` is the parser's scan cursor: bytes
/// in `[head, scan)` belong to the candidate frame being examined, bytes in `[scan, tail)`
/// have not been looked at yet. The cursors always satisfy
/// `0 <= head <= scan <= tail <= capacity`.
///
/// The storage is never grown. Space consumed by completed or discarded frames is
/// reclaimed by [`compact`](Self::compact), which shifts the pending region to the front.
#[derive(Debug)]
pub struct CommBuffer<'a> {
    storage: &'a mut [u8],
    head: usize,
    scan: usize,
    tail: usize,
}

impl<'a> CommBuffer<'a> {
    pub fn new(storage: &'a mut [u8]) -> Self {
        Self {
            storage,
            head: 0,
            scan: 0,
            tail: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of pending (unconsumed) bytes
    pub fn len(&self) -> usize {
        self.tail - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn scan(&self) -> usize {
        self.scan
    }

    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Bytes that can be appended without compacting
    pub fn free_space(&self) -> usize {
        self.storage.len() - self.tail
    }

    /// Pending bytes, `[head, tail)`
    pub fn pending(&self) -> &[u8] {
        &self.storage[self.head..self.tail]
    }

    /// Appends `bytes` at `tail`. Nothing is written if they don't all fit.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), CommError> {
        let available = self.free_space();
        if bytes.len() > available {
            return Err(CommError::BufferFull {
                required: bytes.len(),
                available,
            });
        }
        self.storage[self.tail..self.tail + bytes.len()].copy_from_slice(bytes);
        self.tail += bytes.len();
        Ok(())
    }

    /// Free region after `tail`, for transports reading straight into the buffer.
    /// Follow with [`commit`](Self::commit).
    pub fn spare_capacity_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.tail..]
    }

    /// Marks `count` bytes written through
    /// [`spare_capacity_mut`](Self::spare_capacity_mut) as received
    pub fn commit(&mut self, count: usize) -> Result<(), CommError> {
        let available = self.free_space();
        if count > available {
            return Err(CommError::BufferFull {
                required: count,
                available,
            });
        }
        self.tail += count;
        Ok(())
    }

    /// Moves `[head, tail)` to the start of the storage and returns the free space.
    /// Cursor distances are preserved, so a partially scanned frame survives.
    pub fn compact(&mut self) -> usize {
        if self.head > 0 {
            self.storage.copy_within(self.head..self.tail, 0);
            self.scan -= self.head;
            self.tail -= self.head;
            self.head = 0;
            trace!("compacted receive buffer, {} bytes pending", self.tail);
        }
        self.free_space()
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.scan = 0;
        self.tail = 0;
    }

    pub(crate) fn has_unscanned(&self) -> bool {
        self.scan < self.tail
    }

    pub(crate) fn byte_at_scan(&self) -> u8 {
        self.storage[self.scan]
    }

    pub(crate) fn advance_scan(&mut self) {
        self.scan = (self.scan + 1).min(self.tail);
    }

    /// Moves `scan` to `head + offset`, clamped to `tail`
    pub(crate) fn set_scan_offset(&mut self, offset: usize) {
        self.scan = (self.head + offset).min(self.tail);
    }

    /// Candidate frame bytes, `[head, scan)`
    pub(crate) fn candidate(&self) -> &[u8] {
        &self.storage[self.head..self.scan]
    }

    /// Drops the bytes before `scan` from consideration
    pub(crate) fn consume_scanned(&mut self) {
        self.head = self.scan;
    }

    /// Abandons the candidate frame and rescans from the byte after its start
    pub(crate) fn skip_candidate_start(&mut self) {
        self.head = (self.head + 1).min(self.tail);
        self.scan = self.head;
    }

    pub(crate) fn slice(&self, range: Range<usize>) -> &[u8] {
        &self.storage[range]
    }

    pub(crate) fn slice_mut(&mut self, range: Range<usize>) -> &mut [u8] {
        &mut self.storage[range]
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        assert!(self.head <= self.scan);
        assert!(self.scan <= self.tail);
        assert!(self.tail <= self.storage.len());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn cb_append_and_full() {
        let mut storage = [0; 8];
        let mut buf = CommBuffer::new(&mut storage);
        assert!(buf.is_empty());
        buf.append(&[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(buf.pending(), &[1, 2, 3, 4, 5]);
        assert_eq!(buf.free_space(), 3);
        assert_eq!(
            buf.append(&[6, 7, 8, 9]),
            Err(CommError::BufferFull {
                required: 4,
                available: 3
            })
        );
        // Nothing partially written
        assert_eq!(buf.pending(), &[1, 2, 3, 4, 5]);
        buf.append(&[6, 7, 8]).unwrap();
        assert_eq!(buf.free_space(), 0);
    }

    #[test]
    fn cb_compact_keeps_pending_bytes() {
        let mut storage = [0; 8];
        let mut buf = CommBuffer::new(&mut storage);
        buf.append(&[1, 2, 3, 4, 5, 6]).unwrap();
        buf.advance_scan();
        buf.advance_scan();
        buf.consume_scanned();
        buf.advance_scan();
        assert_eq!((buf.head(), buf.scan(), buf.tail()), (2, 3, 6));

        assert_eq!(buf.compact(), 4);
        assert_eq!((buf.head(), buf.scan(), buf.tail()), (0, 1, 4));
        assert_eq!(buf.pending(), &[3, 4, 5, 6]);
        assert_eq!(buf.candidate(), &[3]);
    }

    #[test]
    fn cb_spare_capacity_and_commit() {
        let mut storage = [0; 4];
        let mut buf = CommBuffer::new(&mut storage);
        buf.spare_capacity_mut()[..2].copy_from_slice(&[9, 8]);
        buf.commit(2).unwrap();
        assert_eq!(buf.pending(), &[9, 8]);
        assert!(matches!(buf.commit(3), Err(CommError::BufferFull { .. })));
        assert_eq!(buf.spare_capacity_mut().len(), 2);
    }

    #[test]
    fn cb_skip_candidate_rescans_next_byte() {
        let mut storage = [0; 8];
        let mut buf = CommBuffer::new(&mut storage);
        buf.append(&[1, 2, 3, 4]).unwrap();
        buf.set_scan_offset(3);
        assert_eq!(buf.candidate(), &[1, 2, 3]);
        buf.skip_candidate_start();
        assert_eq!((buf.head(), buf.scan()), (1, 1));
        assert_eq!(buf.byte_at_scan(), 2);
        buf.set_scan_offset(10);
        assert_eq!(buf.scan(), buf.tail());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Append(Vec<u8>),
        Advance,
        Consume,
        Skip,
        Compact,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            proptest::collection::vec(any::<u8>(), 0..12).prop_map(Op::Append),
            Just(Op::Advance),
            Just(Op::Consume),
            Just(Op::Skip),
            Just(Op::Compact),
        ]
    }

    proptest! {
        #[test]
        fn cb_cursor_invariants_hold(ops in proptest::collection::vec(op_strategy(), 0..64)) {
            let mut storage = [0u8; 32];
            let mut buf = CommBuffer::new(&mut storage);
            // Model of the pending bytes
            let mut model: Vec<u8> = Vec::new();
            for op in ops {
                match op {
                    Op::Append(bytes) => {
                        if buf.append(&bytes).is_ok() {
                            model.extend_from_slice(&bytes);
                        }
                    },
                    Op::Advance => buf.advance_scan(),
                    Op::Consume => {
                        let consumed = buf.scan() - buf.head();
                        buf.consume_scanned();
                        model.drain(..consumed);
                    },
                    Op::Skip => {
                        if !buf.is_empty() {
                            model.remove(0);
                        }
                        buf.skip_candidate_start();
                    },
                    Op::Compact => {
                        let scanned = buf.scan() - buf.head();
                        buf.compact();
                        prop_assert_eq!(buf.head(), 0);
                        prop_assert_eq!(buf.scan(), scanned);
                    },
                }
                buf.check_invariants();
                prop_assert_eq!(buf.pending(), &model[..]);
            }
        }
    }
}
