use std::ops::RangeInclusive;

use alloy::primitives::BlockNumber;

/// Splits `start..=end` into consecutive ranges of at most `chunk_size` blocks, oldest first.
///
/// Every block is yielded exactly once and the last range always ends at `end`.
#[derive(Debug, Clone)]
pub(crate) struct ChunkIterator {
    current: BlockNumber,
    end: BlockNumber,
    chunk_size: u64,
    finished: bool,
}

impl ChunkIterator {
    /// # Panics
    ///
    /// Panics if `chunk_size` is 0.
    #[must_use]
    pub(crate) const fn new(start: BlockNumber, end: BlockNumber, chunk_size: u64) -> Self {
        assert!(chunk_size >= 1, "chunk_size must be at least 1");
        Self { current: start, end, chunk_size, finished: start > end }
    }
}

impl Iterator for ChunkIterator {
    type Item = RangeInclusive<BlockNumber>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let chunk_start = self.current;
        let chunk_end = chunk_start.saturating_add(self.chunk_size - 1).min(self.end);
        // `end` may be u64::MAX, so stop on reaching it rather than stepping past it.
        if chunk_end == self.end {
            self.finished = true;
        } else {
            self.current = chunk_end + 1;
        }

        Some(chunk_start..=chunk_end)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            return (0, Some(0));
        }
        let remaining = (self.end - self.current) / self.chunk_size + 1;
        match usize::try_from(remaining) {
            Ok(remaining) => (remaining, Some(remaining)),
            Err(_) => (usize::MAX, None),
        }
    }
}
