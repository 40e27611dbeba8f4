use crate::{ChunkupError, ChunkupResult};
use std::ops::Range;

/// A contiguous byte range of the source, the unit of independent transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkDescriptor {
    pub index: usize,
    pub offset: u64,
    pub length: u64,
}

impl ChunkDescriptor {
    pub fn range(&self) -> Range<u64> {
        self.offset..self.offset + self.length
    }
}

#[derive(Debug, Clone)]
pub struct ChunkIterator {
    chunk_count: usize,
    chunk_size: u64,
    remainder: u64,

    // current chunk index
    index: usize,
}

impl ChunkIterator {
    pub fn new(size: u64, chunk_size: u64) -> ChunkupResult<Self> {
        if chunk_size == 0 {
            return Err(ChunkupError::invalid("chunk size must be positive"));
        }

        let remainder = size % chunk_size;

        let chunk_count = (size / chunk_size) as usize + if remainder > 0 { 1 } else { 0 };

        Ok(Self {
            chunk_count,
            chunk_size,
            remainder,
            index: 0,
        })
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }
}

impl Iterator for ChunkIterator {
    type Item = ChunkDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.index;

        if cur < self.chunk_count {
            let offset = cur as u64 * self.chunk_size;

            let length = if self.remainder > 0 && cur == self.chunk_count - 1 {
                self.remainder
            } else {
                self.chunk_size
            };

            // increase before return
            self.index += 1;

            Some(ChunkDescriptor {
                index: cur,
                offset,
                length,
            })
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.chunk_count - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for ChunkIterator {}

/// Splits `file_len` bytes into chunks of `chunk_size`, in index order.
pub fn plan(file_len: u64, chunk_size: u64) -> ChunkupResult<Vec<ChunkDescriptor>> {
    Ok(ChunkIterator::new(file_len, chunk_size)?.collect())
}
