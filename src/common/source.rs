use crate::{ChunkDescriptor, ChunkupError, ChunkupResult};
use futures::future::{self, BoxFuture, FutureExt};

/// A byte source with a known length and independent positional reads.
///
/// Workers read disjoint chunks of the same source concurrently, so
/// implementations must not rely on a shared cursor.
pub trait ChunkSource: Send + Sync {
    /// Name reported to the server when a session is opened.
    fn name(&self) -> &str;

    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads exactly `chunk.length` bytes starting at `chunk.offset`.
    fn read_chunk(&self, chunk: &ChunkDescriptor) -> BoxFuture<'_, ChunkupResult<Vec<u8>>>;
}

/// Bytes already held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

impl ChunkSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_chunk(&self, chunk: &ChunkDescriptor) -> BoxFuture<'_, ChunkupResult<Vec<u8>>> {
        let start = chunk.offset as usize;
        let end = start.saturating_add(chunk.length as usize);

        let result = match self.data.get(start..end) {
            Some(slice) => Ok(slice.to_vec()),
            None => Err(ChunkupError::invalid(format!(
                "chunk {} ({}..{}) is out of bounds for {} bytes",
                chunk.index,
                start,
                end,
                self.data.len()
            ))),
        };

        future::ready(result).boxed()
    }
}
