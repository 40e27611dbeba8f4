use crate::{
    ChunkupError, ChunkupResult, FileId, SessionId, SessionParam, SessionStatus, Transport,
};
use std::collections::BTreeSet;
use std::ops::Range;

/// Client-side accounting for one server session.
///
/// The acknowledgement set only grows; acknowledging an index twice is a no-op.
#[derive(Debug)]
pub struct UploadSession {
    id: SessionId,
    total_chunks: usize,
    acknowledged: BTreeSet<usize>,
}

impl UploadSession {
    pub fn new(id: SessionId, total_chunks: usize) -> Self {
        Self {
            id,
            total_chunks,
            acknowledged: BTreeSet::new(),
        }
    }

    pub async fn open(transport: &dyn Transport, param: &SessionParam) -> ChunkupResult<Self> {
        let id = transport.open_session(param).await?;

        info!(
            "session {} opened for {} ({} bytes, {} chunks)",
            id, param.name, param.size, param.chunk_count
        );

        Ok(Self::new(id, param.chunk_count))
    }

    /// Picks up an existing session, trusting the server's record of received chunks.
    pub async fn resume(
        transport: &dyn Transport,
        id: SessionId,
    ) -> ChunkupResult<(Self, SessionStatus)> {
        let status = transport.session_status(&id).await?;

        let mut session = Self::new(id, status.chunk_count);
        let total = session.total_chunks;
        for range in &status.received {
            session
                .acknowledged
                .extend(range.start.min(total)..range.end.min(total));
        }

        info!(
            "session {} resumed, {}/{} chunks already received",
            session.id,
            session.acknowledged(),
            session.total_chunks
        );

        Ok((session, status))
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn total_chunks(&self) -> usize {
        self.total_chunks
    }

    /// Records a successful chunk. Returns false if it was already recorded.
    pub fn acknowledge(&mut self, index: usize) -> bool {
        if index >= self.total_chunks {
            warn!(
                "session {}: ignoring acknowledgement of chunk {} (only {} chunks)",
                self.id, index, self.total_chunks
            );
            return false;
        }

        self.acknowledged.insert(index)
    }

    pub fn is_acknowledged(&self, index: usize) -> bool {
        self.acknowledged.contains(&index)
    }

    pub fn acknowledged(&self) -> usize {
        self.acknowledged.len()
    }

    pub fn is_complete(&self) -> bool {
        self.acknowledged.len() == self.total_chunks
    }

    pub fn missing(&self) -> Vec<Range<usize>> {
        to_ranges((0..self.total_chunks).filter(|i| !self.acknowledged.contains(i)))
    }

    pub async fn finalize(&self, transport: &dyn Transport) -> ChunkupResult<FileId> {
        if !self.is_complete() {
            return Err(ChunkupError::IncompleteUpload {
                missing: self.total_chunks - self.acknowledged.len(),
            });
        }

        transport.finalize(&self.id).await
    }
}

/// Collapses ascending indices into half-open ranges.
pub fn to_ranges(indices: impl IntoIterator<Item = usize>) -> Vec<Range<usize>> {
    let mut ranges: Vec<Range<usize>> = Vec::new();

    for index in indices {
        match ranges.last_mut() {
            Some(last) if last.end == index => last.end += 1,
            _ => ranges.push(index..index + 1),
        }
    }

    ranges
}
