use crate::common::session::to_ranges;
use crate::{
    ChunkDescriptor, ChunkResult, ChunkupError, ChunkupResult, FileId, SessionId, SessionParam,
    SessionStatus, Transport,
};
use futures::future::{BoxFuture, FutureExt};
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

struct Fault {
    remaining: usize,
    retryable: bool,
}

struct MockSession {
    param: SessionParam,
    received: BTreeSet<usize>,
    /// Replaces `received` in status replies
    reported: Option<Vec<Range<usize>>>,
}

/// In-process stand-in for the HTTP server.
#[derive(Default)]
pub(crate) struct MockTransport {
    sessions: Mutex<HashMap<SessionId, MockSession>>,
    faults: Mutex<HashMap<usize, Fault>>,
    attempts: Mutex<HashMap<usize, usize>>,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    finalize_calls: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        let transport = Self::new();
        *transport.delay.lock().unwrap() = delay;
        transport
    }

    /// Fails the next `times` transmissions of chunk `index`.
    pub fn fail(&self, index: usize, times: usize, retryable: bool) {
        self.faults.lock().unwrap().insert(
            index,
            Fault {
                remaining: times,
                retryable,
            },
        );
    }

    pub fn mark_received(&self, session_id: &SessionId, indices: &[usize]) {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(session_id).unwrap();
        session.received.extend(indices.iter().copied());
    }

    pub fn report_received(&self, session_id: &SessionId, ranges: Vec<Range<usize>>) {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.get_mut(session_id).unwrap().reported = Some(ranges);
    }

    pub fn attempts(&self, index: usize) -> usize {
        self.attempts.lock().unwrap().get(&index).copied().unwrap_or(0)
    }

    pub fn total_attempts(&self) -> usize {
        self.attempts.lock().unwrap().values().sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn finalize_calls(&self) -> usize {
        self.finalize_calls.load(Ordering::SeqCst)
    }

    pub fn received(&self, session_id: &SessionId) -> Vec<usize> {
        self.sessions.lock().unwrap()[session_id]
            .received
            .iter()
            .copied()
            .collect()
    }
}

impl Transport for MockTransport {
    fn open_session(&self, param: &SessionParam) -> BoxFuture<'_, ChunkupResult<SessionId>> {
        let mut sessions = self.sessions.lock().unwrap();
        let id = SessionId(format!("mock-{}", sessions.len()));
        sessions.insert(
            id.clone(),
            MockSession {
                param: param.clone(),
                received: BTreeSet::new(),
                reported: None,
            },
        );
        futures::future::ready(Ok(id)).boxed()
    }

    fn session_status(
        &self,
        session_id: &SessionId,
    ) -> BoxFuture<'_, ChunkupResult<SessionStatus>> {
        let sessions = self.sessions.lock().unwrap();
        let result = match sessions.get(session_id) {
            Some(s) => Ok(SessionStatus {
                session_id: session_id.clone(),
                name: s.param.name.clone(),
                size: s.param.size,
                chunk_size: s.param.chunk_size,
                chunk_count: s.param.chunk_count,
                received: s
                    .reported
                    .clone()
                    .unwrap_or_else(|| to_ranges(s.received.iter().copied())),
            }),
            None => Err(ChunkupError::Session("unknown session".into())),
        };
        futures::future::ready(result).boxed()
    }

    fn send_chunk(
        &self,
        session_id: &SessionId,
        chunk: &ChunkDescriptor,
        data: Vec<u8>,
    ) -> BoxFuture<'_, ChunkResult> {
        let session_id = session_id.clone();
        let chunk = *chunk;

        async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            *self.attempts.lock().unwrap().entry(chunk.index).or_insert(0) += 1;

            let delay = *self.delay.lock().unwrap();
            if delay > Duration::from_secs(0) {
                tokio::time::sleep(delay).await;
            }

            let fault = {
                let mut faults = self.faults.lock().unwrap();
                match faults.get_mut(&chunk.index) {
                    Some(fault) if fault.remaining > 0 => {
                        fault.remaining -= 1;
                        Some(fault.retryable)
                    }
                    _ => None,
                }
            };

            let result = match fault {
                Some(retryable) => ChunkResult::failure("injected failure", retryable),
                None if data.len() as u64 != chunk.length => {
                    ChunkResult::failure("length mismatch", false)
                }
                None => {
                    let mut sessions = self.sessions.lock().unwrap();
                    match sessions.get_mut(&session_id) {
                        Some(s) => {
                            s.received.insert(chunk.index);
                            ChunkResult::Success
                        }
                        None => ChunkResult::failure("unknown session", false),
                    }
                }
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
        .boxed()
    }

    fn finalize(&self, session_id: &SessionId) -> BoxFuture<'_, ChunkupResult<FileId>> {
        self.finalize_calls.fetch_add(1, Ordering::SeqCst);

        let sessions = self.sessions.lock().unwrap();
        let result = match sessions.get(session_id) {
            Some(s) if s.received.len() == s.param.chunk_count => {
                Ok(FileId(format!("file-{}", session_id)))
            }
            Some(s) => Err(ChunkupError::IncompleteUpload {
                missing: s.param.chunk_count - s.received.len(),
            }),
            None => Err(ChunkupError::Session("unknown session".into())),
        };
        futures::future::ready(result).boxed()
    }
}
