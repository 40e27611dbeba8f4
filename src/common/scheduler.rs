use crate::{
    ChunkDescriptor, ChunkResult, ChunkSource, ChunkupError, ChunkupResult, Emitter, Event,
    SessionId, Transport, UploadOptions, UploadSession,
};
use futures::{SinkExt, StreamExt};
use futures_channel::{mpsc, oneshot};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
struct WorkItem {
    chunk: ChunkDescriptor,
    attempt: u32,
}

enum Message {
    /// A worker is idle and wants its next chunk, `None` tells it to stop.
    Ready(oneshot::Sender<Option<WorkItem>>),
    Done { item: WorkItem, result: ChunkResult },
}

/// Drives chunk transmissions through a fixed pool of workers.
///
/// The scheduler loop is the only owner of the session; workers report
/// completions over a channel, so acknowledgements are applied one at a time.
pub struct Scheduler {
    transport: Arc<dyn Transport>,
    options: UploadOptions,
    emitter: Emitter,
    cancel: CancellationToken,
}

struct Dispatch {
    queue: VecDeque<WorkItem>,
    parked: Vec<oneshot::Sender<Option<WorkItem>>>,
    in_flight: usize,
    failure: Option<ChunkupError>,
}

impl Dispatch {
    fn finished(&self) -> bool {
        self.failure.is_some() || (self.queue.is_empty() && self.in_flight == 0)
    }

    /// Hands `reply` the next chunk, parks it, or stops it.
    fn serve(&mut self, reply: oneshot::Sender<Option<WorkItem>>) {
        if self.finished() {
            let _ = reply.send(None);
            return;
        }

        match self.queue.pop_front() {
            Some(item) => match reply.send(Some(item)) {
                Ok(()) => self.in_flight += 1,
                // worker went away, keep the chunk for someone else
                Err(Some(item)) => self.queue.push_front(item),
                Err(None) => {}
            },
            None => self.parked.push(reply),
        }
    }

    fn serve_parked(&mut self) {
        let parked = std::mem::take(&mut self.parked);
        for reply in parked {
            self.serve(reply);
        }
    }

    fn fail(&mut self, error: ChunkupError) {
        if self.failure.is_none() {
            self.failure = Some(error);
        }
        self.queue.clear();
        self.serve_parked();
    }
}

impl Scheduler {
    pub fn new(
        transport: Arc<dyn Transport>,
        options: UploadOptions,
        emitter: Emitter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            options,
            emitter,
            cancel,
        }
    }

    /// Sends every chunk the session has not acknowledged yet.
    ///
    /// At most `concurrency_limit` transmissions are in flight. Retryable
    /// failures are re-queued until `max_attempts` is reached; the first
    /// terminal failure stops dispatching, waits for in-flight chunks and
    /// fails the run with [`ChunkupError::Upload`].
    pub async fn run(
        &self,
        chunks: &[ChunkDescriptor],
        concurrency_limit: usize,
        source: Arc<dyn ChunkSource>,
        session: &mut UploadSession,
    ) -> ChunkupResult<()> {
        if concurrency_limit == 0 {
            return Err(ChunkupError::invalid("concurrency limit must be positive"));
        }

        let mut dispatch = Dispatch {
            queue: chunks
                .iter()
                .filter(|c| !session.is_acknowledged(c.index))
                .map(|&chunk| WorkItem { chunk, attempt: 0 })
                .collect(),
            parked: Vec::new(),
            in_flight: 0,
            failure: None,
        };

        if dispatch.queue.is_empty() {
            return Ok(());
        }

        let workers = concurrency_limit.min(dispatch.queue.len());
        debug!(
            "session {}: {} chunks pending, {} workers",
            session.id(),
            dispatch.queue.len(),
            workers
        );

        let (sender, mut receiver) = mpsc::channel(workers);

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let worker = Worker {
                transport: self.transport.clone(),
                source: source.clone(),
                session_id: session.id().clone(),
                options: self.options.clone(),
                cancel: self.cancel.clone(),
            };
            handles.push(tokio::spawn(worker.run(sender.clone())));
        }
        drop(sender);

        loop {
            let message = tokio::select! {
                message = receiver.next() => match message {
                    Some(message) => message,
                    // every worker has exited
                    None => break,
                },
                _ = self.cancel.cancelled(), if dispatch.failure.is_none() => {
                    warn!("session {}: upload cancelled", session.id());
                    dispatch.fail(ChunkupError::Cancelled);
                    continue;
                }
            };

            match message {
                Message::Ready(reply) => dispatch.serve(reply),
                Message::Done { item, result } => {
                    dispatch.in_flight -= 1;
                    self.complete(&mut dispatch, session, item, result);
                    dispatch.serve_parked();
                }
            }
        }

        for result in futures::future::join_all(handles).await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("worker stopped: {}", e),
                Err(e) => warn!("worker panicked: {}", e),
            }
        }

        match dispatch.failure {
            Some(e) => Err(e),
            None if session.is_complete() => Ok(()),
            None => Err(ChunkupError::IncompleteUpload {
                missing: session.total_chunks() - session.acknowledged(),
            }),
        }
    }

    fn complete(
        &self,
        dispatch: &mut Dispatch,
        session: &mut UploadSession,
        item: WorkItem,
        result: ChunkResult,
    ) {
        let index = item.chunk.index;

        match result {
            ChunkResult::Success => {
                session.acknowledge(index);
                debug!(
                    "{}.part{} ({} bytes) uploaded, {}/{}",
                    session.id(),
                    index,
                    item.chunk.length,
                    session.acknowledged(),
                    session.total_chunks()
                );
                self.emitter.emit(Event::ChunkUploaded {
                    index,
                    length: item.chunk.length,
                    acknowledged: session.acknowledged(),
                    total_chunks: session.total_chunks(),
                });
            }
            ChunkResult::Failure { .. } if dispatch.failure.is_some() => {
                debug!("{}.part{} failed while aborting", session.id(), index);
            }
            ChunkResult::Failure { reason, retryable } => {
                let attempt = item.attempt + 1;

                if retryable && attempt < self.options.max_attempts {
                    warn!(
                        "{}.part{} failed (attempt {}/{}), retrying: {}",
                        session.id(),
                        index,
                        attempt,
                        self.options.max_attempts,
                        reason
                    );
                    self.emitter.emit(Event::ChunkRetrying {
                        index,
                        attempt,
                        reason,
                    });
                    dispatch.queue.push_back(WorkItem {
                        chunk: item.chunk,
                        attempt,
                    });
                    return;
                }

                let reason = if retryable {
                    format!("gave up after {} attempts: {}", attempt, reason)
                } else {
                    reason
                };

                error!("{}.part{} failed: {}", session.id(), index, reason);
                dispatch.fail(ChunkupError::Upload { index, reason });
            }
        }
    }
}

struct Worker {
    transport: Arc<dyn Transport>,
    source: Arc<dyn ChunkSource>,
    session_id: SessionId,
    options: UploadOptions,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self, mut sender: mpsc::Sender<Message>) -> ChunkupResult<()> {
        loop {
            let (os, or) = oneshot::channel();

            sender.send(Message::Ready(os)).await?;

            let item = match or.await? {
                None => break,
                Some(item) => item,
            };

            let result = tokio::select! {
                result = self.transmit(item) => result,
                _ = self.cancel.cancelled() => break,
            };

            sender.send(Message::Done { item, result }).await?;
        }

        Ok(())
    }

    async fn transmit(&self, item: WorkItem) -> ChunkResult {
        let backoff = self.options.backoff_for(item.attempt);
        if backoff > std::time::Duration::from_secs(0) {
            tokio::time::sleep(backoff).await;
        }

        match self.source.read_chunk(&item.chunk).await {
            Ok(data) => {
                self.transport
                    .send_chunk(&self.session_id, &item.chunk, data)
                    .await
            }
            Err(e) => ChunkResult::failure(
                format!("cannot read chunk {}: {}", item.chunk.index, e),
                false,
            ),
        }
    }
}
