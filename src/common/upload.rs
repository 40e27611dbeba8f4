use crate::common::event::progress_channel;
use crate::{
    plan, ChunkDescriptor, ChunkSource, ChunkupError, ChunkupResult, Emitter, Event, FileId,
    HttpTransport, Progress, Scheduler, SessionId, SessionParam, Transport, UploadOptions,
    UploadSession,
};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Public entry point: plans the chunks, opens or resumes a session, drives
/// the scheduler and finalizes.
///
/// A failed or cancelled upload leaves its session open on the server so it
/// can be picked up again with [`UploadOrchestrator::resume`].
pub struct UploadOrchestrator {
    transport: Arc<dyn Transport>,
    options: UploadOptions,
    emitter: Emitter,
    cancel: CancellationToken,
}

impl UploadOrchestrator {
    pub fn new(base_url: impl AsRef<str>, options: UploadOptions) -> ChunkupResult<Self> {
        options.validate()?;
        let transport = HttpTransport::new(base_url, options.timeout)?;
        Ok(Self::with_transport(Arc::new(transport), options))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, options: UploadOptions) -> Self {
        Self {
            transport,
            options,
            emitter: Emitter::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Starts reporting events to the returned stream. A previous stream stops
    /// receiving events.
    pub fn progress(&mut self) -> Progress {
        let (emitter, progress) = progress_channel();
        self.emitter = emitter;
        progress
    }

    /// Token that aborts the running upload.
    ///
    /// Cancellation is permanent: once cancelled, every later `upload` or
    /// `resume` on this orchestrator fails with [`ChunkupError::Cancelled`]
    /// before contacting the server. Build a new orchestrator to continue.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    pub async fn upload<S>(
        &self,
        source: S,
        chunk_size: u64,
        parallel: usize,
    ) -> ChunkupResult<FileId>
    where
        S: ChunkSource + 'static,
    {
        self.check_run(parallel)?;

        let chunks = plan(source.len(), chunk_size)?;

        let param = SessionParam {
            name: source.name().to_owned(),
            size: source.len(),
            chunk_size,
            chunk_count: chunks.len(),
        };

        let mut session = UploadSession::open(self.transport.as_ref(), &param).await?;

        self.emitter.emit(Event::SessionOpened {
            session_id: session.id().clone(),
            total_chunks: session.total_chunks(),
            acknowledged: 0,
        });

        self.drive(&mut session, &chunks, Arc::new(source), parallel).await
    }

    /// Continues `session_id`, sending only the chunks the server lacks.
    pub async fn resume<S>(
        &self,
        session_id: SessionId,
        source: S,
        parallel: usize,
    ) -> ChunkupResult<FileId>
    where
        S: ChunkSource + 'static,
    {
        self.check_run(parallel)?;

        let (mut session, status) =
            UploadSession::resume(self.transport.as_ref(), session_id).await?;

        if status.size != source.len() {
            return Err(ChunkupError::invalid(format!(
                "file size mismatch: (expected: {}, actual: {})",
                status.size,
                source.len()
            )));
        }

        let chunks = plan(status.size, status.chunk_size)?;

        if chunks.len() != status.chunk_count {
            return Err(ChunkupError::Session(format!(
                "session {} declares {} chunks but {} bytes in {} byte chunks make {}",
                session.id(),
                status.chunk_count,
                status.size,
                status.chunk_size,
                chunks.len()
            )));
        }

        self.emitter.emit(Event::SessionOpened {
            session_id: session.id().clone(),
            total_chunks: session.total_chunks(),
            acknowledged: session.acknowledged(),
        });

        self.drive(&mut session, &chunks, Arc::new(source), parallel).await
    }

    fn check_run(&self, parallel: usize) -> ChunkupResult<()> {
        if parallel == 0 {
            return Err(ChunkupError::invalid("parallel must be positive"));
        }
        self.options.validate()?;
        if self.cancel.is_cancelled() {
            return Err(ChunkupError::Cancelled);
        }
        Ok(())
    }

    async fn drive(
        &self,
        session: &mut UploadSession,
        chunks: &[ChunkDescriptor],
        source: Arc<dyn ChunkSource>,
        parallel: usize,
    ) -> ChunkupResult<FileId> {
        let start = Instant::now();

        let scheduler = Scheduler::new(
            self.transport.clone(),
            self.options.clone(),
            self.emitter.clone(),
            self.cancel.clone(),
        );

        scheduler.run(chunks, parallel, source, session).await?;

        let file_id = session.finalize(self.transport.as_ref()).await?;

        info!(
            "session {} finalized as {}, {} chunks, time: {}ms",
            session.id(),
            file_id,
            session.total_chunks(),
            start.elapsed().as_millis()
        );

        self.emitter.emit(Event::Finalized {
            session_id: session.id().clone(),
            file_id: file_id.clone(),
        });

        Ok(file_id)
    }
}
