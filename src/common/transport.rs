use crate::common::{PART_NAME, SESSION_ROUTE};
use crate::{
    ChunkDescriptor, ChunkupError, ChunkupResult, ErrorBody, ErrorDetail, FileId, Finalized,
    SessionId, SessionOpened, SessionParam, SessionStatus,
};
use futures::future::{BoxFuture, FutureExt};
use reqwest::{Response, StatusCode, Url};
use std::ops::Range;
use std::time::Duration;

/// Outcome of a single chunk transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkResult {
    Success,
    Failure { reason: String, retryable: bool },
}

impl ChunkResult {
    pub fn failure(reason: impl Into<String>, retryable: bool) -> Self {
        Self::Failure {
            reason: reason.into(),
            retryable,
        }
    }
}

impl From<ChunkResult> for ChunkupResult<()> {
    fn from(result: ChunkResult) -> Self {
        match result {
            ChunkResult::Success => Ok(()),
            ChunkResult::Failure { reason, retryable } => {
                Err(ChunkupError::Transport { reason, retryable })
            }
        }
    }
}

/// Everything the orchestrator needs from the server.
///
/// Implementations must tolerate concurrent `send_chunk` calls for
/// different chunks of the same session.
pub trait Transport: Send + Sync {
    fn open_session(&self, param: &SessionParam) -> BoxFuture<'_, ChunkupResult<SessionId>>;

    fn session_status(&self, session_id: &SessionId)
        -> BoxFuture<'_, ChunkupResult<SessionStatus>>;

    fn send_chunk(
        &self,
        session_id: &SessionId,
        chunk: &ChunkDescriptor,
        data: Vec<u8>,
    ) -> BoxFuture<'_, ChunkResult>;

    fn finalize(&self, session_id: &SessionId) -> BoxFuture<'_, ChunkupResult<FileId>>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> ChunkupResult<Self> {
        let base_url = Url::parse(base_url.as_ref())?;

        if base_url.cannot_be_a_base() || !base_url.has_host() {
            return Err(ChunkupError::invalid(format!(
                "{} cannot be used as a base url",
                base_url
            )));
        }

        Ok(Self {
            client: reqwest::ClientBuilder::new().timeout(timeout).build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> ChunkupResult<Url> {
        let mut url = self.base_url.clone();

        url.path_segments_mut()
            .map_err(|_| ChunkupError::invalid(format!("{} cannot be a base url", self.base_url)))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }
}

impl Transport for HttpTransport {
    fn open_session(&self, param: &SessionParam) -> BoxFuture<'_, ChunkupResult<SessionId>> {
        let param = param.clone();

        async move {
            let url = self.endpoint(&[SESSION_ROUTE])?;

            let resp = self.client.post(url).json(&param).send().await?;

            if !resp.status().is_success() {
                return Err(ChunkupError::Session(error_reason(resp).await));
            }

            let opened: SessionOpened = resp.json().await?;

            Ok(opened.session_id)
        }
        .boxed()
    }

    fn session_status(
        &self,
        session_id: &SessionId,
    ) -> BoxFuture<'_, ChunkupResult<SessionStatus>> {
        let session_id = session_id.clone();

        async move {
            let url = self.endpoint(&[SESSION_ROUTE, session_id.as_str()])?;

            let resp = self.client.get(url).send().await?;

            if !resp.status().is_success() {
                return Err(ChunkupError::Session(format!(
                    "cannot query session {}: {}",
                    session_id,
                    error_reason(resp).await
                )));
            }

            Ok(resp.json().await?)
        }
        .boxed()
    }

    fn send_chunk(
        &self,
        session_id: &SessionId,
        chunk: &ChunkDescriptor,
        data: Vec<u8>,
    ) -> BoxFuture<'_, ChunkResult> {
        use reqwest::multipart::*;

        let chunk = *chunk;
        let url = self.endpoint(&[
            SESSION_ROUTE,
            session_id.as_str(),
            "chunks",
            &chunk.index.to_string(),
        ]);
        let file_name = format!("{}.part{}", session_id, chunk.index);

        async move {
            let url = match url {
                Ok(url) => url,
                Err(e) => return ChunkResult::failure(e.to_string(), false),
            };

            if data.len() as u64 != chunk.length {
                return ChunkResult::failure(
                    format!(
                        "read {} bytes for chunk {}, expected {}",
                        data.len(),
                        chunk.index,
                        chunk.length
                    ),
                    false,
                );
            }

            let digest = format!("{:x}", md5::compute(&data));

            let form = Form::new()
                .part(PART_NAME, Part::bytes(data).file_name(file_name))
                .text("offset", chunk.offset.to_string())
                .text("length", chunk.length.to_string())
                .text("md5", digest);

            match self.client.put(url).multipart(form).send().await {
                Ok(resp) if resp.status().is_success() => ChunkResult::Success,
                Ok(resp) => {
                    let retryable = is_retryable_status(resp.status());
                    ChunkResult::failure(error_reason(resp).await, retryable)
                }
                Err(e) => {
                    let retryable = is_retryable_error(&e);
                    ChunkResult::failure(e.to_string(), retryable)
                }
            }
        }
        .boxed()
    }

    fn finalize(&self, session_id: &SessionId) -> BoxFuture<'_, ChunkupResult<FileId>> {
        let session_id = session_id.clone();

        async move {
            let url = self.endpoint(&[SESSION_ROUTE, session_id.as_str(), "finalize"])?;

            let resp = self.client.post(url).send().await?;
            let status = resp.status();

            if status.is_success() {
                let finalized: Finalized = resp.json().await?;
                return Ok(finalized.file_id);
            }

            if status == StatusCode::CONFLICT {
                let body = resp.text().await?;
                if let Ok(ErrorBody {
                    error: ErrorDetail::Incomplete { missing },
                }) = serde_json::from_str::<ErrorBody>(&body)
                {
                    return Err(ChunkupError::IncompleteUpload {
                        missing: count_ranges(&missing),
                    });
                }
                return Err(ChunkupError::Session(format!("{}: {}", status, body)));
            }

            Err(ChunkupError::Session(format!(
                "cannot finalize session {}: {}",
                session_id,
                error_reason(resp).await
            )))
        }
        .boxed()
    }
}

/// Server-side hiccups are worth another try, protocol rejections are not.
pub(crate) fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

pub(crate) fn is_retryable_error(e: &reqwest::Error) -> bool {
    !e.is_builder()
}

fn count_ranges(ranges: &[Range<usize>]) -> usize {
    ranges.iter().fold(0usize, |n, r| {
        n.saturating_add(r.end.saturating_sub(r.start))
    })
}

async fn error_reason(resp: Response) -> String {
    let status = resp.status();

    match resp.text().await {
        Ok(body) => match serde_json::from_str::<ErrorBody>(&body) {
            Ok(ErrorBody { error }) => format!("{}: {}", status, error),
            Err(_) if body.is_empty() => status.to_string(),
            Err(_) => format!("{}: {}", status, body),
        },
        Err(e) => format!("{}: {}", status, e),
    }
}
