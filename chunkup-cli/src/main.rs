use chunkup::{ChunkupResult, Event, FileSource, SessionId, UploadOptions, UploadOrchestrator};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;
use url::Url;

#[macro_use]
extern crate log;

/// Uploads a file in chunks, several at a time
#[derive(Debug, Clone, StructOpt)]
#[structopt(name = "chunkup-cli")]
struct Opts {
    /// Base url of the upload service
    #[structopt(short, long)]
    base_url: Url,

    /// Number of chunks in flight, defaults to the number of cpus
    #[structopt(short, long)]
    parallel: Option<usize>,

    /// Chunk size in bytes
    #[structopt(short, long, default_value = "4194304")]
    chunk_size: u64,

    /// File to upload
    #[structopt(short, long, parse(from_os_str))]
    file: PathBuf,

    /// Request timeout in seconds
    #[structopt(short, long, default_value = "20")]
    timeout: u64,

    /// Transmissions allowed per chunk before giving up
    #[structopt(short, long, default_value = "3")]
    attempts: u32,

    /// Continue an interrupted upload instead of opening a new session
    #[structopt(short, long)]
    resume: Option<String>,
}

#[tokio::main]
async fn main() -> ChunkupResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Opts {
        base_url,
        parallel,
        chunk_size,
        file,
        timeout,
        attempts,
        resume,
    } = Opts::from_args();

    let parallel = parallel.unwrap_or_else(num_cpus::get);

    let options = UploadOptions {
        timeout: Duration::from_secs(timeout),
        max_attempts: attempts,
        ..Default::default()
    };

    let mut orchestrator = UploadOrchestrator::new(base_url, options)?;

    let mut progress = orchestrator.progress();
    tokio::spawn(async move {
        while let Some(event) = progress.next().await {
            match event {
                Event::SessionOpened {
                    session_id,
                    total_chunks,
                    acknowledged,
                } => info!(
                    "session {}: {}/{} chunks already uploaded",
                    session_id, acknowledged, total_chunks
                ),
                Event::ChunkUploaded {
                    index,
                    length,
                    acknowledged,
                    total_chunks,
                } => info!(
                    "chunk {} ({} bytes) uploaded, {}/{}",
                    index, length, acknowledged, total_chunks
                ),
                Event::ChunkRetrying {
                    index,
                    attempt,
                    reason,
                } => warn!("chunk {} attempt {} failed: {}", index, attempt, reason),
                Event::Finalized { .. } => {}
            }
        }
    });

    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling upload");
            cancel.cancel();
        }
    });

    let source = FileSource::open(&file).await?;

    let result = match resume {
        Some(session_id) => {
            orchestrator
                .resume(SessionId::from(session_id), source, parallel)
                .await
        }
        None => orchestrator.upload(source, chunk_size, parallel).await,
    };

    match result {
        Ok(file_id) => {
            println!("File {} uploaded.(id: {})", file.display(), file_id);
            Ok(())
        }
        Err(e) => {
            error!(
                "failed to upload {}: {} (pass --resume with the session id to continue)",
                file.display(),
                e
            );
            Err(e)
        }
    }
}
