mod file;

pub use file::FileSource;

use crate::{ChunkupResult, FileId, UploadOptions, UploadOrchestrator};
use std::path::Path;

/// Uploads the file at `path` with default options.
pub async fn upload(
    base_url: impl AsRef<str>,
    path: impl AsRef<Path>,
    chunk_size: u64,
    parallel: usize,
) -> ChunkupResult<FileId> {
    let source = FileSource::open(path).await?;

    UploadOrchestrator::new(base_url, UploadOptions::default())?
        .upload(source, chunk_size, parallel)
        .await
}
