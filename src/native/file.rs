use crate::{ChunkDescriptor, ChunkSource, ChunkupError, ChunkupResult};
use futures::future::{BoxFuture, FutureExt};
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// A local file read with positional reads on the blocking pool.
#[derive(Debug, Clone)]
pub struct FileSource {
    name: String,
    file: Arc<File>,
    size: u64,
}

impl FileSource {
    pub async fn open<P: AsRef<Path>>(path: P) -> ChunkupResult<Self> {
        let path = path.as_ref();

        let file = tokio::fs::File::open(path).await?;

        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(ChunkupError::invalid(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_owned();

        Ok(Self {
            name,
            file: Arc::new(file.into_std().await),
            size: meta.len(),
        })
    }
}

impl ChunkSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> u64 {
        self.size
    }

    fn read_chunk(&self, chunk: &ChunkDescriptor) -> BoxFuture<'_, ChunkupResult<Vec<u8>>> {
        let file = self.file.clone();
        let chunk = *chunk;

        async move {
            let data = tokio::task::spawn_blocking(move || {
                let mut data = vec![0; chunk.length as usize];
                read_exact_at(&file, &mut data, chunk.offset).map(|_| data)
            })
            .await
            .map_err(|e| ChunkupError::Other(format!("read task failed: {}", e)))??;

            Ok(data)
        }
        .boxed()
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;

    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                let rest = buf;
                buf = &mut rest[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    Ok(())
}
