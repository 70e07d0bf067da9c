//! Blob storage over `object_store`.
//!
//! Exported datasets and downloaded watchlist deltas live here. Writes are
//! streamed through [`object_store::buffered::BufWriter`], so no file is ever
//! held in memory whole.

use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt, TryStreamExt};
use object_store::buffered::BufWriter;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{GetOptions, GetRange, ObjectStore, PutPayload};
use tokio::io::AsyncWriteExt;

use crate::error::DatasetError;

/// Byte stream read back from the store.
pub type BlobStream = BoxStream<'static, Result<Bytes, DatasetError>>;

/// Shared handle on the blob store.
#[derive(Debug, Clone)]
pub struct BlobStore {
    inner: Arc<dyn ObjectStore>,
}

impl BlobStore {
    /// Store rooted at a local directory, created if missing.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Io`] if the directory cannot be created, or
    /// [`DatasetError::Store`] if it cannot be opened.
    pub fn local(root: impl AsRef<Path>) -> Result<Self, DatasetError> {
        std::fs::create_dir_all(root.as_ref())?;
        let fs = LocalFileSystem::new_with_prefix(root.as_ref())?;
        Ok(Self::from_store(Arc::new(fs)))
    }

    /// Fresh in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemory::new()))
    }

    #[must_use]
    pub fn from_store(inner: Arc<dyn ObjectStore>) -> Self {
        Self { inner }
    }

    /// Streaming writer; the object appears once the writer is shut down.
    #[must_use]
    pub fn writer(&self, path: &str) -> BufWriter {
        BufWriter::new(Arc::clone(&self.inner), ObjectPath::from(path))
    }

    /// # Errors
    ///
    /// Returns [`DatasetError::Store`] if the write fails.
    pub async fn put(&self, path: &str, bytes: impl Into<Bytes>) -> Result<(), DatasetError> {
        self.inner
            .put(&ObjectPath::from(path), PutPayload::from(bytes.into()))
            .await?;
        Ok(())
    }

    /// Whole object.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Store`] (`NotFound` for a missing path).
    pub async fn read(&self, path: &str) -> Result<Bytes, DatasetError> {
        Ok(self.inner.get(&ObjectPath::from(path)).await?.bytes().await?)
    }

    /// Object size in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Store`] (`NotFound` for a missing path).
    pub async fn size(&self, path: &str) -> Result<u64, DatasetError> {
        Ok(self.inner.head(&ObjectPath::from(path)).await?.size)
    }

    /// Stream the object starting at byte `offset`.
    ///
    /// An offset at or past the end yields an empty stream.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Store`] (`NotFound` for a missing path).
    pub async fn open(&self, path: &str, offset: u64) -> Result<BlobStream, DatasetError> {
        let location = ObjectPath::from(path);
        let size = self.inner.head(&location).await?.size;
        if offset >= size {
            return Ok(stream::empty().boxed());
        }
        let options = GetOptions {
            range: (offset > 0).then_some(GetRange::Offset(offset)),
            ..GetOptions::default()
        };
        let result = self.inner.get_opts(&location, options).await?;
        Ok(result.into_stream().map_err(DatasetError::from).boxed())
    }

    /// Copy a byte stream into `path`, returning the number of non-blank
    /// newline-delimited records seen on the way.
    ///
    /// A failing source aborts the upload; nothing is left at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Source`] if the source stream fails, or a store
    /// error if the upload fails.
    pub async fn put_stream<S, E>(&self, path: &str, source: S) -> Result<u64, DatasetError>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: Display,
    {
        let mut writer = self.writer(path);
        let mut counter = LineCounter::default();
        let mut source = std::pin::pin!(source);

        while let Some(chunk) = source.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let _ = writer.abort().await;
                    return Err(DatasetError::Source(e.to_string()));
                }
            };
            counter.feed(&chunk);
            if let Err(e) = writer.write_all(&chunk).await {
                let _ = writer.abort().await;
                return Err(e.into());
            }
        }
        writer.shutdown().await?;
        Ok(counter.finish())
    }
}

/// Counts lines holding at least one non-whitespace byte, across chunk
/// boundaries.
#[derive(Debug, Default)]
struct LineCounter {
    complete: u64,
    open_line_has_content: bool,
}

impl LineCounter {
    fn feed(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            if byte == b'\n' {
                if self.open_line_has_content {
                    self.complete += 1;
                }
                self.open_line_has_content = false;
            } else if !byte.is_ascii_whitespace() {
                self.open_line_has_content = true;
            }
        }
    }

    const fn finish(self) -> u64 {
        if self.open_line_has_content {
            self.complete + 1
        } else {
            self.complete
        }
    }
}
