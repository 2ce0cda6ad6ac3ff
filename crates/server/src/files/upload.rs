//! Resumable chunked uploads.
//!
//! A client sends a file as a sequence of fixed-size chunks, one request per
//! chunk. No upload state is kept between requests: on every request the
//! coordinator infers where the client stands by comparing the size of the
//! partial file on disk with the position of the incoming chunk, then either
//! appends the chunk, tells the client which chunk to resume from, or
//! restarts the upload.
//!
//! Requests for the same target file are serialized by a per-path lock so
//! two retries of the same chunk cannot both append.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use dashmap::DashMap;
use protocol::chunking::{check_chunk_len, chunk_offset, total_chunks, CHUNK_SIZE};
use protocol::messages::UploadReply;
use protocol::ProtocolError;
use thiserror::Error;
use tracing::{debug, info};

use super::sandbox::{secure_filename, PathSandbox};

/// Errors that can occur while handling an upload chunk.
#[derive(Debug, Error)]
pub enum UploadError {
    /// A request field is missing or malformed.
    #[error("{0}")]
    InvalidInput(&'static str),

    /// The payload length does not fit the chunk position.
    #[error("chunk is likely corrupted: {0}")]
    Corrupted(#[from] ProtocolError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw upload fields as they arrive from the client.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    /// Destination folder relative to the share root.
    pub folder: Option<String>,
    /// Original name of the uploaded file.
    pub filename: Option<String>,
    /// Chunk payload. `None` when no file part was sent.
    pub payload: Option<Bytes>,
    /// Zero-based chunk index.
    pub chunk: Option<String>,
    /// Declared total size of the file.
    pub file_size: Option<String>,
    /// `"true"` to resume rather than restart.
    pub resume: Option<String>,
}

impl UploadForm {
    /// Check every field and produce a typed request.
    ///
    /// Touches nothing on disk.
    pub fn validate(self) -> Result<ChunkRequest, UploadError> {
        let folder = self.folder.unwrap_or_default();

        let Some(payload) = self.payload else {
            return Err(UploadError::InvalidInput("No file part"));
        };

        let filename = secure_filename(self.filename.as_deref().unwrap_or_default());
        if filename.is_empty() {
            return Err(UploadError::InvalidInput("Invalid file name"));
        }

        if payload.is_empty() {
            return Err(UploadError::InvalidInput("Empty file"));
        }

        let chunk_index = self
            .chunk
            .as_deref()
            .and_then(|c| c.trim().parse::<u64>().ok())
            .ok_or(UploadError::InvalidInput("Invalid chunk index"))?;

        let file_size = self
            .file_size
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or(UploadError::InvalidInput("Invalid file size"))?;
        if file_size <= 0 {
            return Err(UploadError::InvalidInput("Empty file"));
        }

        Ok(ChunkRequest {
            folder,
            filename,
            chunk_index,
            file_size: file_size as u64,
            payload,
            resume: self.resume.as_deref() == Some("true"),
        })
    }
}

/// A validated upload chunk.
#[derive(Debug, Clone)]
pub struct ChunkRequest {
    /// Destination folder, still untrusted.
    pub folder: String,
    /// Sanitized file name, never empty.
    pub filename: String,
    /// Zero-based chunk index.
    pub chunk_index: u64,
    /// Declared total size, always positive.
    pub file_size: u64,
    /// Non-empty chunk payload.
    pub payload: Bytes,
    /// Resume from what is on disk instead of restarting.
    pub resume: bool,
}

/// What happened to a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The final chunk was appended.
    Success,
    /// An intermediate chunk was appended.
    Continue,
    /// The file on disk is already complete; nothing written.
    AlreadyUploaded,
    /// Nothing written; the client should continue from `chunk`.
    Resume { chunk: u64 },
}

impl From<UploadOutcome> for UploadReply {
    fn from(outcome: UploadOutcome) -> Self {
        match outcome {
            UploadOutcome::Success => UploadReply::success(),
            UploadOutcome::Continue => UploadReply::continue_upload(),
            UploadOutcome::AlreadyUploaded => UploadReply::already_uploaded(),
            UploadOutcome::Resume { chunk } => UploadReply::resume(chunk),
        }
    }
}

/// Table of per-path mutexes.
///
/// Entries are created on demand and removed once no request holds or waits
/// for them, so the table only ever holds paths with uploads in flight.
#[derive(Debug, Default)]
pub struct PathLocks {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl PathLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `path`.
    ///
    /// A lock left poisoned by a panicking holder is taken over; the next
    /// request re-reads the file size from disk anyway.
    pub fn with_lock<T>(&self, path: &Path, f: impl FnOnce() -> T) -> T {
        let lock = self.locks.entry(path.to_path_buf()).or_default().clone();

        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        drop(lock);
        self.locks
            .remove_if(path, |_, lock| Arc::strong_count(lock) == 1);

        result
    }

    /// Number of paths currently in the table.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no path is currently locked.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Reassembles uploaded files from their chunks.
#[derive(Debug)]
pub struct ChunkedUploadCoordinator {
    sandbox: PathSandbox,
    chunk_size: u64,
    locks: PathLocks,
}

impl ChunkedUploadCoordinator {
    /// Create a coordinator writing below `root` with the standard chunk size.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_chunk_size(root, CHUNK_SIZE)
    }

    /// Create a coordinator with a custom chunk size.
    pub fn with_chunk_size(root: impl Into<PathBuf>, chunk_size: u64) -> Self {
        Self {
            sandbox: PathSandbox::new(root),
            chunk_size,
            locks: PathLocks::new(),
        }
    }

    /// The chunk size in use.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// The lock table, exposed for inspection.
    pub fn locks(&self) -> &PathLocks {
        &self.locks
    }

    /// Where the chunks of `request` are written.
    pub fn target_path(&self, request: &ChunkRequest) -> PathBuf {
        self.sandbox.resolve(&request.folder).join(&request.filename)
    }

    /// Process one chunk.
    ///
    /// The payload length is checked before anything on disk is touched.
    /// The rest runs under the target's lock.
    pub fn handle(&self, request: &ChunkRequest) -> Result<UploadOutcome, UploadError> {
        check_chunk_len(
            request.file_size,
            self.chunk_size,
            request.chunk_index,
            request.payload.len() as u64,
        )?;

        let folder = self.sandbox.resolve(&request.folder);
        let target = folder.join(&request.filename);

        self.locks
            .with_lock(&target, || self.write_chunk(&folder, &target, request))
    }

    fn write_chunk(
        &self,
        folder: &Path,
        target: &Path,
        request: &ChunkRequest,
    ) -> Result<UploadOutcome, UploadError> {
        fs::create_dir_all(folder)?;

        let mut truncate_to = None;
        match fs::metadata(target) {
            Ok(metadata) => {
                let on_disk = metadata.len();

                if on_disk == request.file_size && request.resume {
                    debug!(path = %target.display(), "file already uploaded");
                    return Ok(UploadOutcome::AlreadyUploaded);
                }

                let offset = chunk_offset(self.chunk_size, request.chunk_index);
                if on_disk > offset {
                    if !request.resume {
                        info!(path = %target.display(), "restarting upload from scratch");
                        fs::remove_file(target)?;
                        return Ok(UploadOutcome::Resume { chunk: 0 });
                    }

                    let resume_chunk = on_disk / self.chunk_size;
                    let torn = on_disk % self.chunk_size != 0;
                    if !(torn && request.chunk_index == resume_chunk) {
                        debug!(
                            path = %target.display(),
                            chunk = request.chunk_index,
                            resume_chunk,
                            "skipping chunk already on disk"
                        );
                        return Ok(UploadOutcome::Resume {
                            chunk: resume_chunk,
                        });
                    }

                    // A partial chunk from an interrupted write; replace it.
                    debug!(path = %target.display(), from = on_disk, to = offset, "truncating torn chunk");
                    truncate_to = Some(offset);
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut file = OpenOptions::new().append(true).create(true).open(target)?;
        if let Some(len) = truncate_to {
            file.set_len(len)?;
        }
        file.write_all(&request.payload)?;

        if request.chunk_index + 1 == total_chunks(request.file_size, self.chunk_size) {
            info!(path = %target.display(), size = request.file_size, "upload complete");
            Ok(UploadOutcome::Success)
        } else {
            Ok(UploadOutcome::Continue)
        }
    }
}
