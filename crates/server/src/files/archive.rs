//! On-the-fly zip archives.
//!
//! Archives are never staged on disk or in memory. A blocking worker writes
//! the zip into a [`ChannelWriter`] that hands fixed-size pieces to a bounded
//! channel; the async side turns the receiving end into a body stream. When
//! the channel is full the worker blocks, so memory use depends on the
//! buffer size and channel depth only, never on the archive size.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::stream::{self, Stream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::result::ZipError;
use zip::{CompressionMethod, ZipWriter};

use super::walker::{slash_path, TraversalResult};

/// Default size of each piece handed to the body stream.
pub const DEFAULT_PIECE_SIZE: usize = 64 * 1024;

/// Default number of pieces buffered between worker and body.
pub const DEFAULT_CHANNEL_DEPTH: usize = 8;

/// One file to put into an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// File to read.
    pub source_path: PathBuf,
    /// Name inside the archive, `/`-separated.
    pub archive_name: String,
}

/// Ordered list of files making up one archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveManifest {
    entries: Vec<ArchiveEntry>,
}

impl ArchiveManifest {
    /// Archive holding a single file under its own base name.
    pub fn single_file(path: &Path) -> Self {
        let archive_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        Self {
            entries: vec![ArchiveEntry {
                source_path: path.to_path_buf(),
                archive_name,
            }],
        }
    }

    /// Archive holding every file of a traversal, named by relative path.
    ///
    /// Directories are implied by the file names and get no entry of
    /// their own, so empty directories are not represented.
    pub fn from_traversal(traversal: &TraversalResult) -> Self {
        let entries = traversal
            .files
            .iter()
            .map(|f| ArchiveEntry {
                source_path: f.absolute_path.clone(),
                archive_name: slash_path(&f.relative_path),
            })
            .collect();
        Self { entries }
    }

    /// Entries in archive order.
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Write the whole archive for `manifest` into `out`.
///
/// Entries are deflated. The writer is only ever appended to, so it does
/// not need to be seekable. Returns the writer once the central directory
/// has been written.
///
/// Traversals list dangling links as files; those entries are left out.
/// Any other unreadable source fails the whole archive.
pub fn write_archive<W: Write>(manifest: &ArchiveManifest, out: W) -> io::Result<W> {
    let mut zip = ZipWriter::new_stream(out);

    for entry in manifest.entries() {
        let mut source = match File::open(&entry.source_path) {
            Ok(source) => source,
            Err(e) if e.kind() == io::ErrorKind::NotFound && is_link(&entry.source_path) => {
                debug!(path = %entry.source_path.display(), "skipping dangling link");
                continue;
            }
            Err(e) => return Err(e),
        };
        let size = source.metadata()?.len();
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(size >= u64::from(u32::MAX));

        zip.start_file(entry.archive_name.as_str(), options)
            .map_err(zip_to_io)?;
        io::copy(&mut source, &mut zip)?;
    }

    let stream = zip.finish().map_err(zip_to_io)?;
    Ok(stream.into_inner())
}

/// Keep the kind of IO failures, so a vanished reader stays `BrokenPipe`.
fn zip_to_io(error: ZipError) -> io::Error {
    match error {
        ZipError::Io(e) => e,
        other => io::Error::other(other),
    }
}

fn is_link(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

/// Adapter that sends everything written to it over a bounded channel.
///
/// Writes are collected until `piece_size` bytes are buffered, then sent as
/// one piece, blocking while the channel is full. A closed channel means the
/// reader went away and surfaces as [`io::ErrorKind::BrokenPipe`].
pub struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
    buf: Vec<u8>,
    piece_size: usize,
    bytes_sent: u64,
}

impl ChannelWriter {
    /// Create a writer sending pieces of `piece_size` bytes to `tx`.
    pub fn new(tx: mpsc::Sender<io::Result<Bytes>>, piece_size: usize) -> Self {
        Self {
            tx,
            buf: Vec::with_capacity(piece_size),
            piece_size: piece_size.max(1),
            bytes_sent: 0,
        }
    }

    /// Bytes handed to the channel so far.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let piece = std::mem::replace(&mut self.buf, Vec::with_capacity(self.piece_size));
        let len = piece.len() as u64;
        self.tx
            .blocking_send(Ok(Bytes::from(piece)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "archive reader closed"))?;
        self.bytes_sent += len;
        Ok(())
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        if self.buf.len() >= self.piece_size {
            self.send_buffered()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffered()
    }
}

/// Produces zip byte streams from manifests.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveStreamer {
    piece_size: usize,
    channel_depth: usize,
}

impl Default for ArchiveStreamer {
    fn default() -> Self {
        Self {
            piece_size: DEFAULT_PIECE_SIZE,
            channel_depth: DEFAULT_CHANNEL_DEPTH,
        }
    }
}

impl ArchiveStreamer {
    /// Create a streamer with custom buffering.
    pub fn new(piece_size: usize, channel_depth: usize) -> Self {
        Self {
            piece_size: piece_size.max(1),
            channel_depth: channel_depth.max(1),
        }
    }

    /// Start archiving `manifest` and return the byte stream.
    ///
    /// Must be called within a tokio runtime. The archive is built lazily
    /// as the stream is polled. If a source file cannot be read the stream
    /// yields the error and ends. Dropping the stream stops the worker at
    /// its next piece.
    pub fn stream(
        &self,
        manifest: ArchiveManifest,
    ) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        let (rx, _worker) = self.spawn(manifest);
        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
    }

    /// Start the blocking worker for `manifest`.
    ///
    /// Returns the receiving end of the piece channel and a handle that
    /// resolves to an [`ArchiveRun`] once the worker has stopped.
    pub fn spawn(
        &self,
        manifest: ArchiveManifest,
    ) -> (mpsc::Receiver<io::Result<Bytes>>, JoinHandle<ArchiveRun>) {
        let (tx, rx) = mpsc::channel(self.channel_depth);
        let piece_size = self.piece_size;

        let worker = tokio::task::spawn_blocking(move || {
            let mut writer = ChannelWriter::new(tx, piece_size);
            let result = write_archive(&manifest, &mut writer).and_then(|w| w.flush());

            let error = match result {
                Ok(()) => {
                    debug!(entries = manifest.len(), bytes = writer.bytes_sent(), "archive complete");
                    None
                }
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    debug!(bytes = writer.bytes_sent(), "archive reader went away, stopping");
                    Some(e.kind())
                }
                Err(e) => {
                    warn!(error = %e, "archive aborted");
                    let kind = e.kind();
                    let _ = writer.tx.blocking_send(Err(e));
                    Some(kind)
                }
            };

            ArchiveRun {
                bytes_sent: writer.bytes_sent(),
                error,
            }
        });

        (rx, worker)
    }
}

/// How an archive worker finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveRun {
    /// Bytes delivered to the reader.
    pub bytes_sent: u64,
    /// Why the worker stopped early, if it did.
    pub error: Option<io::ErrorKind>,
}
