//! File handling for the share root.
//!
//! This module provides the filesystem side of every endpoint:
//! - Lexical path confinement for untrusted client paths
//! - Link-following directory traversal with cycle protection
//! - Streaming zip archives built from traversals
//! - Resumable chunked uploads
//! - Delete, move, and create operations
//!
//! # Security
//!
//! Every client path goes through [`PathSandbox`] before it is used. The
//! share root is usually a directory of links, so containment is checked
//! lexically rather than by canonicalizing.

pub mod archive;
pub mod ops;
pub mod sandbox;
pub mod upload;
pub mod walker;

pub use archive::{ArchiveEntry, ArchiveManifest, ArchiveStreamer};
pub use ops::{FileOps, OpsError};
pub use sandbox::{secure_filename, PathSandbox};
pub use upload::{
    ChunkRequest, ChunkedUploadCoordinator, PathLocks, UploadError, UploadForm, UploadOutcome,
};
pub use walker::{CycleGuard, DirEntry, DirectoryWalker, FileEntry, TraversalResult};
