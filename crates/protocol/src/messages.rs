//! HTTP message bodies exchanged between the browser client and the server.
//!
//! All bodies are JSON. Field names follow the browser client's camelCase
//! convention.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Outcome code attached to every `/upload` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadCode {
    /// The last chunk was written; the file is complete.
    Success,
    /// The chunk was appended; send the next one.
    Continue,
    /// The target already holds the whole file and resume was requested.
    FileAlreadyUploaded,
    /// The chunk was skipped; restart from `resumeChunk`.
    ResumeUpload,
    /// The chunk length does not fit its position; resend it.
    Corrupted,
}

impl UploadCode {
    /// Wire representation of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Continue => "CONTINUE",
            Self::FileAlreadyUploaded => "FILE_ALREADY_UPLOADED",
            Self::ResumeUpload => "RESUME_UPLOAD",
            Self::Corrupted => "CORRUPTED",
        }
    }
}

impl fmt::Display for UploadCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadCode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(Self::Success),
            "CONTINUE" => Ok(Self::Continue),
            "FILE_ALREADY_UPLOADED" => Ok(Self::FileAlreadyUploaded),
            "RESUME_UPLOAD" => Ok(Self::ResumeUpload),
            "CORRUPTED" => Ok(Self::Corrupted),
            other => Err(ProtocolError::UnknownCode(other.to_string())),
        }
    }
}

/// Reply body of `POST /upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReply {
    /// Human readable status.
    pub message: String,
    /// Machine readable outcome.
    pub code: UploadCode,
    /// Chunk index the client must continue from (only with `RESUME_UPLOAD`).
    #[serde(rename = "resumeChunk", default, skip_serializing_if = "Option::is_none")]
    pub resume_chunk: Option<u64>,
}

impl UploadReply {
    fn new(message: impl Into<String>, code: UploadCode) -> Self {
        Self {
            message: message.into(),
            code,
            resume_chunk: None,
        }
    }

    /// Final chunk written.
    pub fn success() -> Self {
        Self::new("File uploaded successfully", UploadCode::Success)
    }

    /// Intermediate chunk written.
    pub fn continue_upload() -> Self {
        Self::new("Chunk received", UploadCode::Continue)
    }

    /// Nothing to do, the file is already complete.
    pub fn already_uploaded() -> Self {
        Self::new("File already uploaded", UploadCode::FileAlreadyUploaded)
    }

    /// Chunk skipped, client must continue from `chunk`.
    pub fn resume(chunk: u64) -> Self {
        Self {
            message: format!("Skipping this chunk. Resume to chunk {chunk}"),
            code: UploadCode::ResumeUpload,
            resume_chunk: Some(chunk),
        }
    }

    /// Chunk rejected because its length does not fit its position.
    pub fn corrupted() -> Self {
        Self::new("Chunk is likely corrupted", UploadCode::Corrupted)
    }
}

/// Plain `{ "message": ... }` reply used by every non-upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReply {
    /// Human readable status.
    pub message: String,
}

impl MessageReply {
    /// Create a reply with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Reply body of `GET /files`.
///
/// Both lists hold paths relative to the listed folder, in traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListing {
    /// Relative paths of every file below the folder.
    pub files: Vec<String>,
    /// Relative paths of every directory below the folder.
    pub folders: Vec<String>,
}

/// Reply body of `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Service name.
    pub name: String,
    /// Server version.
    pub version: String,
    /// Whether mutating endpoints are disabled.
    pub readonly: bool,
}
