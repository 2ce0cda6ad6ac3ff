//! # QrShare Protocol Library
//!
//! Wire-level definitions shared by the QrShare server and its clients.
//!
//! ## Overview
//!
//! - **Chunk arithmetic**: the fixed upload chunk size and the rules every
//!   chunk must satisfy
//! - **Message Definitions**: JSON reply bodies and upload outcome codes
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::chunking::{check_chunk_len, total_chunks, CHUNK_SIZE};
//! use protocol::messages::UploadReply;
//!
//! // A 1.2 MB file is sent as three chunks.
//! assert_eq!(total_chunks(1_200_000, CHUNK_SIZE), 3);
//! assert!(check_chunk_len(1_200_000, CHUNK_SIZE, 2, 200_000).is_ok());
//!
//! let reply = UploadReply::resume(1);
//! assert_eq!(reply.resume_chunk, Some(1));
//! ```
//!
//! ## Modules
//!
//! - [`chunking`]: Chunk size constant and length rules
//! - [`messages`]: HTTP reply bodies
//! - [`error`]: Error types

pub mod chunking;
pub mod error;
pub mod messages;

pub use chunking::{check_chunk_len, expected_chunk_len, total_chunks, CHUNK_SIZE};
pub use error::{ProtocolError, Result};
pub use messages::{FileListing, MessageReply, ServiceInfo, UploadCode, UploadReply};
