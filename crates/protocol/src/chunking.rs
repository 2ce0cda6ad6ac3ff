//! Chunk arithmetic for resumable uploads.
//!
//! Clients split a file into fixed-size chunks of [`CHUNK_SIZE`] bytes (the
//! last chunk may be shorter) and send one request per chunk. Both sides must
//! agree on the chunk size, so it lives here rather than in server config.

use crate::error::{ProtocolError, Result};

/// Fixed upload chunk size in bytes.
///
/// Changing this requires a synchronized update of every client.
pub const CHUNK_SIZE: u64 = 500_000;

/// Number of chunks a file of `file_size` bytes is split into.
///
/// Equal to `ceil(file_size / chunk_size)`. A zero-byte file has no chunks.
pub fn total_chunks(file_size: u64, chunk_size: u64) -> u64 {
    file_size.div_ceil(chunk_size)
}

/// Expected payload length of chunk `index`, or `None` if the index is past
/// the end of the file.
pub fn expected_chunk_len(file_size: u64, chunk_size: u64, index: u64) -> Option<u64> {
    let total = total_chunks(file_size, chunk_size);
    if index >= total {
        return None;
    }
    if index + 1 < total {
        Some(chunk_size)
    } else {
        Some(file_size - index * chunk_size)
    }
}

/// Byte offset at which chunk `index` starts.
pub fn chunk_offset(chunk_size: u64, index: u64) -> u64 {
    index.saturating_mul(chunk_size)
}

/// Check a received payload length against the position of its chunk.
pub fn check_chunk_len(file_size: u64, chunk_size: u64, index: u64, actual: u64) -> Result<()> {
    match expected_chunk_len(file_size, chunk_size, index) {
        Some(expected) if expected == actual => Ok(()),
        Some(expected) => Err(ProtocolError::ChunkSizeMismatch {
            index,
            expected,
            actual,
        }),
        None => Err(ProtocolError::ChunkOutOfRange {
            index,
            total: total_chunks(file_size, chunk_size),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_chunks_rounds_up() {
        assert_eq!(total_chunks(1, CHUNK_SIZE), 1);
        assert_eq!(total_chunks(CHUNK_SIZE, CHUNK_SIZE), 1);
        assert_eq!(total_chunks(CHUNK_SIZE + 1, CHUNK_SIZE), 2);
        assert_eq!(total_chunks(1_200_000, CHUNK_SIZE), 3);
        assert_eq!(total_chunks(0, CHUNK_SIZE), 0);
    }

    #[test]
    fn test_expected_len_matches_ceil_rule() {
        // Spot-check the invariant across a spread of sizes and chunk sizes.
        for &chunk in &[1u64, 7, 64, 500_000] {
            for &size in &[1u64, 6, 7, 8, 63, 64, 65, 1000, 1_200_000] {
                let total = total_chunks(size, chunk);
                let mut sum = 0;
                for i in 0..total {
                    let len = expected_chunk_len(size, chunk, i).unwrap();
                    if i < total - 1 {
                        assert_eq!(len, chunk);
                    } else {
                        assert_eq!(len, size - i * chunk);
                    }
                    sum += len;
                }
                assert_eq!(sum, size, "size {size}, chunk {chunk}");
                assert!(expected_chunk_len(size, chunk, total).is_none());
            }
        }
    }

    #[test]
    fn test_check_chunk_len_example_file() {
        assert!(check_chunk_len(1_200_000, CHUNK_SIZE, 0, 500_000).is_ok());
        assert!(check_chunk_len(1_200_000, CHUNK_SIZE, 1, 500_000).is_ok());
        assert!(check_chunk_len(1_200_000, CHUNK_SIZE, 2, 200_000).is_ok());
    }

    #[test]
    fn test_check_chunk_len_short_middle_chunk() {
        let err = check_chunk_len(1_200_000, CHUNK_SIZE, 1, 499_999).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ChunkSizeMismatch {
                index: 1,
                expected: 500_000,
                actual: 499_999
            }
        ));
    }

    #[test]
    fn test_check_chunk_len_wrong_last_chunk() {
        let err = check_chunk_len(1_200_000, CHUNK_SIZE, 2, 500_000).unwrap_err();
        assert!(matches!(err, ProtocolError::ChunkSizeMismatch { .. }));
    }

    #[test]
    fn test_check_chunk_len_index_past_end() {
        let err = check_chunk_len(1_200_000, CHUNK_SIZE, 3, 500_000).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ChunkOutOfRange { index: 3, total: 3 }
        ));
    }

    #[test]
    fn test_chunk_offset() {
        assert_eq!(chunk_offset(CHUNK_SIZE, 0), 0);
        assert_eq!(chunk_offset(CHUNK_SIZE, 2), 1_000_000);
        assert_eq!(chunk_offset(CHUNK_SIZE, u64::MAX), u64::MAX);
    }
}
