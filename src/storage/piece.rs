//! Piece layout and piece buffers
//!
//! Boundary arithmetic for splitting a torrent into pieces and pieces into
//! wire-sized blocks, plus the accumulator a piece is assembled in.

use sha1::{Digest, Sha1};
use tracing::{debug, trace, warn};

use crate::error::{Result, TorrentError};

/// Fixed block size used for every request, 16 KiB
pub const BLOCK_SIZE: u32 = 16 * 1024;

/// Upper bound on buffer space reserved up front from declared sizes
pub const MAX_PREALLOC: usize = 16 * 1024 * 1024;

/// A single block request within a piece
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRequest {
    /// Piece index this block belongs to
    pub index: u32,
    /// Offset within the piece
    pub begin: u32,
    /// Length of the block, at most [`BLOCK_SIZE`]
    pub length: u32,
}

/// How a torrent of `total_length` bytes splits into pieces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceLayout {
    total_length: u64,
    piece_length: u64,
}

impl PieceLayout {
    /// Create a layout; `piece_length` must be positive and fit a wire offset
    pub fn new(total_length: u64, piece_length: u64) -> Result<Self> {
        if piece_length == 0 {
            return Err(TorrentError::invalid_field("piece length", "must be positive"));
        }
        if piece_length > u64::from(u32::MAX) {
            return Err(TorrentError::invalid_field("piece length", "does not fit in 32 bits"));
        }
        let layout = Self { total_length, piece_length };
        if layout.piece_count_u64() > u64::from(u32::MAX) {
            return Err(TorrentError::invalid_field("length", "too many pieces"));
        }
        Ok(layout)
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn piece_length(&self) -> u64 {
        self.piece_length
    }

    fn piece_count_u64(&self) -> u64 {
        self.total_length.div_ceil(self.piece_length)
    }

    /// Number of pieces, `ceil(total_length / piece_length)`
    pub fn piece_count(&self) -> u32 {
        // Bounded by the check in new()
        self.piece_count_u64() as u32
    }

    /// Byte length of piece `index`.
    ///
    /// Every piece is `piece_length` long except the last, which holds the
    /// remainder. An exact multiple leaves a full-size last piece, not an
    /// empty one.
    pub fn piece_size(&self, index: u32) -> Result<u64> {
        let count = self.piece_count();
        if index >= count {
            return Err(TorrentError::invalid_field(
                "piece index",
                format!("{} out of range for {} pieces", index, count),
            ));
        }
        if index + 1 < count {
            return Ok(self.piece_length);
        }
        match self.total_length % self.piece_length {
            0 => Ok(self.piece_length),
            remainder => Ok(remainder),
        }
    }

    /// Absolute file offset where piece `index` begins
    pub fn piece_offset(&self, index: u32) -> u64 {
        u64::from(index) * self.piece_length
    }

    /// Number of blocks a piece of `piece_size` bytes needs
    pub fn block_count(piece_size: u64) -> u32 {
        piece_size.div_ceil(u64::from(BLOCK_SIZE)) as u32
    }

    /// Block requests covering piece `index`, in offset order
    pub fn blocks(&self, index: u32) -> Result<Vec<BlockRequest>> {
        let piece_size = self.piece_size(index)?;
        let block_count = Self::block_count(piece_size);
        let mut blocks = Vec::with_capacity(block_count as usize);

        for block in 0..block_count {
            let begin = u64::from(block) * u64::from(BLOCK_SIZE);
            let length = (piece_size - begin).min(u64::from(BLOCK_SIZE));
            if length == 0 {
                continue;
            }
            blocks.push(BlockRequest {
                index,
                begin: begin as u32,
                length: length as u32,
            });
        }

        trace!("Piece {} ({} bytes) splits into {} blocks", index, piece_size, blocks.len());
        Ok(blocks)
    }
}

/// Accumulates the blocks of one piece in offset order
#[derive(Debug, Clone)]
pub struct PieceBuffer {
    index: u32,
    expected_len: usize,
    data: Vec<u8>,
}

impl PieceBuffer {
    pub fn new(index: u32, expected_len: usize) -> Self {
        Self {
            index,
            expected_len,
            // Declared sizes come from untrusted metadata; grow past the cap as blocks arrive
            data: Vec::with_capacity(expected_len.min(MAX_PREALLOC)),
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Append the next block; blocks must arrive contiguously
    pub fn push_block(&mut self, begin: u32, block: &[u8]) -> Result<()> {
        if begin as usize != self.data.len() {
            return Err(TorrentError::protocol_error(format!(
                "block for piece {} at offset {} does not follow offset {}",
                self.index,
                begin,
                self.data.len()
            )));
        }
        if self.data.len() + block.len() > self.expected_len {
            return Err(TorrentError::protocol_error(format!(
                "block overruns piece {} ({} + {} > {})",
                self.index,
                self.data.len(),
                block.len(),
                self.expected_len
            )));
        }
        self.data.extend_from_slice(block);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if all bytes of the piece are present
    pub fn is_complete(&self) -> bool {
        self.data.len() == self.expected_len
    }

    /// Verify the piece against its expected SHA-1
    pub fn verify(&self, expected_hash: &[u8; 20]) -> Result<()> {
        let mut hasher = Sha1::new();
        hasher.update(&self.data);
        let actual: [u8; 20] = hasher.finalize().into();

        if actual != *expected_hash {
            warn!("Piece {} hash mismatch", self.index);
            return Err(TorrentError::piece_hash_mismatch(self.index, expected_hash, &actual));
        }
        debug!("Piece {} verified", self.index);
        Ok(())
    }

    /// Consume the buffer, returning the piece bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_split() {
        let layout = PieceLayout::new(1024, 512).unwrap();
        assert_eq!(layout.piece_count(), 2);
        assert_eq!(layout.piece_size(0).unwrap(), 512);
        assert_eq!(layout.piece_size(1).unwrap(), 512);
    }

    #[test]
    fn test_short_last_piece() {
        let layout = PieceLayout::new(1000, 512).unwrap();
        assert_eq!(layout.piece_count(), 2);
        assert_eq!(layout.piece_size(0).unwrap(), 512);
        assert_eq!(layout.piece_size(1).unwrap(), 488);
    }

    #[test]
    fn test_single_exact_piece() {
        let layout = PieceLayout::new(512, 512).unwrap();
        assert_eq!(layout.piece_count(), 1);
        assert_eq!(layout.piece_size(0).unwrap(), 512);
    }

    #[test]
    fn test_piece_index_out_of_range() {
        let layout = PieceLayout::new(1000, 512).unwrap();
        assert!(matches!(layout.piece_size(2), Err(TorrentError::InvalidField { .. })));
        assert!(layout.blocks(2).is_err());
    }

    #[test]
    fn test_zero_piece_length_rejected() {
        assert!(matches!(PieceLayout::new(10, 0), Err(TorrentError::InvalidField { .. })));
    }

    #[test]
    fn test_empty_torrent_has_no_pieces() {
        let layout = PieceLayout::new(0, 512).unwrap();
        assert_eq!(layout.piece_count(), 0);
    }

    #[test]
    fn test_piece_offset() {
        let layout = PieceLayout::new(92063, 32768).unwrap();
        assert_eq!(layout.piece_offset(0), 0);
        assert_eq!(layout.piece_offset(2), 65536);
    }

    #[test]
    fn test_block_count() {
        assert_eq!(PieceLayout::block_count(0), 0);
        assert_eq!(PieceLayout::block_count(1), 1);
        assert_eq!(PieceLayout::block_count(16384), 1);
        assert_eq!(PieceLayout::block_count(16385), 2);
        assert_eq!(PieceLayout::block_count(262144), 16);
    }

    #[test]
    fn test_blocks_for_sample_torrent() {
        // 92063 bytes in 32 KiB pieces: last piece is 26527 bytes
        let layout = PieceLayout::new(92063, 32768).unwrap();
        assert_eq!(layout.piece_count(), 3);

        let full = layout.blocks(0).unwrap();
        assert_eq!(
            full,
            vec![
                BlockRequest { index: 0, begin: 0, length: 16384 },
                BlockRequest { index: 0, begin: 16384, length: 16384 },
            ]
        );

        let last = layout.blocks(2).unwrap();
        assert_eq!(
            last,
            vec![
                BlockRequest { index: 2, begin: 0, length: 16384 },
                BlockRequest { index: 2, begin: 16384, length: 10143 },
            ]
        );
        let total: u64 = last.iter().map(|b| u64::from(b.length)).sum();
        assert_eq!(total, layout.piece_size(2).unwrap());
    }

    #[test]
    fn test_blocks_never_zero_length() {
        let layout = PieceLayout::new(3 * 16384, 3 * 16384).unwrap();
        let blocks = layout.blocks(0).unwrap();
        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|b| b.length == BLOCK_SIZE));
    }

    #[test]
    fn test_piece_buffer_in_order() {
        let mut buffer = PieceBuffer::new(0, 6);
        buffer.push_block(0, &[1, 2, 3, 4]).unwrap();
        assert!(!buffer.is_complete());
        buffer.push_block(4, &[5, 6]).unwrap();
        assert!(buffer.is_complete());
        assert_eq!(buffer.into_bytes(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_piece_buffer_rejects_gaps_and_overruns() {
        let mut buffer = PieceBuffer::new(1, 4);
        assert!(buffer.push_block(2, &[1, 2]).is_err());
        buffer.push_block(0, &[1, 2]).unwrap();
        assert!(buffer.push_block(0, &[1, 2]).is_err());
        assert!(buffer.push_block(2, &[3, 4, 5]).is_err());
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_piece_buffer_huge_declared_length() {
        let mut buffer = PieceBuffer::new(0, 1 << 40);
        assert!(buffer.data.capacity() <= MAX_PREALLOC);
        buffer.push_block(0, &[7u8; 16384]).unwrap();
        assert_eq!(buffer.len(), 16384);
        assert!(!buffer.is_complete());
    }

    #[test]
    fn test_piece_buffer_verify() {
        let data: Vec<u8> = (0..40000u32).map(|i| (i % 251) as u8).collect();
        let mut buffer = PieceBuffer::new(0, 32768);
        buffer.push_block(0, &data[..16384]).unwrap();
        buffer.push_block(16384, &data[16384..32768]).unwrap();

        let expected: [u8; 20] = hex::decode("9dbe5260858a0f960c062aa8f8d3914ff5bde250")
            .unwrap()
            .try_into()
            .unwrap();
        assert!(buffer.verify(&expected).is_ok());

        let err = buffer.verify(&[0u8; 20]).unwrap_err();
        assert!(matches!(err, TorrentError::PieceHashMismatch { index: 0, .. }));
    }
}
