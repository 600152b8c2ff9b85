//! In-process fake peer for session and download tests

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;
use crate::peer::PeerId;
use crate::protocol::{read_handshake, read_message, write_handshake, write_message, Handshake, Message};
use crate::torrent::InfoHash;

/// Serves blocks of `data` to a single downloader
pub(crate) struct FakePeer {
    pub data: Vec<u8>,
    pub piece_length: usize,
    pub peer_id: PeerId,
    /// Answer the handshake with this hash instead of echoing
    pub reply_info_hash: Option<InfoHash>,
    /// Send a keep-alive before each protocol message
    pub keep_alive_first: bool,
    /// Flip the first byte of every piece
    pub corrupt: bool,
}

impl FakePeer {
    pub fn new(data: Vec<u8>, piece_length: usize) -> Self {
        Self {
            data,
            piece_length,
            peer_id: PeerId::from_bytes(*b"-FAKE0-fakepeer0001-"),
            reply_info_hash: None,
            keep_alive_first: false,
            corrupt: false,
        }
    }

    fn bitfield(&self) -> Vec<u8> {
        let pieces = self.data.len().div_ceil(self.piece_length);
        let mut bitfield = vec![0u8; pieces.div_ceil(8)];
        for index in 0..pieces {
            bitfield[index / 8] |= 0x80 >> (index % 8);
        }
        bitfield
    }

    async fn send<S: AsyncWrite + Unpin>(&self, stream: &mut S, message: &Message) -> Result<()> {
        if self.keep_alive_first {
            write_message(stream, &Message::KeepAlive).await?;
        }
        write_message(stream, message).await
    }

    /// Run the seeding side of the protocol until the downloader hangs up
    pub async fn serve<S: AsyncRead + AsyncWrite + Unpin>(self, mut stream: S) -> Result<()> {
        let theirs = read_handshake(&mut stream).await?;
        let info_hash = self.reply_info_hash.unwrap_or(theirs.info_hash);
        write_handshake(&mut stream, &Handshake::new(info_hash, self.peer_id)).await?;

        self.send(&mut stream, &Message::Bitfield { bitfield: self.bitfield() }).await?;
        if read_message(&mut stream).await? != Message::Interested {
            return Ok(());
        }
        self.send(&mut stream, &Message::Unchoke).await?;

        while let Message::Request { index, begin, length } = read_message(&mut stream).await? {
            let start = index as usize * self.piece_length + begin as usize;
            // Hang up on requests past the end of the served data
            let Some(block) = self.data.get(start..start + length as usize) else {
                return Ok(());
            };
            let mut block = block.to_vec();
            if self.corrupt && begin == 0 {
                block[0] ^= 0xff;
            }
            self.send(&mut stream, &Message::Piece { index, begin, block }).await?;
        }
        Ok(())
    }
}
