//! Access to decoded blocks by height.

use crate::{BlockSourceError, Error, Result};
use bitcoin::consensus::Decodable;
use bitcoin::Block;
use bitcoin_explorer::BitcoinDB;
use std::path::Path;

/// Random access to the blocks of the active chain.
///
/// Implementations are shared by every worker of a phase, so reads must not require
/// exclusive access.
pub trait BlockSource: Send + Sync {
    /// Number of blocks available, i.e. one past the highest readable height.
    fn block_count(&self) -> u32;

    /// Returns the decoded block at `height`.
    fn block_at(&self, height: u32) -> std::result::Result<Block, BlockSourceError>;
}

fn decode_block(height: u32, raw_block: &[u8]) -> std::result::Result<Block, BlockSourceError> {
    Block::consensus_decode(&mut &raw_block[..])
        .map_err(|source| BlockSourceError::Decode { height, source })
}

/// Blocks read straight from the `blocks/` directory of a bitcoind data directory.
pub struct BitcoindBlockSource {
    db: BitcoinDB,
}

impl BitcoindBlockSource {
    /// Opens the block files and block index under `datadir`.
    ///
    /// bitcoind's own transaction index is not needed and is left untouched.
    pub fn open(datadir: &Path) -> Result<Self> {
        tracing::info!("Using local bitcoind database: {}", datadir.display());

        let db = BitcoinDB::new(datadir, false).map_err(|err| Error::BlockSourceOpen {
            path: datadir.to_path_buf(),
            reason: err.to_string(),
        })?;

        Ok(Self { db })
    }
}

impl BlockSource for BitcoindBlockSource {
    fn block_count(&self) -> u32 {
        self.db.get_block_count() as u32
    }

    fn block_at(&self, height: u32) -> std::result::Result<Block, BlockSourceError> {
        let raw_block =
            self.db
                .get_raw_block(height as usize)
                .map_err(|err| BlockSourceError::Read {
                    height,
                    reason: err.to_string(),
                })?;

        decode_block(height, &raw_block)
    }
}

/// Serialized blocks held in memory, decoded on every read like the on-disk source.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlockSource {
    raw_blocks: Vec<Vec<u8>>,
}

impl MemoryBlockSource {
    /// Creates a source whose height `i` is the `i`-th block.
    pub fn new(blocks: impl IntoIterator<Item = Block>) -> Self {
        Self::from_raw(
            blocks
                .into_iter()
                .map(|block| bitcoin::consensus::serialize(&block)),
        )
    }

    /// Creates a source from consensus-serialized blocks, in height order.
    pub fn from_raw(raw_blocks: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            raw_blocks: raw_blocks.into_iter().collect(),
        }
    }
}

impl BlockSource for MemoryBlockSource {
    fn block_count(&self) -> u32 {
        self.raw_blocks.len() as u32
    }

    fn block_at(&self, height: u32) -> std::result::Result<Block, BlockSourceError> {
        let raw_block = self
            .raw_blocks
            .get(height as usize)
            .ok_or(BlockSourceError::Missing(height))?;

        decode_block(height, raw_block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::constants::genesis_block;
    use bitcoin::Network;

    #[test]
    fn test_memory_source_decodes_blocks() {
        let genesis = genesis_block(Network::Bitcoin);
        let source = MemoryBlockSource::new([genesis.clone()]);

        assert_eq!(source.block_count(), 1);
        assert_eq!(source.block_at(0).unwrap(), genesis);
        assert!(matches!(source.block_at(1), Err(BlockSourceError::Missing(1))));
    }

    #[test]
    fn test_truncated_block_fails_to_decode() {
        let mut raw_block = bitcoin::consensus::serialize(&genesis_block(Network::Bitcoin));
        raw_block.truncate(raw_block.len() / 2);
        let source = MemoryBlockSource::from_raw([raw_block]);

        assert!(matches!(
            source.block_at(0),
            Err(BlockSourceError::Decode { height: 0, .. })
        ));
    }
}
