use crate::{BlockSource, Chunk, Result};
use bitcoin::Network;
use txgraph_index::{IndexEntry, OutputDescriptor};

/// Index entries extracted from one chunk.
#[derive(Debug, Default)]
pub struct BuiltChunk {
    pub entries: Vec<IndexEntry>,
    pub blocks: u64,
    pub skipped_blocks: u64,
}

/// Decodes every block of `chunk` and serializes the outputs of each transaction.
///
/// A block that cannot be read or decoded is logged and skipped; its transactions are
/// then absent from the index and any later spend of them resolves as a miss.
pub fn build_chunk<S: BlockSource + ?Sized>(
    source: &S,
    chunk: Chunk,
    network: Network,
) -> Result<BuiltChunk> {
    let mut built = BuiltChunk::default();

    for height in chunk.heights() {
        let block = match source.block_at(height) {
            Ok(block) => block,
            Err(err) => {
                tracing::warn!("Skipping block #{height} while building the index: {err}");
                built.skipped_blocks += 1;
                continue;
            }
        };

        built.blocks += 1;
        built.entries.reserve(block.txdata.len());

        for tx in &block.txdata {
            let descriptor = OutputDescriptor::from_transaction(tx, network);
            let entry = IndexEntry::new(tx.compute_txid(), &descriptor)
                .map_err(txgraph_index::Error::from)?;
            built.entries.push(entry);
        }
    }

    tracing::debug!(
        "Extracted {} descriptors from #{}..#{}",
        built.entries.len(),
        chunk.start,
        chunk.end
    );

    Ok(built)
}
