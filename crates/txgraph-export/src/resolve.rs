//! Resolution worker.

use crate::rows::{format_date, format_timestamp};
use crate::{
    AddressRow, BelongsRow, BlockRow, BlockSource, Btc, Chunk, ChunkRows, Label, PrecedesRow,
    ReceivesRow, SendsRow, TransactionRow, COINBASE_ADDRESS,
};
use bitcoin::hashes::Hash;
use bitcoin::{Block, BlockHash, Network, OutPoint, Transaction};
use txgraph_index::{IndexReader, IndexedOutput, OutputDescriptor, SpentOutput};

/// Counters of one or more resolved chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub blocks: u64,
    pub transactions: u64,
    pub resolved_inputs: u64,
    pub missed_inputs: u64,
    pub skipped_blocks: u64,
}

impl ResolveStats {
    pub fn absorb(&mut self, other: &Self) {
        self.blocks += other.blocks;
        self.transactions += other.transactions;
        self.resolved_inputs += other.resolved_inputs;
        self.missed_inputs += other.missed_inputs;
        self.skipped_blocks += other.skipped_blocks;
    }
}

/// Everything a resolution worker hands back to the coordinator.
#[derive(Debug, Default)]
pub struct ResolvedChunk {
    pub rows: ChunkRows,
    /// Resolved inputs, reported only when spend tracking is on.
    pub spent: Vec<SpentOutput>,
    pub stats: ResolveStats,
}

/// Decodes every block of `chunk` and attributes each input through `reader`.
///
/// Nothing in here fails the chunk: an unreadable block is skipped as a whole and an input
/// whose source output is not in the index is left out of the transaction's aggregates.
pub fn resolve_chunk<S: BlockSource + ?Sized>(
    source: &S,
    reader: &IndexReader<'_>,
    chunk: Chunk,
    network: Network,
    track_spends: bool,
) -> ResolvedChunk {
    let mut worker = ChunkResolver {
        reader,
        network,
        track_spends,
        resolved: ResolvedChunk::default(),
    };

    for height in chunk.heights() {
        match source.block_at(height) {
            Ok(block) => worker.resolve_block(height, &block),
            Err(err) => {
                tracing::warn!("Skipping block #{height} while resolving: {err}");
                worker.resolved.stats.skipped_blocks += 1;
            }
        }
    }

    tracing::debug!(
        "Resolved #{}..#{}: {} rows, {:?}",
        chunk.start,
        chunk.end,
        worker.resolved.rows.len(),
        worker.resolved.stats
    );

    worker.resolved
}

struct ChunkResolver<'r, 'a> {
    reader: &'r IndexReader<'a>,
    network: Network,
    track_spends: bool,
    resolved: ResolvedChunk,
}

impl ChunkResolver<'_, '_> {
    fn resolve_block(&mut self, height: u32, block: &Block) {
        let block_hash = block.block_hash();
        let prev_blockhash = block.header.prev_blockhash;
        let date = format_date(block.header.time);

        let rows = &mut self.resolved.rows;
        rows.blocks.push(BlockRow {
            hash: block_hash,
            height,
            timestamp: format_timestamp(block.header.time),
        });

        // Genesis has no predecessor.
        if prev_blockhash != BlockHash::all_zeros() {
            rows.precedes.push(PrecedesRow {
                from_hash: prev_blockhash,
                to_hash: block_hash,
                label: Label::Precedes,
            });
        }

        for tx in &block.txdata {
            self.resolve_transaction(tx, block_hash, &date);
        }

        self.resolved.stats.blocks += 1;
    }

    fn resolve_transaction(&mut self, tx: &Transaction, block_hash: BlockHash, date: &str) {
        let txid = tx.compute_txid();
        let descriptor = OutputDescriptor::from_transaction(tx, self.network);

        for IndexedOutput {
            value,
            address,
            vout,
        } in &descriptor.outputs
        {
            if let Some(address) = address {
                let rows = &mut self.resolved.rows;
                rows.addresses.push(AddressRow {
                    address: address.clone(),
                });
                rows.receives.push(ReceivesRow {
                    txid,
                    value: Btc(*value),
                    output_position: *vout,
                    address: address.clone(),
                    label: Label::Receives,
                });
            }
        }

        let out_sum = descriptor.total_value();

        let (in_degree, in_sum) = if tx.is_coinbase() {
            self.resolved.rows.sends.push(SendsRow {
                address: COINBASE_ADDRESS.to_string(),
                value: Btc(out_sum),
                txid,
                label: Label::Sends,
            });
            (1, out_sum)
        } else {
            let mut in_degree = 0u32;
            let mut in_sum = 0u64;
            for input in &tx.input {
                if let Some(spent) = self.lookup(&input.previous_output) {
                    self.resolved.rows.sends.push(SendsRow {
                        address: spent.address_or_unknown().to_string(),
                        value: Btc(spent.value),
                        txid,
                        label: Label::Sends,
                    });
                    in_degree += 1;
                    in_sum += spent.value;
                }
            }
            (in_degree, in_sum)
        };

        let rows = &mut self.resolved.rows;
        rows.transactions.push(TransactionRow {
            txid,
            date: date.to_string(),
            in_degree,
            out_degree: descriptor.len() as u32,
            in_sum: Btc(in_sum),
            out_sum: Btc(out_sum),
        });
        rows.belongs.push(BelongsRow {
            txid,
            block_hash,
            label: Label::BelongsTo,
        });

        self.resolved.stats.transactions += 1;
    }

    /// Fetches the output spent by `outpoint`, counting the lookup as resolved or missed.
    fn lookup(&mut self, outpoint: &OutPoint) -> Option<IndexedOutput> {
        let descriptor = match self.reader.get(&outpoint.txid) {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) => {
                tracing::warn!("Output {outpoint} not found in the index");
                self.resolved.stats.missed_inputs += 1;
                return None;
            }
            Err(err) => {
                tracing::warn!("Failed to look up output {outpoint}: {err}");
                self.resolved.stats.missed_inputs += 1;
                return None;
            }
        };

        let Some(output) = descriptor.get(outpoint.vout).cloned() else {
            tracing::warn!(
                "Output {outpoint} is out of range, {} has {} outputs",
                outpoint.txid,
                descriptor.len()
            );
            self.resolved.stats.missed_inputs += 1;
            return None;
        };

        if self.track_spends {
            self.resolved.spent.push(SpentOutput {
                txid: outpoint.txid,
                vout: outpoint.vout,
                output_count: descriptor.len() as u32,
            });
        }
        self.resolved.stats.resolved_inputs += 1;

        Some(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_absorb() {
        let mut total = ResolveStats::default();
        let chunk = ResolveStats {
            blocks: 2,
            transactions: 5,
            resolved_inputs: 7,
            missed_inputs: 1,
            skipped_blocks: 1,
        };

        total.absorb(&chunk);
        total.absorb(&chunk);

        assert_eq!(total.blocks, 4);
        assert_eq!(total.transactions, 10);
        assert_eq!(total.resolved_inputs, 14);
        assert_eq!(total.missed_inputs, 2);
        assert_eq!(total.skipped_blocks, 2);
    }
}
