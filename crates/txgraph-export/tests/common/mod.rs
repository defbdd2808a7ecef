#![allow(dead_code)]

use bitcoin::block::{Header, Version};
use bitcoin::constants::genesis_block;
use bitcoin::hashes::Hash;
use bitcoin::{
    absolute, transaction, Address, Amount, Block, BlockHash, CompactTarget, Network, OutPoint,
    PubkeyHash, ScriptBuf, Sequence, Transaction, TxIn, TxMerkleNode, TxOut, Witness,
};
use std::path::Path;
use txgraph_export::{build_chunk, Chunk, MemoryBlockSource};
use txgraph_index::{IndexStore, Resolving, StoreTuning};

pub const COIN: u64 = 100_000_000;

pub fn p2pkh(seed: u8) -> ScriptBuf {
    ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array([seed; 20]))
}

pub fn address(seed: u8) -> String {
    Address::p2pkh(PubkeyHash::from_byte_array([seed; 20]), Network::Bitcoin).to_string()
}

/// `OP_TRUE`, a script with no destination address.
pub fn anyone_can_spend() -> ScriptBuf {
    ScriptBuf::from_bytes(vec![0x51])
}

fn outputs(outputs: Vec<(u64, ScriptBuf)>) -> Vec<TxOut> {
    outputs
        .into_iter()
        .map(|(sats, script_pubkey)| TxOut {
            value: Amount::from_sat(sats),
            script_pubkey,
        })
        .collect()
}

pub fn coinbase(height: u32, outs: Vec<(u64, ScriptBuf)>) -> Transaction {
    Transaction {
        version: transaction::Version::ONE,
        lock_time: absolute::LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            // Height in the script keeps coinbase txids unique.
            script_sig: ScriptBuf::from_bytes(height.to_le_bytes().to_vec()),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: outputs(outs),
    }
}

pub fn spend(inputs: Vec<OutPoint>, outs: Vec<(u64, ScriptBuf)>) -> Transaction {
    Transaction {
        version: transaction::Version::TWO,
        lock_time: absolute::LockTime::ZERO,
        input: inputs
            .into_iter()
            .map(|previous_output| TxIn {
                previous_output,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            })
            .collect(),
        output: outputs(outs),
    }
}

pub fn outpoint(tx: &Transaction, vout: u32) -> OutPoint {
    OutPoint::new(tx.compute_txid(), vout)
}

/// Chain of synthetic blocks on top of the mainnet genesis block.
pub struct ChainBuilder {
    blocks: Vec<Block>,
}

impl ChainBuilder {
    pub fn new() -> Self {
        Self {
            blocks: vec![genesis_block(Network::Bitcoin)],
        }
    }

    pub fn tip(&self) -> &Block {
        self.blocks.last().unwrap()
    }

    pub fn height(&self) -> u32 {
        self.blocks.len() as u32 - 1
    }

    /// Appends a block ten minutes after the tip.
    pub fn push(&mut self, txdata: Vec<Transaction>) -> BlockHash {
        let header = Header {
            version: Version::ONE,
            prev_blockhash: self.tip().block_hash(),
            merkle_root: TxMerkleNode::all_zeros(),
            time: self.tip().header.time + 600,
            bits: CompactTarget::from_consensus(0x207fffff),
            nonce: 0,
        };
        let block = Block { header, txdata };
        let hash = block.block_hash();
        self.blocks.push(block);
        hash
    }

    /// Appends a block holding a single coinbase paying `value` to `seed`'s address.
    pub fn push_coinbase(&mut self, value: u64, seed: u8) -> Transaction {
        let tx = coinbase(self.height() + 1, vec![(value, p2pkh(seed))]);
        self.push(vec![tx.clone()]);
        tx
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn source(&self) -> MemoryBlockSource {
        MemoryBlockSource::new(self.blocks.clone())
    }

    /// Source whose block at `height` is cut short so that it no longer decodes.
    pub fn source_with_truncated(&self, height: u32) -> MemoryBlockSource {
        MemoryBlockSource::from_raw(self.blocks.iter().enumerate().map(|(i, block)| {
            let mut raw_block = bitcoin::consensus::serialize(block);
            if i == height as usize {
                raw_block.truncate(raw_block.len() / 2);
            }
            raw_block
        }))
    }
}

pub fn tuning() -> StoreTuning {
    StoreTuning::with_memory_budget(64 * 1024 * 1024)
}

/// Builds a completed index over every block of `source` in one chunk.
pub fn build_index(source: &MemoryBlockSource, dir: &Path) -> IndexStore<Resolving> {
    use txgraph_export::BlockSource;

    let end = source.block_count();
    let built = build_chunk(source, Chunk { start: 0, end }, Network::Bitcoin).unwrap();

    let store = IndexStore::create(dir, tuning()).unwrap();
    store.insert_batch(built.entries).unwrap();
    store.finish(0..end).unwrap()
}
