//! Output descriptors, the values stored in the index.

use bitcoin::{Address, Network, Script, Transaction, Txid};
use serde::{Deserialize, Serialize};

/// Rendering of an output whose script does not decode to a single address.
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// A single transaction output as recorded in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedOutput {
    /// Value in satoshis.
    pub value: u64,
    /// Destination address, `None` when the script could not be decoded.
    pub address: Option<String>,
    /// Position of the output within its transaction.
    pub vout: u32,
}

impl IndexedOutput {
    /// Returns the address, or [`UNKNOWN_ADDRESS`] for undecodable scripts.
    pub fn address_or_unknown(&self) -> &str {
        self.address.as_deref().unwrap_or(UNKNOWN_ADDRESS)
    }
}

/// All outputs of one transaction, ordered by position.
///
/// Undecodable outputs keep their slot: later inputs reference outputs by position,
/// so dropping them would shift every following output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDescriptor {
    pub outputs: Vec<IndexedOutput>,
}

impl OutputDescriptor {
    /// Extracts the descriptor of `tx`, resolving addresses for `network`.
    pub fn from_transaction(tx: &Transaction, network: Network) -> Self {
        let outputs = tx
            .output
            .iter()
            .enumerate()
            .map(|(vout, txout)| IndexedOutput {
                value: txout.value.to_sat(),
                address: resolve_address(&txout.script_pubkey, network),
                vout: vout as u32,
            })
            .collect();

        Self { outputs }
    }

    /// Returns the output at position `vout`.
    pub fn get(&self, vout: u32) -> Option<&IndexedOutput> {
        self.outputs
            .get(vout as usize)
            .filter(|output| output.vout == vout)
    }

    /// Number of outputs.
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Returns true if the transaction has no outputs.
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Sum of all output values in satoshis, resolvable or not.
    pub fn total_value(&self) -> u64 {
        self.outputs.iter().map(|output| output.value).sum()
    }

    /// Serialize to bytes for storage.
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

/// Decodes the single destination address of a locking script.
///
/// Bare pay-to-pubkey scripts, which fund most early coinbase outputs, are attributed to
/// the P2PKH address of their key.
pub fn resolve_address(script: &Script, network: Network) -> Option<String> {
    if let Ok(address) = Address::from_script(script, network) {
        return Some(address.to_string());
    }

    script
        .p2pk_public_key()
        .map(|public_key| Address::p2pkh(public_key.pubkey_hash(), network).to_string())
}

/// A descriptor serialized by a build worker, ready for insertion.
///
/// Encoding happens on the worker so the single writer only moves bytes.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub txid: Txid,
    pub encoded: Vec<u8>,
}

impl IndexEntry {
    pub fn new(txid: Txid, descriptor: &OutputDescriptor) -> Result<Self, bincode::Error> {
        Ok(Self {
            txid,
            encoded: descriptor.encode()?,
        })
    }
}
