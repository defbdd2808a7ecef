//! Spent-descriptor tracking.
//!
//! A descriptor can be deleted from the index once every one of its positions has been
//! consumed by an input. Deleting after the first observed spend is wrong as soon as a
//! transaction has more than one output, so the tracker counts consumed positions per
//! descriptor and only reports a txid when that count reaches the descriptor length.

use bitcoin::Txid;
use std::collections::{HashMap, HashSet};

/// An input that resolved against the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpentOutput {
    /// Transaction that created the output.
    pub txid: Txid,
    /// Position of the consumed output.
    pub vout: u32,
    /// Number of outputs in the creating transaction's descriptor.
    pub output_count: u32,
}

/// Remaining-position bookkeeping for partially spent descriptors.
///
/// Lives on the coordinator; workers only report [`SpentOutput`]s.
#[derive(Debug, Default)]
pub struct PruneTracker {
    consumed: HashMap<Txid, HashSet<u32>>,
}

impl PruneTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `spends` and returns the txids whose outputs are now all spent.
    ///
    /// Each returned txid is forgotten by the tracker.
    pub fn observe(&mut self, spends: impl IntoIterator<Item = SpentOutput>) -> Vec<Txid> {
        let mut exhausted = Vec::new();

        for SpentOutput {
            txid,
            vout,
            output_count,
        } in spends
        {
            if vout >= output_count {
                continue;
            }

            let consumed = self.consumed.entry(txid).or_default();
            consumed.insert(vout);

            if consumed.len() == output_count as usize {
                self.consumed.remove(&txid);
                exhausted.push(txid);
            }
        }

        exhausted
    }

    /// Number of descriptors with at least one, but not all, positions spent.
    pub fn pending(&self) -> usize {
        self.consumed.len()
    }
}
