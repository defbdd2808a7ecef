//! Row types of the seven output files.

use bitcoin::{Amount, BlockHash, Denomination, Txid};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Pseudo-address every coinbase transaction is sent from.
pub const COINBASE_ADDRESS: &str = "coinbase";

/// Relationship type carried by every edge row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    Precedes,
    BelongsTo,
    Receives,
    Sends,
}

/// Satoshi amount rendered as a BTC decimal without trailing zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Btc(pub u64);

impl std::fmt::Display for Btc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            Amount::from_sat(self.0).display_in(Denomination::Bitcoin)
        )
    }
}

impl Serialize for Btc {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn block_time(time: u32) -> DateTime<Utc> {
    DateTime::from_timestamp(i64::from(time), 0).unwrap_or_default()
}

/// Minute-precision UTC timestamp of a block header time.
pub(crate) fn format_timestamp(time: u32) -> String {
    block_time(time).format("%Y-%m-%dT%H:%M").to_string()
}

/// UTC calendar date of a block header time.
pub(crate) fn format_date(time: u32) -> String {
    block_time(time).format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressRow {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockRow {
    pub hash: BlockHash,
    pub height: u32,
    pub timestamp: String,
}

/// Per-transaction aggregates.
///
/// `in_degree` counts resolved inputs only, so it stays below the input count when some
/// referenced outputs were not found in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRow {
    pub txid: Txid,
    pub date: String,
    pub in_degree: u32,
    pub out_degree: u32,
    pub in_sum: Btc,
    pub out_sum: Btc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrecedesRow {
    pub from_hash: BlockHash,
    pub to_hash: BlockHash,
    pub label: Label,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BelongsRow {
    pub txid: Txid,
    pub block_hash: BlockHash,
    pub label: Label,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivesRow {
    pub txid: Txid,
    pub value: Btc,
    pub output_position: u32,
    pub address: String,
    pub label: Label,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendsRow {
    pub address: String,
    pub value: Btc,
    pub txid: Txid,
    pub label: Label,
}

/// Rows produced by one resolution chunk, one vector per output file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkRows {
    pub addresses: Vec<AddressRow>,
    pub blocks: Vec<BlockRow>,
    pub transactions: Vec<TransactionRow>,
    pub precedes: Vec<PrecedesRow>,
    pub belongs: Vec<BelongsRow>,
    pub receives: Vec<ReceivesRow>,
    pub sends: Vec<SendsRow>,
}

impl ChunkRows {
    /// Total number of rows across all files.
    pub fn len(&self) -> usize {
        self.addresses.len()
            + self.blocks.len()
            + self.transactions.len()
            + self.precedes.len()
            + self.belongs.len()
            + self.receives.len()
            + self.sends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_btc_rendering() {
        assert_eq!(Btc(5_050_000_000).to_string(), "50.5");
        assert_eq!(Btc(5_000_000_000).to_string(), "50");
        assert_eq!(Btc(1).to_string(), "0.00000001");
        assert_eq!(Btc(0).to_string(), "0");
    }

    #[test]
    fn test_block_time_formats() {
        // Genesis block header time.
        assert_eq!(format_timestamp(1_231_006_505), "2009-01-03T18:15");
        assert_eq!(format_date(1_231_006_505), "2009-01-03");
    }

    #[test]
    fn test_label_serialization() {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer
            .serialize(SendsRow {
                address: COINBASE_ADDRESS.to_string(),
                value: Btc(5_050_000_000),
                txid: bitcoin::hashes::Hash::all_zeros(),
                label: Label::Sends,
            })
            .unwrap();

        let line = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(line, format!("coinbase,50.5,{},SENDS\n", "0".repeat(64)));
    }
}
