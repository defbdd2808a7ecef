//! Append-only CSV output.

use crate::{AddressRow, ChunkRows, Result, COINBASE_ADDRESS};
use csv::{Writer, WriterBuilder};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

type CsvFile = Writer<BufWriter<File>>;

/// The seven output files, each opened with its header row.
pub struct RowWriter {
    out_dir: PathBuf,
    addresses: CsvFile,
    blocks: CsvFile,
    transactions: CsvFile,
    precedes: CsvFile,
    belongs: CsvFile,
    receives: CsvFile,
    sends: CsvFile,
    rows_written: u64,
}

fn create_file(out_dir: &Path, name: &str, header: &[&str]) -> Result<CsvFile> {
    let file = File::create(out_dir.join(name))?;
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(file));
    writer.write_record(header)?;
    Ok(writer)
}

fn write_all<T: Serialize>(writer: &mut CsvFile, rows: &[T]) -> Result<()> {
    for row in rows {
        writer.serialize(row)?;
    }
    Ok(())
}

impl RowWriter {
    /// Creates `out_dir` if needed and truncates any previous output in it.
    pub fn create(out_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(out_dir)?;

        let mut addresses = create_file(out_dir, "addresses.csv", &["address"])?;
        // Coinbase transactions are sent from this pseudo-address, which no output pays to.
        addresses.serialize(AddressRow {
            address: COINBASE_ADDRESS.to_string(),
        })?;

        let writer = Self {
            out_dir: out_dir.to_path_buf(),
            addresses,
            blocks: create_file(out_dir, "blocks.csv", &["hash", "height", "timestamp"])?,
            transactions: create_file(
                out_dir,
                "transactions.csv",
                &["txid", "date", "in_degree", "out_degree", "in_sum", "out_sum"],
            )?,
            precedes: create_file(out_dir, "before-rel.csv", &["from_hash", "to_hash", "label"])?,
            belongs: create_file(out_dir, "belongs-rel.csv", &["txid", "block_hash", "label"])?,
            receives: create_file(
                out_dir,
                "receives-rel.csv",
                &["txid", "value", "output_position", "address", "label"],
            )?,
            sends: create_file(out_dir, "sends-rel.csv", &["address", "value", "txid", "label"])?,
            rows_written: 0,
        };

        tracing::info!("Writing CSV files to {}", out_dir.display());

        Ok(writer)
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Data rows written so far, headers and the coinbase row excluded.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Appends the rows of one chunk.
    pub fn append(&mut self, rows: &ChunkRows) -> Result<()> {
        write_all(&mut self.addresses, &rows.addresses)?;
        write_all(&mut self.blocks, &rows.blocks)?;
        write_all(&mut self.transactions, &rows.transactions)?;
        write_all(&mut self.precedes, &rows.precedes)?;
        write_all(&mut self.belongs, &rows.belongs)?;
        write_all(&mut self.receives, &rows.receives)?;
        write_all(&mut self.sends, &rows.sends)?;
        self.rows_written += rows.len() as u64;
        Ok(())
    }

    /// Writes buffered rows of every file through to durable storage.
    pub fn flush(&mut self) -> Result<()> {
        for writer in [
            &mut self.addresses,
            &mut self.blocks,
            &mut self.transactions,
            &mut self.precedes,
            &mut self.belongs,
            &mut self.receives,
            &mut self.sends,
        ] {
            writer.flush()?;
            writer.get_ref().get_ref().sync_data()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Btc, Label, SendsRow};
    use bitcoin::hashes::Hash;

    fn read(dir: &Path, name: &str) -> String {
        std::fs::read_to_string(dir.join(name)).unwrap()
    }

    #[test]
    fn test_headers_and_coinbase_row() {
        let dir = tempfile::tempdir().unwrap();

        let mut writer = RowWriter::create(dir.path()).unwrap();
        writer.flush().unwrap();

        assert_eq!(read(dir.path(), "addresses.csv"), "address\ncoinbase\n");
        assert_eq!(read(dir.path(), "blocks.csv"), "hash,height,timestamp\n");
        assert_eq!(
            read(dir.path(), "transactions.csv"),
            "txid,date,in_degree,out_degree,in_sum,out_sum\n"
        );
        assert_eq!(read(dir.path(), "before-rel.csv"), "from_hash,to_hash,label\n");
        assert_eq!(read(dir.path(), "belongs-rel.csv"), "txid,block_hash,label\n");
        assert_eq!(
            read(dir.path(), "receives-rel.csv"),
            "txid,value,output_position,address,label\n"
        );
        assert_eq!(read(dir.path(), "sends-rel.csv"), "address,value,txid,label\n");
        assert_eq!(writer.rows_written(), 0);
    }

    #[test]
    fn test_append_writes_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RowWriter::create(dir.path()).unwrap();

        let sends = |address: &str| SendsRow {
            address: address.to_string(),
            value: Btc(150_000_000),
            txid: bitcoin::Txid::all_zeros(),
            label: Label::Sends,
        };

        writer
            .append(&ChunkRows {
                sends: vec![sends("a"), sends("b")],
                ..Default::default()
            })
            .unwrap();
        writer
            .append(&ChunkRows {
                sends: vec![sends("c")],
                ..Default::default()
            })
            .unwrap();
        writer.flush().unwrap();

        let zeros = "0".repeat(64);
        assert_eq!(
            read(dir.path(), "sends-rel.csv"),
            format!(
                "address,value,txid,label\na,1.5,{zeros},SENDS\nb,1.5,{zeros},SENDS\nc,1.5,{zeros},SENDS\n"
            )
        );
        assert_eq!(writer.rows_written(), 3);
    }

    #[test]
    fn test_each_flush_reaches_the_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RowWriter::create(dir.path()).unwrap();

        let address = |address: &str| AddressRow {
            address: address.to_string(),
        };

        writer
            .append(&ChunkRows {
                addresses: vec![address("a")],
                ..Default::default()
            })
            .unwrap();
        writer.flush().unwrap();
        assert_eq!(read(dir.path(), "addresses.csv"), "address\ncoinbase\na\n");

        writer
            .append(&ChunkRows {
                addresses: vec![address("b")],
                ..Default::default()
            })
            .unwrap();
        writer.flush().unwrap();

        assert_eq!(read(dir.path(), "addresses.csv"), "address\ncoinbase\na\nb\n");
    }
}
