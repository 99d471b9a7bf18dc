use crate::portfolio::Tx;
use crate::util::rw::{DescribedReader, WriteHandle};

use super::tx_csv::{parse_tx_csv, TxCsvParseOptions};

type Error = String;

/// Reads every csv, and merges their txs into a single list sorted by date.
/// Txs on the same date keep the order in which they were read, across
/// files as well as within them.
pub fn load_txs(
    csv_readers: &[DescribedReader],
    parse_options: &TxCsvParseOptions,
    err_stream: &mut WriteHandle,
) -> Result<Vec<Tx>, Error> {
    let mut all_txs = Vec::<Tx>::new();
    let mut global_read_index: u32 = 0;
    for csv_reader in csv_readers {
        let txs = parse_tx_csv(csv_reader, global_read_index, parse_options, err_stream)?;
        global_read_index += txs.len() as u32;
        tracing::debug!("load_txs: read {} txs from {}", txs.len(), csv_reader.desc());
        all_txs.extend(txs);
    }

    all_txs.sort();
    Ok(all_txs)
}
