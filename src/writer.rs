// src/writer.rs
use crate::config::OutputCfg;
use crate::error::EngineError;
use crate::event::format_px;
use crate::snapshot::{MbpSnapshot, DEPTH};
use crate::util::format_ts;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// MBP-10 record type tag carried on every row.
const RTYPE: u32 = 10;

/// Buffered CSV sink for MBP-10 rows. The first column is a running row
/// index; prices render with two decimals and empty means "no level".
pub struct MbpCsvWriter {
    out: BufWriter<File>,
    path: PathBuf,
    publisher_id: u32,
    instrument_id: u32,
    symbol: String,
    rows: u64,
    buf: String,
}

impl MbpCsvWriter {
    pub fn create(cfg: &OutputCfg) -> Result<Self, EngineError> {
        let file = File::create(&cfg.path).map_err(|source| EngineError::Output {
            path: cfg.path.clone(),
            source,
        })?;
        let mut w = Self {
            out: BufWriter::with_capacity(cfg.buffer_bytes, file),
            path: cfg.path.clone(),
            publisher_id: cfg.publisher_id,
            instrument_id: cfg.instrument_id,
            symbol: cfg.symbol.clone(),
            rows: 0,
            buf: String::with_capacity(512),
        };
        w.write_header()?;
        Ok(w)
    }

    fn write_header(&mut self) -> Result<(), EngineError> {
        self.buf.clear();
        self.buf.push_str(
            ",ts_recv,ts_event,rtype,publisher_id,instrument_id,action,side,depth,price,size,flags,ts_in_delta,sequence",
        );
        for i in 0..DEPTH {
            let _ = write!(
                self.buf,
                ",bid_px_{i:02},bid_sz_{i:02},bid_ct_{i:02},ask_px_{i:02},ask_sz_{i:02},ask_ct_{i:02}"
            );
        }
        self.buf.push_str(",symbol,order_id\n");
        self.flush_buf()
    }

    pub fn write_snapshot(&mut self, snap: &MbpSnapshot) -> Result<(), EngineError> {
        self.buf.clear();
        let ts = format_ts(snap.ts_event);
        let _ = write!(
            self.buf,
            "{},{ts},{ts},{RTYPE},{},{},{},{},0,{},{},{},{},{}",
            self.rows,
            self.publisher_id,
            self.instrument_id,
            snap.action.as_char(),
            snap.side.as_char(),
            format_px(snap.price),
            snap.size,
            snap.flags,
            snap.ts_in_delta,
            snap.sequence,
        );
        let b = &snap.book;
        for i in 0..DEPTH {
            let _ = write!(
                self.buf,
                ",{},{},{},{},{},{}",
                format_px(b.bid_px[i]),
                b.bid_sz[i],
                b.bid_ct[i],
                format_px(b.ask_px[i]),
                b.ask_sz[i],
                b.ask_ct[i],
            );
        }
        let _ = writeln!(self.buf, ",{},{}", self.symbol, snap.order_id);
        self.rows += 1;
        self.flush_buf()
    }

    fn flush_buf(&mut self) -> Result<(), EngineError> {
        self.out
            .write_all(self.buf.as_bytes())
            .map_err(|source| EngineError::Output { path: self.path.clone(), source })
    }

    pub fn flush(&mut self) -> Result<(), EngineError> {
        self.out
            .flush()
            .map_err(|source| EngineError::Output { path: self.path.clone(), source })
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{parse_px, Action, Side};
    use crate::snapshot::Top10Image;

    fn test_cfg(name: &str) -> OutputCfg {
        let dir = std::env::temp_dir().join(format!("mbp-writer-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        OutputCfg {
            path: dir.join(name),
            buffer_bytes: 4096,
            publisher_id: 2,
            instrument_id: 1108,
            symbol: "ARL".to_string(),
        }
    }

    fn sample_snapshot() -> MbpSnapshot {
        let mut book = Top10Image::default();
        book.bid_px[0] = parse_px("5.51").unwrap();
        book.bid_sz[0] = 100;
        book.bid_ct[0] = 1;
        MbpSnapshot {
            ts_event: 1_752_739_503_360_677_248,
            action: Action::Add,
            side: Side::Bid,
            price: parse_px("5.51").unwrap(),
            size: 100,
            order_id: 817_593,
            flags: 130,
            ts_in_delta: 165_000,
            sequence: 851_012,
            book,
        }
    }

    #[test]
    fn header_has_76_columns() {
        let cfg = test_cfg("header.csv");
        let mut w = MbpCsvWriter::create(&cfg).unwrap();
        w.flush().unwrap();
        let text = std::fs::read_to_string(&cfg.path).unwrap();
        let header = text.lines().next().unwrap();
        let cols: Vec<&str> = header.split(',').collect();
        assert_eq!(cols.len(), 76);
        assert_eq!(cols[0], "");
        assert_eq!(cols[1], "ts_recv");
        assert_eq!(cols[14], "bid_px_00");
        assert_eq!(cols[19], "ask_ct_00");
        assert_eq!(cols[73], "ask_ct_09");
        assert_eq!(cols[74], "symbol");
        assert_eq!(cols[75], "order_id");
    }

    #[test]
    fn row_fields_follow_the_schema() {
        let cfg = test_cfg("row.csv");
        let mut w = MbpCsvWriter::create(&cfg).unwrap();
        w.write_snapshot(&sample_snapshot()).unwrap();
        w.flush().unwrap();
        assert_eq!(w.rows_written(), 1);

        let text = std::fs::read_to_string(&cfg.path).unwrap();
        let row: Vec<&str> = text.lines().nth(1).unwrap().split(',').collect();
        assert_eq!(row.len(), 76);
        assert_eq!(row[0], "0");
        assert_eq!(row[1], "2025-07-17T08:05:03.360677248Z");
        assert_eq!(row[2], row[1]);
        assert_eq!(row[3], "10");
        assert_eq!(row[4], "2");
        assert_eq!(row[5], "1108");
        assert_eq!(row[6], "A");
        assert_eq!(row[7], "B");
        assert_eq!(row[8], "0");
        assert_eq!(row[9], "5.51");
        assert_eq!(row[10], "100");
        assert_eq!(row[11], "130");
        assert_eq!(row[12], "165000");
        assert_eq!(row[13], "851012");
        assert_eq!(row[14], "5.51");
        assert_eq!(row[15], "100");
        assert_eq!(row[16], "1");
        // Empty ask level renders as empty price, zero size, zero count.
        assert_eq!(row[17], "");
        assert_eq!(row[18], "0");
        assert_eq!(row[19], "0");
        assert_eq!(row[74], "ARL");
        assert_eq!(row[75], "817593");
    }

    #[test]
    fn row_index_increments() {
        let cfg = test_cfg("index.csv");
        let mut w = MbpCsvWriter::create(&cfg).unwrap();
        w.write_snapshot(&sample_snapshot()).unwrap();
        w.write_snapshot(&sample_snapshot()).unwrap();
        w.flush().unwrap();
        let text = std::fs::read_to_string(&cfg.path).unwrap();
        let firsts: Vec<&str> = text
            .lines()
            .skip(1)
            .map(|l| l.split(',').next().unwrap())
            .collect();
        assert_eq!(firsts, ["0", "1"]);
    }
}
