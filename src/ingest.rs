// src/ingest.rs
use crate::error::EngineError;
use crate::event::{parse_px, Action, MboEvent, Side};
use crate::metrics;
use crate::util::parse_ts;
use log::warn;
use smallvec::SmallVec;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

const READ_BUFFER: usize = 64 * 1024;

/// Column positions resolved from the header row. Feeds are allowed to carry
/// extra columns (ts_recv, rtype, channel_id, symbol, ...) in any order; only
/// the ones below are consumed.
#[derive(Debug, Clone, Copy)]
struct Columns {
    ts_event: usize,
    action: usize,
    side: usize,
    price: usize,
    size: usize,
    order_id: usize,
    flags: Option<usize>,
    ts_in_delta: Option<usize>,
    sequence: Option<usize>,
}

impl Columns {
    fn from_header(header: &str) -> Result<Self, EngineError> {
        let mut ts_event = None;
        let mut action = None;
        let mut side = None;
        let mut price = None;
        let mut size = None;
        let mut order_id = None;
        let mut flags = None;
        let mut ts_in_delta = None;
        let mut sequence = None;
        for (i, name) in header.split(',').enumerate() {
            match name.trim() {
                "ts_event" => ts_event = Some(i),
                "action" => action = Some(i),
                "side" => side = Some(i),
                "price" => price = Some(i),
                "size" => size = Some(i),
                "order_id" => order_id = Some(i),
                "flags" => flags = Some(i),
                "ts_in_delta" => ts_in_delta = Some(i),
                "sequence" => sequence = Some(i),
                _ => {}
            }
        }
        let need = |v: Option<usize>, column: &'static str| v.ok_or(EngineError::BadHeader { column });
        Ok(Self {
            ts_event: need(ts_event, "ts_event")?,
            action: need(action, "action")?,
            side: need(side, "side")?,
            price: need(price, "price")?,
            size: need(size, "size")?,
            order_id: need(order_id, "order_id")?,
            flags,
            ts_in_delta,
            sequence,
        })
    }
}

/// Streaming MBO reader: one buffered pass over the file, normalizing each
/// row into an `MboEvent`.
#[derive(Debug)]
pub struct MboReader {
    path: PathBuf,
    rdr: BufReader<File>,
    cols: Columns,
    line: String,
    line_no: u64,
}

impl MboReader {
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let file = File::open(path).map_err(|source| EngineError::InputOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let mut rdr = BufReader::with_capacity(READ_BUFFER, file);
        let mut header = String::new();
        rdr.read_line(&mut header).map_err(|source| EngineError::InputRead {
            path: path.to_path_buf(),
            source,
        })?;
        let cols = Columns::from_header(header.trim_end())?;
        Ok(Self {
            path: path.to_path_buf(),
            rdr,
            cols,
            line: String::new(),
            line_no: 1,
        })
    }

    /// Next well-formed event, or `None` at end of stream. Malformed rows are
    /// skipped with a warning; only I/O failures surface as errors.
    pub fn next_event(&mut self) -> Result<Option<MboEvent>, EngineError> {
        loop {
            self.line.clear();
            let n = self.rdr.read_line(&mut self.line).map_err(|source| {
                EngineError::InputRead { path: self.path.clone(), source }
            })?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let line = self.line.trim_end();
            if line.is_empty() {
                continue;
            }
            metrics::inc_rows_parsed();
            match parse_row(line, &self.cols) {
                Some(ev) => return Ok(Some(ev)),
                None => {
                    metrics::inc_rows_malformed();
                    warn!("{}:{}: skipping malformed row", self.path.display(), self.line_no);
                }
            }
        }
    }
}

fn parse_row(line: &str, cols: &Columns) -> Option<MboEvent> {
    let fields: SmallVec<[&str; 20]> = line.split(',').collect();
    let get = |i: usize| fields.get(i).copied();
    let opt = |i: Option<usize>| i.and_then(get).unwrap_or("");

    Some(MboEvent {
        ts_event: parse_ts(get(cols.ts_event)?)?,
        action: Action::from_char(get(cols.action)?.chars().next()?),
        side: Side::from_char(get(cols.side)?.chars().next().unwrap_or('N')),
        price: parse_px(get(cols.price)?)?,
        size: parse_u64(get(cols.size)?)?,
        order_id: parse_u64(get(cols.order_id)?)?,
        flags: parse_u64(opt(cols.flags))? as u32,
        ts_in_delta: parse_i32(opt(cols.ts_in_delta))?,
        sequence: parse_u64(opt(cols.sequence))?,
    })
}

fn parse_u64(s: &str) -> Option<u64> {
    if s.is_empty() {
        Some(0)
    } else {
        s.parse().ok()
    }
}

fn parse_i32(s: &str) -> Option<i32> {
    if s.is_empty() {
        Some(0)
    } else {
        s.parse().ok()
    }
}
