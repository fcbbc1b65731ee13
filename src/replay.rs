// src/replay.rs
use crate::book::{OrderBook, Outcome};
use crate::config::{AppConfig, EmitMode};
use crate::error::EngineError;
use crate::event::Action;
use crate::ingest::MboReader;
use crate::metrics;
use crate::writer::MbpCsvWriter;
use log::info;
use std::path::Path;

/// End-of-run totals reported by the driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct Summary {
    pub events: u64,
    pub snapshots: u64,
    pub bid_levels: usize,
    pub ask_levels: usize,
    pub live_orders: usize,
}

const PROGRESS_EVERY: u64 = 1_000_000;

/// Drives the whole pipeline over one input file: read, apply, diff the
/// top-10 image, write. Single thread, forward only.
pub fn replay_file(cfg: &AppConfig, input: &Path) -> Result<Summary, EngineError> {
    let mut reader = MboReader::open(input)?;
    let mut writer = MbpCsvWriter::create(&cfg.output)?;
    let mut book = OrderBook::new(cfg.book.order_capacity);

    let mut events: u64 = 0;
    while let Some(ev) = reader.next_event()? {
        events += 1;
        metrics::inc_events_applied();
        if events % PROGRESS_EVERY == 0 {
            let (bid, ask) = book.bbo();
            metrics::set_live_orders(book.order_count());
            info!(
                "events={} snapshots={} live_orders={} bbo_bid={:?} bbo_ask={:?}",
                events,
                writer.rows_written(),
                book.order_count(),
                bid,
                ask
            );
        }

        let before = book.top10();
        let out = book.apply(&ev);
        if !out.emit {
            continue;
        }
        let after = book.top10();
        if !should_write(&out, before == after, cfg.book.emit) {
            metrics::inc_snapshots_suppressed();
            continue;
        }

        let mut snap = book.snapshot(&ev);
        snap.action = out.action;
        snap.side = out.side;
        if let Some(fill) = out.trade {
            // A fused T/F/C row keeps the closing event's sequence and
            // timestamp but reports the trade the opening T announced.
            snap.price = fill.price;
            snap.size = fill.size;
            snap.order_id = fill.order_id;
        }
        writer.write_snapshot(&snap)?;
        metrics::inc_snapshots_written();
    }

    writer.flush()?;
    metrics::set_live_orders(book.order_count());
    Ok(Summary {
        events,
        snapshots: writer.rows_written(),
        bid_levels: book.bid_level_count(),
        ask_levels: book.ask_level_count(),
        live_orders: book.order_count(),
    })
}

/// Resets and completed trades always produce a row; everything else must
/// move the visible ten levels unless every-event mode is on.
fn should_write(out: &Outcome, unchanged: bool, mode: EmitMode) -> bool {
    if matches!(out.action, Action::Reset) || out.trade.is_some() {
        return true;
    }
    match mode {
        EmitMode::EveryEvent => true,
        EmitMode::OnChange => !unchanged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::TradeFill;
    use crate::event::Side;

    fn outcome(action: Action, trade: Option<TradeFill>) -> Outcome {
        Outcome { emit: true, action, side: Side::None, trade }
    }

    #[test]
    fn unchanged_image_is_suppressed_by_default() {
        let out = outcome(Action::Cancel, None);
        assert!(!should_write(&out, true, EmitMode::OnChange));
        assert!(should_write(&out, false, EmitMode::OnChange));
    }

    #[test]
    fn permissive_mode_writes_regardless() {
        let out = outcome(Action::Cancel, None);
        assert!(should_write(&out, true, EmitMode::EveryEvent));
    }

    #[test]
    fn resets_and_trades_bypass_the_diff() {
        let reset = outcome(Action::Reset, None);
        assert!(should_write(&reset, true, EmitMode::OnChange));

        let trade = outcome(
            Action::Trade,
            Some(TradeFill { price: 1, size: 1, order_id: 0 }),
        );
        assert!(should_write(&trade, true, EmitMode::OnChange));
    }
}
