use mbp_engine::book::OrderBook;
use mbp_engine::event::{Action, MboEvent, Side, PX_SCALE};
use std::time::Instant;

fn parse_arg_usize(args: &[String], idx: usize, default: usize) -> usize {
    args.get(idx).and_then(|s| s.parse::<usize>().ok()).unwrap_or(default)
}

fn ev(action: Action, side: Side, px: i64, size: u64, order_id: u64, seq: u64) -> MboEvent {
    MboEvent {
        ts_event: 0,
        action,
        side,
        price: px,
        size,
        order_id,
        flags: 0,
        ts_in_delta: 0,
        sequence: seq,
    }
}

fn main() {
    // Args: [orders] [levels] [trades]
    let args: Vec<String> = std::env::args().collect();
    let orders = parse_arg_usize(&args, 1, 200_000);
    let levels = parse_arg_usize(&args, 2, 200);
    let trades = parse_arg_usize(&args, 3, 10_000);

    let mut book = OrderBook::new(orders);
    let mut seq: u64 = 0;
    let mut next_seq = || {
        seq += 1;
        seq
    };

    let base = 100 * PX_SCALE;
    let tick = PX_SCALE / 100;

    let start_total = Instant::now();

    // Phase 1: adds spread across the ladder, alternating sides
    let t0 = Instant::now();
    for i in 0..orders {
        let oid = (i + 1) as u64;
        let (side, px) = if i & 1 == 0 {
            (Side::Bid, base - ((i % levels) as i64 + 1) * tick)
        } else {
            (Side::Ask, base + ((i % levels) as i64 + 1) * tick)
        };
        let qty = 100 + (i % 50) as u64;
        book.apply(&ev(Action::Add, side, px, qty, oid, next_seq()));
    }
    let adds_dur = t0.elapsed();

    // Phase 2: partial cancels on roughly half the orders
    let t1 = Instant::now();
    let mut x: u64 = 0x9E3779B97F4A7C15; // xorshift64* state
    for _ in 0..orders / 2 {
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        x = x.wrapping_mul(0x2545F4914F6CDD1D);
        let oid = (x as usize % orders + 1) as u64;
        book.apply(&ev(Action::Cancel, Side::None, 0, 1 + (x & 0x3F), oid, next_seq()));
    }
    let cancels_dur = t1.elapsed();

    // Phase 3: T/F/C bursts against the top of each side
    let t2 = Instant::now();
    for i in 0..trades {
        let (aggressor, px) = if i & 1 == 0 {
            (Side::Bid, base + tick)
        } else {
            (Side::Ask, base - tick)
        };
        let qty = 10 + (i % 30) as u64;
        book.apply(&ev(Action::Trade, aggressor, px, qty, 0, next_seq()));
        book.apply(&ev(Action::Fill, aggressor.opposite(), px, qty, 0, next_seq()));
        book.apply(&ev(Action::Cancel, aggressor.opposite(), px, qty, 0, next_seq()));
    }
    let trades_dur = t2.elapsed();

    // Keep the image path hot too
    let img = book.top10();
    let total_events = orders + orders / 2 + trades * 3;
    let total_dur = start_total.elapsed();

    println!(
        "bench_book: orders={} levels={} trades={} live={} best_bid_sz={} total_events={} total_ms={:.3} adds_ms={:.3} cancels_ms={:.3} trades_ms={:.3} throughput_meps={:.3}",
        orders,
        levels,
        trades,
        book.order_count(),
        img.bid_sz[0],
        total_events,
        total_dur.as_secs_f64() * 1000.0,
        adds_dur.as_secs_f64() * 1000.0,
        cancels_dur.as_secs_f64() * 1000.0,
        trades_dur.as_secs_f64() * 1000.0,
        (total_events as f64) / 1_000_000.0 / total_dur.as_secs_f64(),
    );
}
