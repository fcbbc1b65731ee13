use mbp_engine::config::{AppConfig, EmitMode};
use mbp_engine::replay::replay_file;
use std::fs;
use std::path::PathBuf;

const HEADER: &str = "ts_recv,ts_event,rtype,publisher_id,instrument_id,action,side,price,size,channel_id,order_id,flags,ts_in_delta,sequence,symbol";
const TS: &str = "2025-07-17T08:05:03.360677248Z";

fn row(action: &str, side: &str, price: &str, size: u64, order_id: u64, seq: u64) -> String {
    format!("{TS},{TS},160,2,1108,{action},{side},{price},{size},0,{order_id},0,0,{seq},ARL")
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mbp-replay-{}-{}", std::process::id(), name));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn run(name: &str, rows: &[String], emit: EmitMode) -> Vec<String> {
    let dir = scratch_dir(name);
    let input = dir.join("mbo.csv");
    let output = dir.join("mbp.csv");
    fs::write(&input, format!("{HEADER}\n{}\n", rows.join("\n"))).unwrap();

    let mut cfg = AppConfig::default();
    cfg.output.path = output.clone();
    cfg.book.emit = emit;
    replay_file(&cfg, &input).unwrap();

    fs::read_to_string(&output)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn full_session_end_to_end() {
    let rows = vec![
        row("R", "N", "", 0, 0, 1),
        row("A", "B", "5.51", 100, 817593, 2),
        row("A", "A", "21.33", 100, 111, 3),
        row("A", "B", "5.51", 50, 112, 4),
        // Unknown order: tolerated, image unchanged, no row under on-change.
        row("C", "B", "5.51", 0, 999, 5),
        // One fused trade against the resting ask.
        row("T", "B", "21.33", 40, 0, 6),
        row("F", "A", "21.33", 40, 111, 7),
        row("C", "A", "21.33", 40, 111, 8),
    ];
    let lines = run("session", &rows, EmitMode::OnChange);

    // Header plus: reset, three adds, one trade row.
    assert_eq!(lines.len(), 6);

    let reset: Vec<&str> = lines[1].split(',').collect();
    assert_eq!(reset[6], "R");
    assert_eq!(reset[7], "N");
    assert_eq!(reset[9], "");
    assert_eq!(reset[14], "");
    assert_eq!(reset[15], "0");

    let first_add: Vec<&str> = lines[2].split(',').collect();
    assert_eq!(first_add[0], "1");
    assert_eq!(first_add[1], TS);
    assert_eq!(first_add[6], "A");
    assert_eq!(first_add[7], "B");
    assert_eq!(first_add[13], "2");
    assert_eq!(first_add[14], "5.51");
    assert_eq!(first_add[15], "100");
    assert_eq!(first_add[16], "1");

    // Second add at the same bid price stacks the level.
    let third_add: Vec<&str> = lines[4].split(',').collect();
    assert_eq!(third_add[14], "5.51");
    assert_eq!(third_add[15], "150");
    assert_eq!(third_add[16], "2");

    // The trade row carries the C's sequence, the T's payload, the F's side.
    let trade: Vec<&str> = lines[5].split(',').collect();
    assert_eq!(trade[6], "T");
    assert_eq!(trade[7], "A");
    assert_eq!(trade[9], "21.33");
    assert_eq!(trade[10], "40");
    assert_eq!(trade[13], "8");
    assert_eq!(trade[17], "21.33");
    assert_eq!(trade[18], "60");
    assert_eq!(trade[19], "1");
    assert_eq!(trade[75], "0");
}

#[test]
fn deep_book_changes_are_suppressed() {
    let mut rows: Vec<String> = (0..12)
        .map(|i| row("A", "B", &format!("{}.00", 100 - i), 10, i + 1, i + 1))
        .collect();
    rows.push(row("A", "B", "89.00", 10, 99, 13));
    let lines = run("deep", &rows, EmitMode::OnChange);

    // Only the ten visible adds emit; ranks eleven and twelve never show,
    // and neither does the extra order at the twelfth-best price.
    assert_eq!(lines.len(), 1 + 10);
}

#[test]
fn every_event_mode_emits_suppressed_rows_too() {
    let rows = vec![
        row("A", "B", "5.51", 100, 1, 1),
        // Stale cancel: no book change, still a row in every-event mode.
        row("C", "B", "5.51", 0, 999, 2),
    ];
    let lines = run("permissive", &rows, EmitMode::EveryEvent);
    assert_eq!(lines.len(), 3);
    let stale: Vec<&str> = lines[2].split(',').collect();
    assert_eq!(stale[6], "C");
    assert_eq!(stale[7], "N");
    assert_eq!(stale[14], "5.51");
    assert_eq!(stale[15], "100");
}

#[test]
fn malformed_rows_do_not_stop_the_run() {
    let rows = vec![
        row("A", "B", "5.51", 100, 1, 1),
        "this is not a valid row at all".to_string(),
        row("C", "B", "5.51", 0, 1, 2),
    ];
    let lines = run("malformed", &rows, EmitMode::OnChange);
    // Add row plus the cancel that empties the book.
    assert_eq!(lines.len(), 3);
    let cancel: Vec<&str> = lines[2].split(',').collect();
    assert_eq!(cancel[6], "C");
    assert_eq!(cancel[14], "");
    assert_eq!(cancel[15], "0");
}
