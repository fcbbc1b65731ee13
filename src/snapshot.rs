// src/snapshot.rs
use crate::event::{Action, Side};

/// Reported depth per side.
pub const DEPTH: usize = 10;

/// Fixed-size image of the top ten levels per side, zero-filled where the
/// book is shallower. Comparing two images is an element-wise check over
/// sixty scalars, so change detection is O(1) per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Top10Image {
    pub bid_px: [i64; DEPTH],
    pub bid_sz: [u64; DEPTH],
    pub bid_ct: [u32; DEPTH],
    pub ask_px: [i64; DEPTH],
    pub ask_sz: [u64; DEPTH],
    pub ask_ct: [u32; DEPTH],
}

/// One output row: the triggering event's metadata plus the book image taken
/// after that event was applied.
#[derive(Debug, Clone)]
pub struct MbpSnapshot {
    pub ts_event: u64,
    pub action: Action,
    pub side: Side,
    pub price: i64,
    pub size: u64,
    pub order_id: u64,
    pub flags: u32,
    pub ts_in_delta: i32,
    pub sequence: u64,
    pub book: Top10Image,
}
