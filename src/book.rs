// src/book.rs
use crate::error::Anomaly;
use crate::event::{Action, MboEvent, Side, PX_SCALE};
use crate::metrics;
use crate::snapshot::{MbpSnapshot, Top10Image, DEPTH};
use hashbrown::HashMap;
use log::warn;
use slab::Slab;
use smallvec::SmallVec;
use std::collections::BTreeMap;

type Handle = usize;

/// One resting order, threaded into its level's FIFO list.
#[derive(Clone, Debug)]
struct Node {
    order_id: u64,
    px: i64,
    qty: u64,
    side: Side,
    prev: Option<Handle>,
    next: Option<Handle>,
}

#[derive(Clone, Debug, Default)]
struct Level {
    head: Option<Handle>,
    tail: Option<Handle>,
    total_qty: u64,
    count: u32,
}

impl Level {
    #[inline]
    fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Iterate handles FIFO from head to tail.
    #[cfg(test)]
    fn iter_fifo<'a>(&self, orders: &'a Slab<Node>) -> LevelIter<'a> {
        LevelIter { orders, cur: self.head }
    }
}

#[cfg(test)]
struct LevelIter<'a> {
    orders: &'a Slab<Node>,
    cur: Option<Handle>,
}

#[cfg(test)]
impl<'a> Iterator for LevelIter<'a> {
    type Item = Handle;
    fn next(&mut self) -> Option<Self::Item> {
        let h = self.cur?;
        self.cur = self.orders[h].next;
        Some(h)
    }
}

/// What the driver should do with a just-applied event: whether a snapshot is
/// warranted at all, and which action/side the row carries.
#[derive(Debug, Clone, Copy)]
pub struct Outcome {
    pub emit: bool,
    pub action: Action,
    pub side: Side,
    pub trade: Option<TradeFill>,
}

/// Payload of a completed T/F/C sequence, attributed from the opening T.
#[derive(Debug, Clone, Copy)]
pub struct TradeFill {
    pub price: i64,
    pub size: u64,
    pub order_id: u64,
}

impl Outcome {
    #[inline]
    fn silent() -> Self {
        Self { emit: false, action: Action::Other, side: Side::None, trade: None }
    }

    #[inline]
    fn event(action: Action, side: Side) -> Self {
        Self { emit: true, action, side, trade: None }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingTrade {
    side: Side,
    px: i64,
    qty: u64,
    order_id: u64,
}

/// Trade-sequence recognizer. Tagged states make the abandon-and-replay rule
/// structural: an unexpected event cannot leave a half-armed flag behind.
#[derive(Debug, Clone, Copy)]
enum TradeState {
    Normal,
    AwaitingFill(PendingTrade),
    AwaitingCancel(PendingTrade, Side),
}

pub struct OrderBook {
    bids: BTreeMap<i64, Level>,
    asks: BTreeMap<i64, Level>,
    orders: Slab<Node>,
    index: HashMap<u64, Handle>,
    trade: TradeState,
    last_seq: u64,
}

impl OrderBook {
    pub fn new(order_capacity: usize) -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            orders: Slab::with_capacity(order_capacity),
            index: HashMap::with_capacity(order_capacity),
            trade: TradeState::Normal,
            last_seq: 0,
        }
    }

    #[inline]
    fn levels_mut(&mut self, side: Side) -> &mut BTreeMap<i64, Level> {
        debug_assert!(side != Side::None);
        match side {
            Side::Bid => &mut self.bids,
            _ => &mut self.asks,
        }
    }

    /// Applies one event. Sequence numbers must not go backwards; an event
    /// that does is ignored outright (zero sequence is exempt: it marks rows
    /// whose feed carried none).
    pub fn apply(&mut self, ev: &MboEvent) -> Outcome {
        if ev.sequence != 0 {
            if ev.sequence < self.last_seq {
                warn!(
                    "ignoring event with sequence {} after {}",
                    ev.sequence, self.last_seq
                );
                metrics::inc_anomaly(Anomaly::OutOfOrderSequence);
                return Outcome::silent();
            }
            self.last_seq = ev.sequence;
        }

        match self.trade {
            TradeState::Normal => self.apply_normal(ev),
            TradeState::AwaitingFill(pending) => {
                if ev.action == Action::Fill {
                    self.trade = TradeState::AwaitingCancel(pending, ev.side);
                    Outcome::silent()
                } else {
                    self.abandon(&pending, ev);
                    self.apply_normal(ev)
                }
            }
            TradeState::AwaitingCancel(pending, filled_side) => {
                if ev.action == Action::Cancel {
                    self.trade = TradeState::Normal;
                    self.fill_opposite(pending.side, pending.px, pending.qty);
                    Outcome {
                        emit: true,
                        action: Action::Trade,
                        side: filled_side,
                        trade: Some(TradeFill {
                            price: pending.px,
                            size: pending.qty,
                            order_id: pending.order_id,
                        }),
                    }
                } else {
                    self.abandon(&pending, ev);
                    self.apply_normal(ev)
                }
            }
        }
    }

    fn abandon(&mut self, pending: &PendingTrade, ev: &MboEvent) {
        warn!(
            "abandoning pending trade ({:.2} x {}): expected follow-on, got {:?}",
            pending.px as f64 / PX_SCALE as f64,
            pending.qty,
            ev.action
        );
        metrics::inc_anomaly(Anomaly::AbandonedTrade);
        self.trade = TradeState::Normal;
    }

    fn apply_normal(&mut self, ev: &MboEvent) -> Outcome {
        match ev.action {
            Action::Add => self.apply_add(ev),
            Action::Cancel => self.apply_cancel(ev),
            Action::Trade => {
                if ev.side == Side::None {
                    // Venue prints with no side never touch the book.
                    return Outcome::silent();
                }
                self.trade = TradeState::AwaitingFill(PendingTrade {
                    side: ev.side,
                    px: ev.price,
                    qty: ev.size,
                    order_id: ev.order_id,
                });
                Outcome::silent()
            }
            Action::Fill => {
                warn!("fill for order {} outside a trade sequence", ev.order_id);
                metrics::inc_anomaly(Anomaly::UnexpectedFill);
                Outcome::silent()
            }
            Action::Reset => {
                self.clear();
                Outcome::event(Action::Reset, Side::None)
            }
            Action::Other => Outcome::silent(),
        }
    }

    fn apply_add(&mut self, ev: &MboEvent) -> Outcome {
        if ev.order_id == 0 {
            return Outcome::event(Action::Add, ev.side);
        }
        if ev.side == Side::None || ev.size == 0 {
            warn!(
                "add for order {} has side {:?} and size {}; not booked",
                ev.order_id, ev.side, ev.size
            );
            metrics::inc_anomaly(Anomaly::UnbookableAdd);
            return Outcome::event(Action::Add, ev.side);
        }
        if self.index.contains_key(&ev.order_id) {
            warn!("order {} already exists; add rejected", ev.order_id);
            metrics::inc_anomaly(Anomaly::DuplicateAdd);
            return Outcome::silent();
        }
        self.insert_order(ev.order_id, ev.price, ev.size, ev.side);
        Outcome::event(Action::Add, ev.side)
    }

    fn apply_cancel(&mut self, ev: &MboEvent) -> Outcome {
        if ev.order_id == 0 {
            return Outcome::event(Action::Cancel, ev.side);
        }
        let Some(&h) = self.index.get(&ev.order_id) else {
            // Stale or duplicate feed; tolerated without mutating anything.
            metrics::inc_anomaly(Anomaly::StaleCancel);
            warn!("cancel for unknown order {}", ev.order_id);
            return Outcome::event(Action::Cancel, Side::None);
        };
        let (side, resting) = {
            let n = &self.orders[h];
            (n.side, n.qty)
        };
        let effective = if ev.size == 0 {
            resting
        } else {
            if ev.size > resting {
                warn!(
                    "cancel of {} exceeds resting {} for order {}",
                    ev.size, resting, ev.order_id
                );
                metrics::inc_anomaly(Anomaly::OverCancel);
            }
            ev.size.min(resting)
        };
        self.reduce_order(h, effective);
        Outcome::event(Action::Cancel, side)
    }

    fn insert_order(&mut self, order_id: u64, px: i64, qty: u64, side: Side) {
        let h = self.orders.insert(Node { order_id, px, qty, side, prev: None, next: None });
        // Obtain previous tail without holding the level borrow across order mutations
        let prev_tail = {
            let lvl = self.levels_mut(side).entry(px).or_default();
            lvl.tail
        };
        if let Some(t) = prev_tail {
            self.orders[t].next = Some(h);
        }
        self.orders[h].prev = prev_tail;
        let lvl = self.levels_mut(side).entry(px).or_default();
        if prev_tail.is_none() {
            lvl.head = Some(h);
        }
        lvl.tail = Some(h);
        lvl.count += 1;
        lvl.total_qty += qty;
        self.index.insert(order_id, h);
    }

    /// Shrinks a resting order by `delta`, unlinking it (and its level) once
    /// it empties. Callers clamp `delta` to the resting size.
    fn reduce_order(&mut self, h: Handle, delta: u64) {
        let (px, side, qty) = {
            let n = &self.orders[h];
            (n.px, n.side, n.qty)
        };
        if delta >= qty {
            self.unlink(h);
        } else {
            self.orders[h].qty = qty - delta;
            if let Some(lvl) = self.levels_mut(side).get_mut(&px) {
                lvl.total_qty = lvl.total_qty.saturating_sub(delta);
            }
        }
    }

    /// Removes an order node entirely: FIFO links, level totals, per-order
    /// index, slab slot.
    fn unlink(&mut self, h: Handle) {
        let Node { order_id, px, qty, side, prev, next } = self.orders[h].clone();
        if let Some(p) = prev {
            self.orders[p].next = next;
        }
        if let Some(n) = next {
            self.orders[n].prev = prev;
        }
        let mut drop_level = false;
        if let Some(lvl) = self.levels_mut(side).get_mut(&px) {
            if prev.is_none() {
                lvl.head = next;
            }
            if next.is_none() {
                lvl.tail = prev;
            }
            lvl.count = lvl.count.saturating_sub(1);
            lvl.total_qty = lvl.total_qty.saturating_sub(qty);
            drop_level = lvl.is_empty();
        }
        if drop_level {
            self.levels_mut(side).remove(&px);
        }
        self.index.remove(&order_id);
        self.orders.remove(h);
    }

    /// Depletes resting liquidity at `px` on the side opposite the aggressor,
    /// front of the FIFO first. An absent level or leftover quantity is a
    /// feed anomaly, never re-routed to another price.
    fn fill_opposite(&mut self, aggressor: Side, px: i64, qty: u64) {
        let target = aggressor.opposite();
        let head = match self.levels_mut(target).get(&px) {
            Some(lvl) => lvl.head,
            None => {
                warn!(
                    "trade fill at {:.2} found no {:?} level",
                    px as f64 / PX_SCALE as f64,
                    target
                );
                metrics::inc_anomaly(Anomaly::FillEmptyLevel);
                return;
            }
        };

        let mut remaining = qty;
        let mut drained: SmallVec<[Handle; 8]> = SmallVec::new();
        let mut partial: Option<(Handle, u64)> = None;
        let mut cur = head;
        while remaining > 0 {
            let Some(h) = cur else { break };
            let n = &self.orders[h];
            cur = n.next;
            if n.qty <= remaining {
                remaining -= n.qty;
                drained.push(h);
            } else {
                partial = Some((h, remaining));
                remaining = 0;
            }
        }
        for h in drained {
            self.unlink(h);
        }
        if let Some((h, cut)) = partial {
            self.reduce_order(h, cut);
        }
        if remaining > 0 {
            warn!("trade fill exhausted the level with {} unfilled", remaining);
            metrics::inc_anomaly(Anomaly::FillOverflow);
        }
    }

    /// Fixed-size image of the current top ten levels per side.
    pub fn top10(&self) -> Top10Image {
        let mut img = Top10Image::default();
        for (i, (px, lvl)) in self.bids.iter().rev().take(DEPTH).enumerate() {
            img.bid_px[i] = *px;
            img.bid_sz[i] = lvl.total_qty;
            img.bid_ct[i] = lvl.count;
        }
        for (i, (px, lvl)) in self.asks.iter().take(DEPTH).enumerate() {
            img.ask_px[i] = *px;
            img.ask_sz[i] = lvl.total_qty;
            img.ask_ct[i] = lvl.count;
        }
        img
    }

    /// Snapshot record mirroring `ev`'s metadata with the current book image.
    pub fn snapshot(&self, ev: &MboEvent) -> MbpSnapshot {
        MbpSnapshot {
            ts_event: ev.ts_event,
            action: ev.action,
            side: ev.side,
            price: ev.price,
            size: ev.size,
            order_id: ev.order_id,
            flags: ev.flags,
            ts_in_delta: ev.ts_in_delta,
            sequence: ev.sequence,
            book: self.top10(),
        }
    }

    /// Empties both sides, the order index and the trade machine. The
    /// sequence watermark survives: input numbering keeps running across
    /// resets.
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.orders.clear();
        self.index.clear();
        self.trade = TradeState::Normal;
    }

    pub fn bbo(&self) -> (Option<(i64, u64)>, Option<(i64, u64)>) {
        let bid = self.bids.iter().next_back().map(|(p, l)| (*p, l.total_qty));
        let ask = self.asks.iter().next().map(|(p, l)| (*p, l.total_qty));
        (bid, ask)
    }

    pub fn order_count(&self) -> usize {
        self.index.len()
    }

    pub fn bid_level_count(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_level_count(&self) -> usize {
        self.asks.len()
    }

    #[cfg(test)]
    fn resting_qty(&self, order_id: u64) -> Option<u64> {
        self.index.get(&order_id).map(|&h| self.orders[h].qty)
    }

    /// Walks every level queue and cross-checks it against the per-order
    /// index and the cached aggregates.
    #[cfg(test)]
    fn check_invariants(&self) {
        let mut seen = std::collections::HashSet::new();
        for (side, levels) in [(Side::Bid, &self.bids), (Side::Ask, &self.asks)] {
            for (px, lvl) in levels {
                assert!(!lvl.is_empty(), "empty level retained at {px}");
                assert!(lvl.total_qty > 0, "zero-size level retained at {px}");
                let mut sum = 0u64;
                let mut n = 0u32;
                for h in lvl.iter_fifo(&self.orders) {
                    let node = &self.orders[h];
                    assert_eq!(node.px, *px);
                    assert_eq!(node.side, side);
                    assert!(seen.insert(node.order_id), "order {} linked twice", node.order_id);
                    assert_eq!(self.index.get(&node.order_id), Some(&h));
                    sum += node.qty;
                    n += 1;
                }
                assert_eq!(sum, lvl.total_qty, "aggregate mismatch at {px}");
                assert_eq!(n, lvl.count, "count mismatch at {px}");
            }
        }
        assert_eq!(seen.len(), self.index.len(), "index holds unreachable orders");
    }
}
