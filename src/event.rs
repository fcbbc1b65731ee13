// src/event.rs
use serde::{Deserialize, Serialize};

/// Prices are fixed point at 1e-9, matching the feed's nine decimal digits.
pub const PX_SCALE: i64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
    None,
}

impl Side {
    #[inline]
    pub fn opposite(self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
            Side::None => Side::None,
        }
    }

    pub fn from_char(c: char) -> Side {
        match c {
            'B' => Side::Bid,
            'A' => Side::Ask,
            _ => Side::None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Side::Bid => 'B',
            Side::Ask => 'A',
            Side::None => 'N',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Add,
    Cancel,
    Trade,
    Fill,
    Reset,
    Other,
}

impl Action {
    pub fn from_char(c: char) -> Action {
        match c {
            'A' => Action::Add,
            'C' => Action::Cancel,
            'T' => Action::Trade,
            'F' => Action::Fill,
            'R' => Action::Reset,
            _ => Action::Other,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Action::Add => 'A',
            Action::Cancel => 'C',
            Action::Trade => 'T',
            Action::Fill => 'F',
            Action::Reset => 'R',
            Action::Other => '?',
        }
    }
}

/// One normalized MBO row. Flags and ts_in_delta are opaque passthrough,
/// copied onto whatever snapshot this event triggers.
#[derive(Debug, Clone, Copy)]
pub struct MboEvent {
    pub ts_event: u64,
    pub action: Action,
    pub side: Side,
    pub price: i64,
    pub size: u64,
    pub order_id: u64,
    pub flags: u32,
    pub ts_in_delta: i32,
    pub sequence: u64,
}

/// Parses a decimal price into 1e-9 ticks. The empty field means "no price"
/// and maps to 0. At most nine fractional digits are accepted.
pub fn parse_px(s: &str) -> Option<i64> {
    if s.is_empty() {
        return Some(0);
    }
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (whole, frac) = match body.split_once('.') {
        Some((w, f)) => (w, f),
        None => (body, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    let mut px: i64 = if whole.is_empty() {
        0
    } else {
        if !whole.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        whole.parse::<i64>().ok()?
    };
    px = px.checked_mul(PX_SCALE)?;
    if !frac.is_empty() {
        if frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let f = frac.parse::<i64>().ok()? * 10i64.pow((9 - frac.len()) as u32);
        px = px.checked_add(f)?;
    }
    Some(if neg { -px } else { px })
}

/// Renders ticks as a two-decimal price, round half up. Zero renders empty,
/// which is how the output schema spells "no level here".
pub fn format_px(px: i64) -> String {
    if px == 0 {
        return String::new();
    }
    let sign = if px < 0 { "-" } else { "" };
    let hundredths = (px.unsigned_abs() + 5_000_000) / 10_000_000;
    format!("{}{}.{:02}", sign, hundredths / 100, hundredths % 100)
}
