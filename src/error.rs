// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Fatal failures. Anything per-event is downgraded to a warning plus a
/// counter instead; only I/O and input-shape problems abort the run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot open input {path}: {source}")]
    InputOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read from {path} failed: {source}")]
    InputRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input header is missing required column `{column}`")]
    BadHeader { column: &'static str },

    #[error("write to {path} failed: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Feed violations the engine tolerates. Each bumps a labelled counter so
/// the exit summary shows how dirty the session was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anomaly {
    /// Add for an order id that is already resting.
    DuplicateAdd,
    /// Add with no side or no size; accepted but never booked.
    UnbookableAdd,
    /// Cancel for an order the book has never seen (stale or duplicate feed).
    StaleCancel,
    /// Cancel size above the resting size; clamped to a full cancel.
    OverCancel,
    /// Trade fill addressed a price with no resting level.
    FillEmptyLevel,
    /// Trade fill larger than the level; the excess is dropped.
    FillOverflow,
    /// Fill event outside a trade sequence.
    UnexpectedFill,
    /// T/F/C sequence broken by an interleaved event; pending trade dropped.
    AbandonedTrade,
    /// Event sequence number went backwards; event ignored.
    OutOfOrderSequence,
}

impl Anomaly {
    pub fn as_str(self) -> &'static str {
        match self {
            Anomaly::DuplicateAdd => "duplicate_add",
            Anomaly::UnbookableAdd => "unbookable_add",
            Anomaly::StaleCancel => "stale_cancel",
            Anomaly::OverCancel => "over_cancel",
            Anomaly::FillEmptyLevel => "fill_empty_level",
            Anomaly::FillOverflow => "fill_overflow",
            Anomaly::UnexpectedFill => "unexpected_fill",
            Anomaly::AbandonedTrade => "abandoned_trade",
            Anomaly::OutOfOrderSequence => "out_of_order_sequence",
        }
    }
}
