//! Versioned boundary records for book snapshots.
//!
//! Indexers and account readers hand over JSON in this shape; it is converted
//! once into typed segments and books so nothing past this module sees raw
//! records.

use crate::book::SegmentBook;
use crate::error::{Result, SimError};
use crate::{BookSide, LockedSegment, OrderHandle, Price, SolAmount, TokenAmount};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use tracing::debug;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecordV1 {
    pub lock_start_price: Price,
    pub lock_end_price: Price,
    #[serde(deserialize_with = "u64_lenient")]
    pub lock_sol_amount: u64,
    #[serde(deserialize_with = "u64_lenient")]
    pub lock_token_amount: u64,
    pub order_handle: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BookSnapshot {
    pub version: u32,
    pub current_price: Price,
    #[serde(default)]
    pub up_orders: Vec<OrderRecordV1>,
    #[serde(default)]
    pub down_orders: Vec<OrderRecordV1>,
}

// amounts arrive as JSON numbers from some sources and strings from others
fn u64_lenient<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw { Num(u64), Str(String) }
    match Raw::deserialize(d)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl TryFrom<OrderRecordV1> for LockedSegment {
    type Error = SimError;

    fn try_from(r: OrderRecordV1) -> Result<Self> {
        if r.order_handle.trim().is_empty() {
            return Err(SimError::Malformed { field: "orderHandle", reason: "empty".into() });
        }
        Ok(LockedSegment {
            start: r.lock_start_price,
            end: r.lock_end_price,
            sol_amount: SolAmount(r.lock_sol_amount),
            token_amount: TokenAmount(r.lock_token_amount),
            handle: OrderHandle(r.order_handle),
        })
    }
}

impl From<&LockedSegment> for OrderRecordV1 {
    fn from(s: &LockedSegment) -> Self {
        Self {
            lock_start_price: s.start,
            lock_end_price: s.end,
            lock_sol_amount: s.sol_amount.0,
            lock_token_amount: s.token_amount.0,
            order_handle: s.handle.0.clone(),
        }
    }
}

impl BookSnapshot {
    pub fn parse(json: &str) -> Result<Self> {
        // peek at the version first so a future layout gets a clear error
        #[derive(Deserialize)]
        struct Header { version: u32 }
        let header: Header = serde_json::from_str(json)
            .map_err(|e| SimError::Malformed { field: "snapshot", reason: e.to_string() })?;
        if header.version != SNAPSHOT_VERSION { return Err(SimError::UnsupportedVersion(header.version)); }
        serde_json::from_str(json).map_err(|e| SimError::Malformed { field: "snapshot", reason: e.to_string() })
    }

    /// Validated `(up, down)` books around the snapshot's current price.
    pub fn into_books(self) -> Result<(SegmentBook, SegmentBook)> {
        if self.version != SNAPSHOT_VERSION { return Err(SimError::UnsupportedVersion(self.version)); }
        let mut seen = HashSet::new();
        for r in self.up_orders.iter().chain(&self.down_orders) {
            if !seen.insert(r.order_handle.as_str()) {
                return Err(SimError::Malformed { field: "orderHandle", reason: format!("duplicate handle {}", r.order_handle) });
            }
        }
        let spot = self.current_price;
        let up = convert(self.up_orders)?;
        let down = convert(self.down_orders)?;
        debug!(spot = %spot, up = up.len(), down = down.len(), "snapshot ingested");
        Ok((SegmentBook::new(BookSide::Up, spot, up)?, SegmentBook::new(BookSide::Down, spot, down)?))
    }

    pub fn from_books(up: &SegmentBook, down: &SegmentBook) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            current_price: up.spot(),
            up_orders: up.segments().iter().map(OrderRecordV1::from).collect(),
            down_orders: down.segments().iter().map(OrderRecordV1::from).collect(),
        }
    }
}

fn convert(records: Vec<OrderRecordV1>) -> Result<Vec<LockedSegment>> {
    records.into_iter().map(LockedSegment::try_from).collect()
}
