use crate::{BookSide, OrderHandle, PositionSide, Price};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("amount must be non-zero")]
    ZeroAmount,
    #[error("price {0} is outside the curve domain")]
    PriceOutOfDomain(Price),
    #[error("curve cannot {op} from price {price}")]
    CurveRejected { op: &'static str, price: Price },
    #[error("arithmetic overflow while computing {0}")]
    Overflow(&'static str),

    #[error("segment {index} ({handle}) is inverted for the {side} book: {start} -> {end}")]
    InvertedSegment { index: usize, handle: OrderHandle, side: BookSide, start: Price, end: Price },
    #[error("segment {index} ({handle}) overlaps or precedes the segment before it")]
    UnorderedSegments { index: usize, handle: OrderHandle },
    #[error("gap {index} of the {side} book is inverted: {near} -> {far}")]
    InvertedGap { index: usize, side: BookSide, near: Price, far: Price },
    #[error("expected the {expected} book, got the {got} book")]
    WrongBook { expected: BookSide, got: BookSide },

    #[error("stop-loss price {price} is on the wrong side of spot {spot} for a {side} position")]
    InvalidStopLoss { side: PositionSide, price: Price, spot: Price },
    #[error("search exhausted after {iterations} iterations")]
    SearchExhausted { iterations: u32 },
    #[error("no amount within the search range fits the budget")]
    NoFeasibleAmount,

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("malformed {field}: {reason}")]
    Malformed { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, SimError>;
