use crate::curve::{MAX_PRICE, MIN_PRICE};
use crate::error::SimError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const PRICE_DECIMALS: u32 = 26;
pub const SOL_DECIMALS: u32 = 9;
pub const TOKEN_DECIMALS: u32 = 6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side { Buy, Sell }

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide { Long, Short }

/// Which half of the order book a segment lives in. The up-book holds the
/// ranges locked by shorts above spot, the down-book those locked by longs below.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BookSide { Up, Down }

impl Side {
    /// The book a trade of this side has to walk around.
    pub fn book(self) -> BookSide {
        match self { Side::Buy => BookSide::Up, Side::Sell => BookSide::Down }
    }
}

impl PositionSide {
    /// The book a position of this side locks its close range into.
    pub fn book(self) -> BookSide {
        match self { PositionSide::Long => BookSide::Down, PositionSide::Short => BookSide::Up }
    }
}

impl BookSide {
    /// Price the last gap of this book runs out to.
    pub fn sentinel(self) -> Price {
        match self { BookSide::Up => MAX_PRICE, BookSide::Down => MIN_PRICE }
    }

    /// True when `a` lies strictly closer to spot than `b` while walking this book.
    pub fn nearer(self, a: Price, b: Price) -> bool {
        match self { BookSide::Up => a < b, BookSide::Down => a > b }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { PositionSide::Long => "long", PositionSide::Short => "short" })
    }
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { BookSide::Up => "up", BookSide::Down => "down" })
    }
}

/// Fixed-point price, `PRICE_DECIMALS` fractional digits of SOL per whole token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(pub u128);

impl Price {
    pub const fn new(raw: u128) -> Self { Price(raw) }
    pub fn raw(self) -> u128 { self.0 }

    pub fn from_ui_str(s: &str) -> Result<Self, SimError> {
        parse_units(s, PRICE_DECIMALS, "price").map(Price)
    }

    pub fn to_ui_string(self) -> String { format_units(self.0, PRICE_DECIMALS) }

    /// Distance to `other` as a percentage of `self`. Display only.
    pub fn pct_distance(self, other: Price) -> f64 {
        if self.0 == 0 { return 0.0; }
        self.0.abs_diff(other.0) as f64 / self.0 as f64 * 100.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl std::str::FromStr for Price {
    type Err = SimError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u128>().map(Price).map_err(|e| SimError::Malformed { field: "price", reason: e.to_string() })
    }
}

// u128 does not survive a round trip through a JSON number.
impl Serialize for Price {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { s.serialize_str(&self.0.to_string()) }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw { Str(String), Num(u64) }
        match Raw::deserialize(d)? {
            Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
            Raw::Num(n) => Ok(Price(n as u128)),
        }
    }
}

macro_rules! amount_type {
    ($name:ident, $decimals:expr, $field:literal) => {
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub const ZERO: $name = $name(0);
            pub const DECIMALS: u32 = $decimals;

            pub const fn new(raw: u64) -> Self { $name(raw) }
            pub fn raw(self) -> u64 { self.0 }
            pub fn is_zero(self) -> bool { self.0 == 0 }
            pub fn checked_add(self, o: Self) -> Option<Self> { self.0.checked_add(o.0).map($name) }
            pub fn checked_sub(self, o: Self) -> Option<Self> { self.0.checked_sub(o.0).map($name) }
            pub fn saturating_sub(self, o: Self) -> Self { $name(self.0.saturating_sub(o.0)) }

            pub fn from_ui_str(s: &str) -> Result<Self, SimError> {
                let v = parse_units(s, $decimals, $field)?;
                u64::try_from(v).map($name).map_err(|_| SimError::Overflow($field))
            }

            pub fn to_ui_string(self) -> String { format_units(self.0 as u128, $decimals) }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
        }
    };
}

amount_type!(SolAmount, SOL_DECIMALS, "sol amount");
amount_type!(TokenAmount, TOKEN_DECIMALS, "token amount");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(transparent)]
pub struct OrderHandle(pub String);

impl From<&str> for OrderHandle {
    fn from(s: &str) -> Self { OrderHandle(s.to_string()) }
}

impl fmt::Display for OrderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Liquidity reserved by one open leveraged position. `start` is the trigger
/// edge far from spot, `end` the edge toward spot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockedSegment {
    pub start: Price,
    pub end: Price,
    pub sol_amount: SolAmount,
    pub token_amount: TokenAmount,
    pub handle: OrderHandle,
}

impl LockedSegment {
    pub fn low(&self) -> Price { self.start.min(self.end) }
    pub fn high(&self) -> Price { self.start.max(self.end) }

    /// Edge first reached when walking `side` outward from spot.
    pub fn near(&self, side: BookSide) -> Price {
        match side { BookSide::Up => self.low(), BookSide::Down => self.high() }
    }

    pub fn far(&self, side: BookSide) -> Price {
        match side { BookSide::Up => self.high(), BookSide::Down => self.low() }
    }

    pub fn is_oriented(&self, side: BookSide) -> bool {
        match side { BookSide::Up => self.start >= self.end, BookSide::Down => self.start <= self.end }
    }

    /// Open-interval overlap; ranges that only touch at an edge do not overlap.
    pub fn overlaps(&self, lo: Price, hi: Price) -> bool {
        lo < self.high() && self.low() < hi
    }
}

/// Parse a UI decimal string ("1.25") into base units with `decimals` digits.
pub fn parse_units(s: &str, decimals: u32, field: &'static str) -> Result<u128, SimError> {
    let bad = |reason: &str| SimError::Malformed { field, reason: reason.to_string() };
    let s = s.trim();
    let (int, frac) = s.split_once('.').unwrap_or((s, ""));
    if int.is_empty() && frac.is_empty() { return Err(bad("empty")); }
    if !int.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) { return Err(bad("not a decimal number")); }
    if frac.len() > decimals as usize { return Err(bad("too many fractional digits")); }
    let scale = 10u128.pow(decimals);
    let int_part = if int.is_empty() { 0 } else { int.parse::<u128>().map_err(|_| SimError::Overflow(field))? };
    let frac_part = if frac.is_empty() {
        0
    } else {
        frac.parse::<u128>().map_err(|_| bad("fraction"))? * 10u128.pow(decimals - frac.len() as u32)
    };
    int_part.checked_mul(scale).and_then(|v| v.checked_add(frac_part)).ok_or(SimError::Overflow(field))
}

pub fn format_units(v: u128, decimals: u32) -> String {
    let scale = 10u128.pow(decimals);
    let (int, frac) = (v / scale, v % scale);
    if frac == 0 { return int.to_string(); }
    let frac = format!("{:0width$}", frac, width = decimals as usize);
    format!("{}.{}", int, frac.trim_end_matches('0'))
}
