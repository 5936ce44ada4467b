use crate::curve::{MAX_PRICE, MIN_PRICE};
use crate::error::{Result, SimError};
use crate::{BookSide, LockedSegment, OrderHandle, Price};
use serde::Serialize;

/// Unreserved price range between locked segments, in walk order.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Gap {
    /// Index of the segment this gap runs up to; `len()` for the trailing gap.
    pub index: usize,
    pub near: Price,
    pub far: Price,
}

impl Gap {
    pub fn is_empty(&self) -> bool { self.near == self.far }
}

/// Where a candidate range would sit in the book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Overlaps { index: usize },
    Free { index: usize, prev: Option<OrderHandle>, next: Option<OrderHandle> },
}

/// One side of the book: locked segments ordered outward from spot.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentBook {
    side: BookSide,
    spot: Price,
    segments: Vec<LockedSegment>,
}

impl SegmentBook {
    pub fn new(side: BookSide, spot: Price, segments: Vec<LockedSegment>) -> Result<Self> {
        if spot < MIN_PRICE || spot > MAX_PRICE { return Err(SimError::PriceOutOfDomain(spot)); }
        for (index, s) in segments.iter().enumerate() {
            if !s.is_oriented(side) {
                return Err(SimError::InvertedSegment { index, handle: s.handle.clone(), side, start: s.start, end: s.end });
            }
            if index > 0 && side.nearer(s.near(side), segments[index - 1].far(side)) {
                return Err(SimError::UnorderedSegments { index, handle: s.handle.clone() });
            }
        }
        if let Some(first) = segments.first() {
            if side.nearer(first.near(side), spot) {
                return Err(SimError::InvertedGap { index: 0, side, near: spot, far: first.near(side) });
            }
        }
        if let Some(last) = segments.last() {
            let sentinel = side.sentinel();
            if side.nearer(sentinel, last.far(side)) {
                return Err(SimError::InvertedGap { index: segments.len(), side, near: last.far(side), far: sentinel });
            }
        }
        Ok(Self { side, spot, segments })
    }

    pub fn empty(side: BookSide, spot: Price) -> Result<Self> { Self::new(side, spot, Vec::new()) }

    pub fn side(&self) -> BookSide { self.side }
    pub fn spot(&self) -> Price { self.spot }
    pub fn segments(&self) -> &[LockedSegment] { &self.segments }
    pub fn len(&self) -> usize { self.segments.len() }
    pub fn is_empty(&self) -> bool { self.segments.is_empty() }

    /// Gaps from spot outward; always `len() + 1` entries.
    pub fn gaps(&self) -> Vec<Gap> {
        let side = self.side;
        let mut out = Vec::with_capacity(self.segments.len() + 1);
        let mut near = self.spot;
        for (index, s) in self.segments.iter().enumerate() {
            out.push(Gap { index, near, far: s.near(side) });
            near = s.far(side);
        }
        out.push(Gap { index: self.segments.len(), near, far: side.sentinel() });
        out
    }

    /// Overlap check for the range `[lo, hi]` plus the splice neighbours it
    /// would sit between if it is free.
    pub fn find_slot(&self, lo: Price, hi: Price) -> Slot {
        if let Some(index) = self.segments.iter().position(|s| s.overlaps(lo, hi)) {
            return Slot::Overlaps { index };
        }
        let index = self.segments.iter().take_while(|s| match self.side {
            BookSide::Up => s.high() <= lo,
            BookSide::Down => s.low() >= hi,
        }).count();
        Slot::Free {
            index,
            prev: index.checked_sub(1).map(|i| self.segments[i].handle.clone()),
            next: self.segments.get(index).map(|s| s.handle.clone()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{SolAmount, TokenAmount};

    pub(crate) const UNIT: u128 = 100_000_000_000_000_000_000_000_000;

    pub(crate) fn seg(start: u128, end: u128, handle: &str) -> LockedSegment {
        LockedSegment { start: Price(start), end: Price(end), sol_amount: SolAmount(0), token_amount: TokenAmount(0), handle: handle.into() }
    }

    #[test]
    fn test_empty_book_single_gap() {
        let b = SegmentBook::empty(BookSide::Up, Price(100 * UNIT)).unwrap();
        assert_eq!(b.gaps(), vec![Gap { index: 0, near: Price(100 * UNIT), far: MAX_PRICE }]);
        let b = SegmentBook::empty(BookSide::Down, Price(100 * UNIT)).unwrap();
        assert_eq!(b.gaps(), vec![Gap { index: 0, near: Price(100 * UNIT), far: MIN_PRICE }]);
    }

    #[test]
    fn test_gaps_walk_around_segments() {
        let b = SegmentBook::new(BookSide::Down, Price(100 * UNIT), vec![seg(90 * UNIT, 95 * UNIT, "a"), seg(80 * UNIT, 90 * UNIT, "b")]).unwrap();
        let g = b.gaps();
        assert_eq!(g.len(), 3);
        assert_eq!((g[0].near, g[0].far), (Price(100 * UNIT), Price(95 * UNIT)));
        assert!(g[1].is_empty());
        assert_eq!((g[2].near, g[2].far), (Price(80 * UNIT), MIN_PRICE));
    }

    #[test]
    fn test_rejects_inverted_segment() {
        let e = SegmentBook::new(BookSide::Up, Price(100 * UNIT), vec![seg(110 * UNIT, 120 * UNIT, "a")]).unwrap_err();
        assert!(matches!(e, SimError::InvertedSegment { index: 0, .. }));
    }

    #[test]
    fn test_rejects_overlap_and_disorder() {
        let e = SegmentBook::new(BookSide::Up, Price(100 * UNIT), vec![seg(120 * UNIT, 110 * UNIT, "a"), seg(125 * UNIT, 115 * UNIT, "b")]).unwrap_err();
        assert!(matches!(e, SimError::UnorderedSegments { index: 1, .. }));
        let e = SegmentBook::new(BookSide::Down, Price(100 * UNIT), vec![seg(80 * UNIT, 85 * UNIT, "a"), seg(90 * UNIT, 95 * UNIT, "b")]).unwrap_err();
        assert!(matches!(e, SimError::UnorderedSegments { index: 1, .. }));
    }

    #[test]
    fn test_rejects_segment_across_spot() {
        let e = SegmentBook::new(BookSide::Down, Price(100 * UNIT), vec![seg(90 * UNIT, 105 * UNIT, "a")]).unwrap_err();
        assert!(matches!(e, SimError::InvertedGap { index: 0, .. }));
        let e = SegmentBook::new(BookSide::Up, Price(100 * UNIT), vec![seg(Price::raw(MAX_PRICE) + 1, 110 * UNIT, "a")]).unwrap_err();
        assert!(matches!(e, SimError::InvertedGap { index: 1, .. }));
    }

    #[test]
    fn test_find_slot() {
        let b = SegmentBook::new(BookSide::Up, Price(100 * UNIT), vec![seg(110 * UNIT, 105 * UNIT, "a"), seg(130 * UNIT, 120 * UNIT, "b")]).unwrap();
        assert_eq!(b.find_slot(Price(108 * UNIT), Price(112 * UNIT)), Slot::Overlaps { index: 0 });
        assert_eq!(b.find_slot(Price(110 * UNIT), Price(120 * UNIT)), Slot::Free { index: 1, prev: Some("a".into()), next: Some("b".into()) });
        assert_eq!(b.find_slot(Price(101 * UNIT), Price(104 * UNIT)), Slot::Free { index: 0, prev: None, next: Some("a".into()) });
        assert_eq!(b.find_slot(Price(140 * UNIT), Price(150 * UNIT)), Slot::Free { index: 2, prev: Some("b".into()), next: None });
    }
}
