//! Stop-loss placement for leveraged positions.
//!
//! A position's close range must not overlap liquidity already locked by
//! another position on the same side of the book. A long closes by selling
//! its size from the stop, so its range is `[end, stop]` with `end` below the
//! stop. A short closes by buying its size back from the stop, giving
//! `[stop, end]` with `end` above it. Either way the range lies on the far
//! side of the stop from spot.

use crate::book::{SegmentBook, Slot};
use crate::config::StopLossConfig;
use crate::curve::{self, MAX_PRICE, MIN_PRICE};
use crate::error::{Result, SimError};
use crate::{LockedSegment, OrderHandle, PositionSide, Price, SolAmount, TokenAmount};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StopLossResult {
    pub side: PositionSide,
    pub desired_price: Price,
    pub executable_price: Price,
    /// Other edge of the close range.
    pub close_end_price: Price,
    pub position_tokens: TokenAmount,
    /// SOL the curve moves across the close range.
    pub close_sol: SolAmount,
    pub stop_loss_pct: f64,
    pub leverage: f64,
    pub iterations: u32,
    /// Position in the book the close range is spliced into.
    pub insert_index: usize,
    /// Neighbour toward spot, `None` at the head of the list.
    pub prev: Option<OrderHandle>,
    /// Neighbour away from spot, `None` at the tail.
    pub next: Option<OrderHandle>,
}

impl StopLossResult {
    /// The close range as a segment oriented for its book, ready to splice at `insert_index`.
    pub fn close_segment(&self, handle: OrderHandle) -> LockedSegment {
        let (start, end) = (self.close_end_price, self.executable_price);
        LockedSegment { start, end, sol_amount: self.close_sol, token_amount: self.position_tokens, handle }
    }
}

/// `spot / |spot - stop|`; the leverage at which `stop` wipes the margin.
pub fn implied_leverage(side: PositionSide, spot: Price, stop: Price) -> f64 {
    let dist = match side {
        PositionSide::Long => spot.0.saturating_sub(stop.0),
        PositionSide::Short => stop.0.saturating_sub(spot.0),
    };
    if dist == 0 { return f64::INFINITY; }
    spot.0 as f64 / dist as f64
}

/// Close range `(lo, hi)` of a position stopped at `stop`, plus the SOL across it.
pub fn close_range(side: PositionSide, stop: Price, size: TokenAmount) -> Option<(Price, Price, SolAmount)> {
    match side {
        PositionSide::Long => curve::sell_from_price_with_token_input(stop, size).map(|(end, sol)| (end, stop, sol)),
        PositionSide::Short => curve::buy_from_price_with_token_output(stop, size).map(|(end, sol)| (stop, end, sol)),
    }
}

fn close_range_error(side: PositionSide, stop: Price, size: TokenAmount) -> SimError {
    // a buy-back larger than the reserve is impossible anywhere, not a domain exit
    let drains_reserve = side == PositionSide::Short && curve::reserve_at(stop).is_some_and(|x| size.0 >= x);
    if drains_reserve { SimError::CurveRejected { op: "close range", price: stop } } else { SimError::PriceOutOfDomain(stop) }
}

fn step_away(side: PositionSide, price: Price, step_bps: u32) -> Result<Price> {
    let factor = match side {
        PositionSide::Long => 10_000 - step_bps as u128,
        PositionSide::Short => 10_000 + step_bps as u128,
    };
    let next = price.0.checked_mul(factor).ok_or(SimError::Overflow("stop-loss step"))? / 10_000;
    let next = Price(next);
    if next < MIN_PRICE || next > MAX_PRICE { return Err(SimError::PriceOutOfDomain(next)); }
    Ok(next)
}

/// Walk the stop-loss away from spot in `step_bps` increments until its close
/// range fits between the locked segments of `book`.
pub fn solve_stop_loss(book: &SegmentBook, side: PositionSide, desired: Price, size: TokenAmount, cfg: &StopLossConfig) -> Result<StopLossResult> {
    if book.side() != side.book() { return Err(SimError::WrongBook { expected: side.book(), got: book.side() }); }
    if size.is_zero() { return Err(SimError::ZeroAmount); }
    if cfg.step_bps == 0 || cfg.step_bps >= 10_000 {
        return Err(SimError::Malformed { field: "step_bps", reason: format!("{} is not within 1..10000", cfg.step_bps) });
    }
    let spot = book.spot();
    let wrong_side = match side { PositionSide::Long => desired >= spot, PositionSide::Short => desired <= spot };
    if wrong_side { return Err(SimError::InvalidStopLoss { side, price: desired, spot }); }
    if desired < MIN_PRICE || desired > MAX_PRICE { return Err(SimError::PriceOutOfDomain(desired)); }

    let mut candidate = desired;
    for iteration in 1..=cfg.max_iterations {
        let (lo, hi, close_sol) = close_range(side, candidate, size).ok_or_else(|| close_range_error(side, candidate, size))?;
        match book.find_slot(lo, hi) {
            Slot::Free { index, prev, next } => {
                debug!(iteration, price = %candidate, index, "stop-loss placed");
                return Ok(StopLossResult {
                    side,
                    desired_price: desired,
                    executable_price: candidate,
                    close_end_price: if candidate == lo { hi } else { lo },
                    position_tokens: size,
                    close_sol,
                    stop_loss_pct: spot.pct_distance(candidate),
                    leverage: implied_leverage(side, spot, candidate),
                    iterations: iteration,
                    insert_index: index,
                    prev,
                    next,
                });
            }
            Slot::Overlaps { index } => {
                debug!(iteration, price = %candidate, overlaps = index, "stop-loss range overlaps a locked segment");
                candidate = step_away(side, candidate, cfg.step_bps)?;
            }
        }
    }
    Err(SimError::SearchExhausted { iterations: cfg.max_iterations })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::tests::{seg, UNIT};
    use crate::BookSide;

    const SIZE: TokenAmount = TokenAmount(500_000_000);

    fn longs(segs: Vec<LockedSegment>) -> SegmentBook { SegmentBook::new(BookSide::Down, Price(100 * UNIT), segs).unwrap() }
    fn shorts(segs: Vec<LockedSegment>) -> SegmentBook { SegmentBook::new(BookSide::Up, Price(100 * UNIT), segs).unwrap() }

    fn assert_free(book: &SegmentBook, r: &StopLossResult) {
        let (lo, hi, _) = close_range(r.side, r.executable_price, r.position_tokens).unwrap();
        assert!(book.segments().iter().all(|s| !s.overlaps(lo, hi)));
    }

    fn assert_splices(book: &SegmentBook, r: &StopLossResult) {
        let mut segs = book.segments().to_vec();
        segs.insert(r.insert_index, r.close_segment("new".into()));
        let spliced = SegmentBook::new(book.side(), book.spot(), segs).unwrap();
        assert_eq!(spliced.len(), book.len() + 1);
    }

    #[test]
    fn test_long_range_lies_below_stop() {
        let book = longs(vec![seg(80 * UNIT, 85 * UNIT, "a")]);
        let r = solve_stop_loss(&book, PositionSide::Long, Price(96 * UNIT), SIZE, &StopLossConfig::default()).unwrap();
        assert_eq!(r.iterations, 1);
        assert_eq!(r.executable_price, Price(96 * UNIT));
        assert_eq!(r.close_end_price, Price(9_096_457_031_366_841_028_502_507_234));
        assert_eq!((r.insert_index, r.prev.clone(), r.next.clone()), (0, None, Some("a".into())));
        assert!((r.leverage - 25.0).abs() < 1e-9);
        assert!((r.stop_loss_pct - 4.0).abs() < 1e-9);
        assert_splices(&book, &r);
    }

    #[test]
    fn test_short_range_lies_above_stop() {
        let book = shorts(vec![seg(130 * UNIT, 120 * UNIT, "s")]);
        let r = solve_stop_loss(&book, PositionSide::Short, Price(101 * UNIT), SIZE, &StopLossConfig::default()).unwrap();
        assert_eq!(r.iterations, 1);
        assert_eq!(r.close_end_price, Price(10_690_433_279_139_183_253_904_811_006));
        assert_eq!((r.insert_index, r.prev.clone(), r.next.clone()), (0, None, Some("s".into())));
        assert!((r.leverage - 100.0).abs() < 1e-9);
        assert_splices(&book, &r);
    }

    #[test]
    fn test_long_steps_below_overlapping_segment() {
        // selling 500 tokens from 96 sweeps down into [90, 95]
        let book = longs(vec![seg(90 * UNIT, 95 * UNIT, "a")]);
        let r = solve_stop_loss(&book, PositionSide::Long, Price(96 * UNIT), SIZE, &StopLossConfig::default()).unwrap();
        assert_eq!(r.iterations, 14);
        assert_eq!(r.executable_price, Price(8_994_381_051_646_117_812_870_525_967));
        assert!(r.close_end_price < r.executable_price);
        assert!(r.executable_price <= Price(90 * UNIT));
        assert_eq!((r.insert_index, r.prev.clone(), r.next.clone()), (1, Some("a".into()), None));
        assert_free(&book, &r);
        assert_splices(&book, &r);
    }

    #[test]
    fn test_short_steps_above_overlapping_segment() {
        let book = shorts(vec![seg(110 * UNIT, 104 * UNIT, "s")]);
        let r = solve_stop_loss(&book, PositionSide::Short, Price(105 * UNIT), SIZE, &StopLossConfig::default()).unwrap();
        assert_eq!(r.iterations, 11);
        assert_eq!(r.executable_price, Price(11_036_971_386_428_301_747_275_493_163));
        assert!(r.executable_price >= Price(110 * UNIT));
        assert!(r.close_end_price > r.executable_price);
        assert_eq!((r.insert_index, r.prev.clone(), r.next.clone()), (1, Some("s".into()), None));
        let expected = 100.0 / (r.executable_price.0 as f64 / UNIT as f64 - 100.0);
        assert!((r.leverage - expected).abs() < 1e-6);
        assert_free(&book, &r);
        assert_splices(&book, &r);
    }

    #[test]
    fn test_splices_between_neighbours() {
        let book = longs(vec![seg(90 * UNIT, 95 * UNIT, "a"), seg(70 * UNIT, 80 * UNIT, "b")]);
        let r = solve_stop_loss(&book, PositionSide::Long, Price(96 * UNIT), SIZE, &StopLossConfig::default()).unwrap();
        assert_eq!((r.insert_index, r.prev.clone(), r.next.clone()), (1, Some("a".into()), Some("b".into())));
        assert!(r.close_end_price >= Price(80 * UNIT));
        assert_splices(&book, &r);
    }

    #[test]
    fn test_finer_steps_land_closer_to_desired() {
        let book = longs(vec![seg(90 * UNIT, 95 * UNIT, "a")]);
        let mut last = Price(0);
        for step_bps in [50, 25, 10, 5, 1] {
            let cfg = StopLossConfig { step_bps, max_iterations: 1_000 };
            let r = solve_stop_loss(&book, PositionSide::Long, Price(96 * UNIT), SIZE, &cfg).unwrap();
            assert!(r.executable_price <= Price(96 * UNIT));
            assert!(r.executable_price >= last);
            assert_free(&book, &r);
            last = r.executable_price;
        }
    }

    #[test]
    fn test_iteration_cap_is_a_hard_failure() {
        let book = longs(vec![seg(90 * UNIT, 95 * UNIT, "a")]);
        let cfg = StopLossConfig { step_bps: 50, max_iterations: 3 };
        let e = solve_stop_loss(&book, PositionSide::Long, Price(96 * UNIT), SIZE, &cfg).unwrap_err();
        assert_eq!(e, SimError::SearchExhausted { iterations: 3 });
    }

    #[test]
    fn test_running_off_the_domain() {
        let cfg = StopLossConfig { step_bps: 5_000, max_iterations: 1_000 };
        let book = longs(vec![seg(MIN_PRICE.0, 95 * UNIT, "floor")]);
        let e = solve_stop_loss(&book, PositionSide::Long, Price(96 * UNIT), SIZE, &cfg).unwrap_err();
        assert!(matches!(e, SimError::PriceOutOfDomain(_)));
        let book = shorts(vec![seg(MAX_PRICE.0, 104 * UNIT, "ceiling")]);
        let e = solve_stop_loss(&book, PositionSide::Short, Price(105 * UNIT), TokenAmount(1_000_000), &cfg).unwrap_err();
        assert!(matches!(e, SimError::PriceOutOfDomain(_)));
    }

    #[test]
    fn test_buy_back_larger_than_reserve_is_rejected() {
        let book = shorts(vec![]);
        let size = TokenAmount(curve::reserve_at(Price(105 * UNIT)).unwrap());
        let e = solve_stop_loss(&book, PositionSide::Short, Price(105 * UNIT), size, &StopLossConfig::default()).unwrap_err();
        assert_eq!(e, SimError::CurveRejected { op: "close range", price: Price(105 * UNIT) });
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let book = longs(vec![]);
        let cfg = StopLossConfig::default();
        assert!(matches!(solve_stop_loss(&book, PositionSide::Long, Price(101 * UNIT), SIZE, &cfg), Err(SimError::InvalidStopLoss { .. })));
        assert_eq!(solve_stop_loss(&book, PositionSide::Long, Price(96 * UNIT), TokenAmount::ZERO, &cfg), Err(SimError::ZeroAmount));
        assert!(matches!(solve_stop_loss(&book, PositionSide::Short, Price(120 * UNIT), SIZE, &cfg), Err(SimError::WrongBook { .. })));
        let zero_step = StopLossConfig { step_bps: 0, max_iterations: 10 };
        assert!(matches!(solve_stop_loss(&book, PositionSide::Long, Price(96 * UNIT), SIZE, &zero_step), Err(SimError::Malformed { .. })));
    }

    #[test]
    fn test_is_deterministic() {
        let book = longs(vec![seg(90 * UNIT, 95 * UNIT, "a"), seg(70 * UNIT, 80 * UNIT, "b")]);
        let cfg = StopLossConfig::default();
        let a = solve_stop_loss(&book, PositionSide::Long, Price(96 * UNIT), SIZE, &cfg).unwrap();
        let b = solve_stop_loss(&book, PositionSide::Long, Price(96 * UNIT), SIZE, &cfg).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_implied_leverage() {
        assert_eq!(implied_leverage(PositionSide::Long, Price(100), Price(90)), 10.0);
        assert_eq!(implied_leverage(PositionSide::Short, Price(100), Price(120)), 5.0);
        assert!(implied_leverage(PositionSide::Long, Price(100), Price(100)).is_infinite());
    }
}
