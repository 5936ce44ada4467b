//! Trade simulation against a book of locked segments.
//!
//! A trade cannot execute inside a locked range, so the price jumps over each
//! one and only the gaps between them fill. The tracked amount is the token
//! side for both directions: tokens received on a buy, tokens sold on a sell.

use crate::book::SegmentBook;
use crate::curve;
use crate::error::{Result, SimError};
use crate::{BookSide, Price, Side, SolAmount, TokenAmount};
use serde::Serialize;
use tracing::trace;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SimulationResult {
    pub side: Side,
    /// Token amount a frictionless curve would move.
    pub ideal_tokens: TokenAmount,
    pub actual_tokens: TokenAmount,
    /// SOL the curve would charge (buy) or pay (sell) for `actual_tokens` at spot.
    pub theoretical_sol: SolAmount,
    pub actual_sol: SolAmount,
    pub completion_pct: f64,
    pub slippage_pct: f64,
    pub depth_tokens: TokenAmount,
    pub depth_sol: SolAmount,
    pub final_price: Price,
    pub gaps_used: usize,
}

impl SimulationResult {
    pub fn is_complete(&self) -> bool { self.actual_tokens >= self.ideal_tokens }

    /// Upper bound on SOL spent for a buy with `tolerance_bps` slack.
    pub fn max_sol_cost(&self, tolerance_bps: u32) -> SolAmount {
        let v = self.actual_sol.0 as u128 * (10_000 + tolerance_bps as u128) / 10_000;
        SolAmount(u64::try_from(v).unwrap_or(u64::MAX))
    }

    /// Lower bound on SOL received for a sell with `tolerance_bps` slack.
    pub fn min_sol_out(&self, tolerance_bps: u32) -> SolAmount {
        let bps = tolerance_bps.min(10_000) as u128;
        SolAmount((self.actual_sol.0 as u128 * (10_000 - bps) / 10_000) as u64)
    }
}

/// Buy with a fixed SOL input; the ideal token output is the target.
pub fn simulate_buy(book: &SegmentBook, sol_in: SolAmount) -> Result<SimulationResult> {
    expect_book(book, BookSide::Up)?;
    if sol_in.is_zero() { return Err(SimError::ZeroAmount); }
    let spot = book.spot();
    let (price, tokens) = curve::buy_from_price_with_sol_input(spot, sol_in)
        .ok_or(SimError::CurveRejected { op: "buy with sol input", price: spot })?;
    if tokens.is_zero() { return Err(SimError::ZeroAmount); }
    walk(book, Side::Buy, tokens, (price, sol_in))
}

/// Buy an exact token amount; reports the SOL the book actually charges.
pub fn simulate_buy_exact_tokens(book: &SegmentBook, token_out: TokenAmount) -> Result<SimulationResult> {
    expect_book(book, BookSide::Up)?;
    if token_out.is_zero() { return Err(SimError::ZeroAmount); }
    let spot = book.spot();
    let ideal = curve::buy_from_price_with_token_output(spot, token_out)
        .ok_or(SimError::CurveRejected { op: "buy with token output", price: spot })?;
    walk(book, Side::Buy, token_out, ideal)
}

pub fn simulate_sell(book: &SegmentBook, token_in: TokenAmount) -> Result<SimulationResult> {
    expect_book(book, BookSide::Down)?;
    if token_in.is_zero() { return Err(SimError::ZeroAmount); }
    let spot = book.spot();
    let ideal = curve::sell_from_price_with_token_input(spot, token_in)
        .ok_or(SimError::CurveRejected { op: "sell with token input", price: spot })?;
    walk(book, Side::Sell, token_in, ideal)
}

fn expect_book(book: &SegmentBook, expected: BookSide) -> Result<()> {
    if book.side() != expected { return Err(SimError::WrongBook { expected, got: book.side() }); }
    Ok(())
}

fn gap_capacity(side: Side, near: Price, far: Price) -> Option<(TokenAmount, SolAmount)> {
    match side {
        Side::Buy => curve::buy_from_price_to_price(near, far).map(|(s, t)| (t, s)),
        Side::Sell => curve::sell_from_price_to_price(near, far),
    }
}

fn partial_fill(side: Side, near: Price, tokens: TokenAmount) -> Option<(Price, SolAmount)> {
    match side {
        Side::Buy => curve::buy_from_price_with_token_output(near, tokens),
        Side::Sell => curve::sell_from_price_with_token_input(near, tokens),
    }
}

/// Total `(tokens, sol)` the gaps of `book` can absorb, walking its own side.
pub fn depth(book: &SegmentBook) -> Result<(TokenAmount, SolAmount)> {
    let side = match book.side() { BookSide::Up => Side::Buy, BookSide::Down => Side::Sell };
    let (mut tokens, mut sol) = (TokenAmount::ZERO, SolAmount::ZERO);
    for gap in book.gaps().iter().filter(|g| !g.is_empty()) {
        if let Some((t, s)) = gap_capacity(side, gap.near, gap.far) {
            tokens = add(tokens, t, "depth tokens", TokenAmount::checked_add)?;
            sol = add(sol, s, "depth sol", SolAmount::checked_add)?;
        }
    }
    Ok((tokens, sol))
}

fn add<T>(a: T, b: T, what: &'static str, f: impl Fn(T, T) -> Option<T>) -> Result<T> {
    f(a, b).ok_or(SimError::Overflow(what))
}

fn walk(book: &SegmentBook, side: Side, target: TokenAmount, ideal: (Price, SolAmount)) -> Result<SimulationResult> {
    let spot = book.spot();
    let (mut tokens, mut sol) = (TokenAmount::ZERO, SolAmount::ZERO);
    let (depth_tokens, depth_sol) = depth(book)?;
    let mut final_price = spot;
    let mut gaps_used = 0usize;
    let mut filled = false;

    for gap in book.gaps() {
        if gap.is_empty() { continue; }
        let Some((cap_tokens, cap_sol)) = gap_capacity(side, gap.near, gap.far) else {
            trace!(index = gap.index, near = %gap.near, far = %gap.far, "gap contributes nothing");
            continue;
        };
        gaps_used += 1;

        let reach = add(tokens, cap_tokens, "filled tokens", TokenAmount::checked_add)?;
        if reach < target {
            tokens = reach;
            sol = add(sol, cap_sol, "filled sol", SolAmount::checked_add)?;
            final_price = gap.far;
            trace!(index = gap.index, tokens = %tokens, "gap consumed");
            continue;
        }

        let need = target.saturating_sub(tokens);
        // the first gap starts at spot, so filling inside it is the ideal trade itself
        let (price, part_sol) = if gap.index == 0 {
            ideal
        } else if need == cap_tokens {
            (gap.far, cap_sol)
        } else {
            partial_fill(side, gap.near, need)
                .ok_or(SimError::CurveRejected { op: "fill partial gap", price: gap.near })?
        };
        sol = add(sol, part_sol, "filled sol", SolAmount::checked_add)?;
        tokens = target;
        final_price = price;
        filled = true;
        trace!(index = gap.index, need = %need, "target reached inside gap");
        break;
    }

    let (theoretical_sol, completion_pct) = if filled {
        (ideal.1, 100.0)
    } else if tokens.is_zero() {
        (SolAmount::ZERO, 0.0)
    } else {
        let theo = partial_fill(side, spot, tokens)
            .ok_or(SimError::CurveRejected { op: "price partial fill at spot", price: spot })?.1;
        (theo, (tokens.0 as f64 / target.0 as f64 * 100.0).min(100.0))
    };
    let slippage_pct = if theoretical_sol.is_zero() {
        0.0
    } else {
        theoretical_sol.0.abs_diff(sol.0) as f64 / theoretical_sol.0 as f64 * 100.0
    };

    Ok(SimulationResult {
        side,
        ideal_tokens: target,
        actual_tokens: tokens,
        theoretical_sol,
        actual_sol: sol,
        completion_pct,
        slippage_pct,
        depth_tokens,
        depth_sol,
        final_price,
        gaps_used,
    })
}
