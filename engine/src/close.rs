//! Estimates for unwinding an open position against the current book.

use crate::book::SegmentBook;
use crate::curve;
use crate::error::{Result, SimError};
use crate::simulate::{simulate_buy_exact_tokens, simulate_sell, SimulationResult};
use crate::{PositionSide, Price, SolAmount, TokenAmount};

/// Simulate closing `size` tokens: a long sells through the down-book, a
/// short buys back through the up-book.
pub fn estimate_close(book: &SegmentBook, side: PositionSide, size: TokenAmount) -> Result<SimulationResult> {
    match side {
        PositionSide::Long => simulate_sell(book, size),
        PositionSide::Short => simulate_buy_exact_tokens(book, size),
    }
}

/// Tokens to sell from `spot` to take exactly `sol_out` off the curve.
pub fn tokens_for_sol(spot: Price, sol_out: SolAmount) -> Result<TokenAmount> {
    if sol_out.is_zero() { return Err(SimError::ZeroAmount); }
    curve::sell_from_price_with_sol_output(spot, sol_out)
        .map(|(_, tokens)| tokens)
        .ok_or(SimError::CurveRejected { op: "sell with sol output", price: spot })
}

/// Signed lamports gained by closing for `close_sol` a position opened for `entry_sol`.
pub fn unrealized_pnl(side: PositionSide, entry_sol: SolAmount, close_sol: SolAmount) -> i128 {
    let (entry, close) = (entry_sol.0 as i128, close_sol.0 as i128);
    match side {
        PositionSide::Long => close - entry,
        PositionSide::Short => entry - close,
    }
}
