//! Largest trade size that fits a budget.
//!
//! Curve output is non-linear in input and locked segments add jumps, so a
//! naive estimate can overshoot what the book can fill. The search treats the
//! simulator as an oracle and relies only on cost being monotone in size.

use crate::book::SegmentBook;
use crate::config::SearchConfig;
use crate::error::{Result, SimError};
use crate::simulate::{simulate_buy_exact_tokens, simulate_sell};
use crate::{curve, SolAmount, TokenAmount};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SearchOutcome<T> {
    Converged { value: T, iterations: u32 },
    /// Iteration cap hit before the interval narrowed; `best` is still feasible.
    Exhausted { best: T, iterations: u32 },
}

impl<T: Copy> SearchOutcome<T> {
    pub fn value(&self) -> T {
        match *self { SearchOutcome::Converged { value, .. } => value, SearchOutcome::Exhausted { best, .. } => best }
    }

    pub fn iterations(&self) -> u32 {
        match *self { SearchOutcome::Converged { iterations, .. } | SearchOutcome::Exhausted { iterations, .. } => iterations }
    }

    pub fn is_converged(&self) -> bool { matches!(self, SearchOutcome::Converged { .. }) }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SearchOutcome<U> {
        match self {
            SearchOutcome::Converged { value, iterations } => SearchOutcome::Converged { value: f(value), iterations },
            SearchOutcome::Exhausted { best, iterations } => SearchOutcome::Exhausted { best: f(best), iterations },
        }
    }
}

/// Binary search for the largest size in `[floor, estimate]` whose cost is
/// within `budget`. The oracle returns `Ok(None)` when the size cannot be
/// filled at all; errors count as infeasible too.
///
/// An infeasible floor is `NoFeasibleAmount` rather than the floor itself, so
/// a returned size never costs more than `budget`. Converges once fewer than
/// `precision` unresolved sizes remain above the best feasible one.
pub fn max_feasible<F>(floor: u64, estimate: u64, budget: u64, cfg: &SearchConfig, mut cost: F) -> Result<SearchOutcome<u64>>
where
    F: FnMut(u64) -> Result<Option<u64>>,
{
    let floor = floor.max(1);
    if estimate < floor { return Err(SimError::NoFeasibleAmount); }
    let mut feasible = |size: u64| matches!(cost(size), Ok(Some(c)) if c <= budget);

    if feasible(estimate) { return Ok(SearchOutcome::Converged { value: estimate, iterations: 0 }); }
    if !feasible(floor) { return Err(SimError::NoFeasibleAmount); }

    // lo is always feasible, everything above hi is not
    let (mut lo, mut hi) = (floor, estimate - 1);
    let mut iterations = 0u32;
    while lo < hi && hi - lo >= cfg.precision {
        if iterations >= cfg.max_iterations {
            debug!(lo, hi, iterations, "amount search hit its iteration cap");
            return Ok(SearchOutcome::Exhausted { best: lo, iterations });
        }
        iterations += 1;
        let mid = lo + (hi - lo + 1) / 2;
        if feasible(mid) { lo = mid } else { hi = mid - 1 }
        debug!(mid, lo, hi, iterations, "amount search step");
    }
    Ok(SearchOutcome::Converged { value: lo, iterations })
}

/// Tokens a frictionless curve would give for `sol`; the usual starting estimate.
pub fn naive_buy_estimate(book: &SegmentBook, sol: SolAmount) -> Option<TokenAmount> {
    curve::buy_from_price_with_sol_input(book.spot(), sol).map(|(_, t)| t)
}

/// Largest token amount buyable through the up-book for at most `sol_budget`.
pub fn max_buy_tokens_for_budget(book: &SegmentBook, sol_budget: SolAmount, estimate: TokenAmount, cfg: &SearchConfig) -> Result<SearchOutcome<TokenAmount>> {
    max_feasible(1, estimate.0, sol_budget.0, cfg, |t| {
        let r = simulate_buy_exact_tokens(book, TokenAmount(t))?;
        Ok(r.is_complete().then_some(r.actual_sol.0))
    })
    .map(|o| o.map(TokenAmount))
}

/// Largest token amount sellable through the down-book whose proceeds stay
/// within `sol_cap`; sizes a short against its notional limit.
pub fn max_sell_tokens_for_budget(book: &SegmentBook, sol_cap: SolAmount, estimate: TokenAmount, cfg: &SearchConfig) -> Result<SearchOutcome<TokenAmount>> {
    max_feasible(1, estimate.0, sol_cap.0, cfg, |t| {
        let r = simulate_sell(book, TokenAmount(t))?;
        Ok(r.is_complete().then_some(r.actual_sol.0))
    })
    .map(|o| o.map(TokenAmount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::tests::seg;
    use crate::{BookSide, Price};

    // 100 lamports per token unit, so single units move the cost
    const S: u128 = 10_000_000_000_000_000_000_000_000;

    fn exact() -> SearchConfig { SearchConfig { max_iterations: 64, precision: 1 } }

    fn up_book() -> SegmentBook {
        SegmentBook::new(BookSide::Up, Price(S), vec![seg(S + S / 100, S + S / 500_000_000, "a")]).unwrap()
    }

    fn buy_cost(book: &SegmentBook, t: u64) -> Option<u64> {
        let r = simulate_buy_exact_tokens(book, TokenAmount(t)).ok()?;
        r.is_complete().then_some(r.actual_sol.0)
    }

    #[test]
    fn test_generic_search_matches_scan() {
        let cost = |x: u64| -> Result<Option<u64>> { Ok(Some(x * x)) };
        let out = max_feasible(1, 1_000, 250_000, &exact(), cost).unwrap();
        assert_eq!(out.value(), 500);
        assert!(out.is_converged());
    }

    #[test]
    fn test_unit_precision_resolves_last_step() {
        // the answer is the top of the searched range
        let cost = |x: u64| -> Result<Option<u64>> { Ok(Some(x)) };
        let out = max_feasible(1, 12, 11, &exact(), cost).unwrap();
        assert_eq!(out.value(), 11);
        let coarse = SearchConfig { max_iterations: 64, precision: 100 };
        let out = max_feasible(1, 1_000, 700, &coarse, |x: u64| -> Result<Option<u64>> { Ok(Some(x)) }).unwrap();
        assert!(out.is_converged() && out.value() <= 700 && 700 - out.value() < 100);
    }

    #[test]
    fn test_oracle_errors_count_as_infeasible() {
        let cost = |x: u64| -> Result<Option<u64>> {
            if x > 700 { Err(SimError::ZeroAmount) } else if x > 600 { Ok(None) } else { Ok(Some(x)) }
        };
        let out = max_feasible(1, 1_000, 10_000, &exact(), cost).unwrap();
        assert_eq!(out.value(), 600);
    }

    #[test]
    fn test_buy_search_against_exhaustive_scan() {
        let book = up_book();
        let budget = 150_000u64;
        let estimate = 3_000u64;
        let true_max = (1..=estimate).filter(|t| buy_cost(&book, *t).is_some_and(|c| c <= budget)).max().unwrap();

        let out = max_buy_tokens_for_budget(&book, SolAmount(budget), TokenAmount(estimate), &exact()).unwrap();
        let got = out.value().0;
        assert!(buy_cost(&book, got).unwrap() <= budget);
        assert_eq!(got, true_max);
    }

    #[test]
    fn test_iteration_cap_returns_best_so_far() {
        let book = up_book();
        let cfg = SearchConfig { max_iterations: 3, precision: 1 };
        let out = max_buy_tokens_for_budget(&book, SolAmount(150_000), TokenAmount(3_000), &cfg).unwrap();
        assert!(matches!(out, SearchOutcome::Exhausted { iterations: 3, .. }));
        assert!(buy_cost(&book, out.value().0).unwrap() <= 150_000);
    }

    #[test]
    fn test_estimate_within_budget_is_returned() {
        let book = up_book();
        let out = max_buy_tokens_for_budget(&book, SolAmount(1_000_000), TokenAmount(100), &exact()).unwrap();
        assert_eq!(out, SearchOutcome::Converged { value: TokenAmount(100), iterations: 0 });
    }

    #[test]
    fn test_nothing_fits() {
        let book = up_book();
        let e = max_buy_tokens_for_budget(&book, SolAmount(0), TokenAmount(100), &exact()).unwrap_err();
        assert_eq!(e, SimError::NoFeasibleAmount);
    }

    #[test]
    fn test_sell_search_respects_cap() {
        let book = SegmentBook::new(BookSide::Down, Price(S), vec![seg(S - S / 100, S - S / 500_000_000, "a")]).unwrap();
        let cap = 90_000u64;
        let out = max_sell_tokens_for_budget(&book, SolAmount(cap), TokenAmount(2_000), &exact()).unwrap();
        let got = out.value().0;
        let proceeds = |t: u64| simulate_sell(&book, TokenAmount(t)).unwrap().actual_sol.0;
        assert!(proceeds(got) <= cap);
        assert!(proceeds(got + 1) > cap);
    }

    #[test]
    fn test_naive_estimate_overshoots_locked_book() {
        let book = up_book();
        let est = naive_buy_estimate(&book, SolAmount(150_000)).unwrap();
        assert!(buy_cost(&book, est.0).unwrap() > 150_000);
    }
}
