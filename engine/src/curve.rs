//! Integer bonding-curve primitives.
//!
//! Virtual constant product: `sol_reserve * token_reserve = K`, seeded with
//! 30 SOL against 1.073B tokens. The curve position is carried as a price, so
//! every call recovers the token reserve `x = isqrt(K * PRICE_FACTOR / price)`
//! and works in reserves from there. The trader receives floor and pays ceil.
//!
//! Every function returns `None` when the operation is impossible inside
//! `[MIN_PRICE, MAX_PRICE]` or an amount would not fit in `u64`.

use crate::{Price, SolAmount, TokenAmount};
use uint::construct_uint;

construct_uint! {
    /// 256-bit intermediate for reserve products.
    pub struct U256(4);
}

pub const INITIAL_SOL_RESERVE: u64 = 30_000_000_000;
pub const INITIAL_TOKEN_RESERVE: u64 = 1_073_000_000_000_000;
pub const K: u128 = INITIAL_SOL_RESERVE as u128 * INITIAL_TOKEN_RESERVE as u128;
/// lamports-per-token-unit to price units: 10^(26 - 9 + 6)
pub const PRICE_FACTOR: u128 = 100_000_000_000_000_000_000_000;

pub const MIN_PRICE: Price = Price(1_000_000_000_000);
pub const MAX_PRICE: Price = Price(10_000_000_000_000_000_000_000_000_000_000_000);

fn kf() -> U256 { U256::from(K) * U256::from(PRICE_FACTOR) }

fn narrow_u64(v: U256) -> Option<u64> {
    if v > U256::from(u64::MAX) { None } else { Some(v.low_u64()) }
}

fn narrow_u128(v: U256) -> Option<u128> {
    if v > U256::from(u128::MAX) { None } else { Some(v.low_u128()) }
}

fn ceil_div(a: U256, b: U256) -> U256 {
    let (q, r) = a.div_mod(b);
    if r.is_zero() { q } else { q + U256::one() }
}

fn in_domain(p: Price) -> bool { p >= MIN_PRICE && p <= MAX_PRICE }

fn isqrt_reserve(p: Price) -> Option<u64> {
    if p.0 == 0 { return None; }
    narrow_u64((kf() / U256::from(p.0)).integer_sqrt()).filter(|x| *x > 0)
}

/// Token reserve (base units) the curve holds at `price`.
pub fn reserve_at(price: Price) -> Option<u64> {
    if !in_domain(price) { return None; }
    isqrt_reserve(price)
}

/// Price after the token reserve moved to `reserve`. Reserves past the domain
/// edges are rejected; rounding right at an edge is clamped back into it.
pub fn price_at(reserve: u64) -> Option<Price> {
    let lo = isqrt_reserve(MAX_PRICE)?;
    let hi = isqrt_reserve(MIN_PRICE)?;
    if reserve < lo || reserve > hi { return None; }
    let x = U256::from(reserve);
    let p = narrow_u128(kf() / (x * x))?;
    Some(Price(p).clamp(MIN_PRICE, MAX_PRICE))
}

/// SOL reserve (lamports) implied at `price`, floor(K / x).
pub fn sol_reserve_at(price: Price) -> Option<SolAmount> {
    let x = reserve_at(price)?;
    Some(SolAmount((K / x as u128) as u64))
}

pub fn initial_price() -> Price {
    Price(INITIAL_SOL_RESERVE as u128 * PRICE_FACTOR / INITIAL_TOKEN_RESERVE as u128)
}

// sol lamports paid to move the token reserve from x0 down to x1
fn sol_between(x0: u64, x1: u64, round_up: bool) -> Option<u64> {
    let (hi, lo) = (x0.max(x1), x0.min(x1));
    let num = U256::from(K).checked_mul(U256::from(hi - lo))?;
    let den = U256::from(hi).checked_mul(U256::from(lo))?;
    narrow_u64(if round_up { ceil_div(num, den) } else { num / den })
}

pub fn buy_from_price_with_sol_input(price: Price, sol_in: SolAmount) -> Option<(Price, TokenAmount)> {
    if sol_in.is_zero() { return None; }
    let x0 = reserve_at(price)?;
    let (s, x) = (U256::from(sol_in.0), U256::from(x0));
    let num = s.checked_mul(x.checked_mul(x)?)?;
    let den = U256::from(K).checked_add(s.checked_mul(x)?)?;
    let out = narrow_u64(num / den)?;
    if out == 0 { return Some((price, TokenAmount::ZERO)); }
    let new_price = price_at(x0 - out)?;
    Some((new_price, TokenAmount(out)))
}

pub fn buy_from_price_with_token_output(price: Price, token_out: TokenAmount) -> Option<(Price, SolAmount)> {
    if token_out.is_zero() { return None; }
    let x0 = reserve_at(price)?;
    if token_out.0 >= x0 { return None; }
    let x1 = x0 - token_out.0;
    let new_price = price_at(x1)?;
    Some((new_price, SolAmount(sol_between(x0, x1, true)?)))
}

/// SOL paid and tokens received moving the curve from `start` up to `end`.
pub fn buy_from_price_to_price(start: Price, end: Price) -> Option<(SolAmount, TokenAmount)> {
    if end < start { return None; }
    let x0 = reserve_at(start)?;
    let x1 = reserve_at(end)?;
    if x1 >= x0 { return Some((SolAmount::ZERO, TokenAmount::ZERO)); }
    Some((SolAmount(sol_between(x0, x1, true)?), TokenAmount(x0 - x1)))
}

pub fn sell_from_price_with_token_input(price: Price, token_in: TokenAmount) -> Option<(Price, SolAmount)> {
    if token_in.is_zero() { return None; }
    let x0 = reserve_at(price)?;
    let x1 = x0.checked_add(token_in.0)?;
    let new_price = price_at(x1)?;
    Some((new_price, SolAmount(sol_between(x0, x1, false)?)))
}

/// Tokens that must be sold from `price` to receive exactly `sol_out`.
pub fn sell_from_price_with_sol_output(price: Price, sol_out: SolAmount) -> Option<(Price, TokenAmount)> {
    if sol_out.is_zero() { return None; }
    let x0 = reserve_at(price)?;
    let (s, x) = (U256::from(sol_out.0), U256::from(x0));
    let sx = s.checked_mul(x)?;
    let k = U256::from(K);
    if sx >= k { return None; }
    let token_in = narrow_u64(ceil_div(sx.checked_mul(x)?, k - sx))?;
    let new_price = price_at(x0.checked_add(token_in)?)?;
    Some((new_price, TokenAmount(token_in)))
}

/// Tokens sold and SOL received moving the curve from `start` down to `end`.
pub fn sell_from_price_to_price(start: Price, end: Price) -> Option<(TokenAmount, SolAmount)> {
    if end > start { return None; }
    let x0 = reserve_at(start)?;
    let x1 = reserve_at(end)?;
    if x1 <= x0 { return Some((TokenAmount::ZERO, SolAmount::ZERO)); }
    Some((TokenAmount(x1 - x0), SolAmount(sol_between(x0, x1, false)?)))
}
