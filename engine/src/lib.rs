//! Off-chain quoting engine for a leveraged bonding-curve market.
//!
//! Open leveraged positions lock price ranges on the curve. Trades jump over
//! those ranges, so quotes, size limits and stop-loss prices all have to be
//! computed against the book of locked segments rather than the bare curve.

pub mod book;
pub mod close;
pub mod config;
pub mod curve;
pub mod error;
pub mod ingest;
pub mod optimize;
pub mod risk;
pub mod simulate;
pub mod types;

pub use book::{Gap, SegmentBook, Slot};
pub use close::{estimate_close, tokens_for_sol, unrealized_pnl};
pub use config::{SearchConfig, SimulatorConfig, StopLossConfig};
pub use error::{Result, SimError};
pub use ingest::{BookSnapshot, OrderRecordV1};
pub use optimize::{max_buy_tokens_for_budget, max_sell_tokens_for_budget, SearchOutcome};
pub use risk::{implied_leverage, solve_stop_loss, StopLossResult};
pub use simulate::{simulate_buy, simulate_buy_exact_tokens, simulate_sell, SimulationResult};
pub use types::*;
