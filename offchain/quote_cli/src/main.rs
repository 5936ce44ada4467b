use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use lockcurve_engine::optimize::naive_buy_estimate;
use lockcurve_engine::simulate::depth;
use lockcurve_engine::{
    curve, estimate_close, max_buy_tokens_for_budget, max_sell_tokens_for_budget, simulate_buy,
    simulate_buy_exact_tokens, simulate_sell, solve_stop_loss, tokens_for_sol, unrealized_pnl, PositionSide, Price,
    SearchConfig, SimulatorConfig, SolAmount, TokenAmount,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod snapshot;
use snapshot::{load_books, load_config, Books, Source};

#[derive(Parser, Debug)]
#[command(name = "lockcurve-quote", about = "Quote trades and stop-losses against a snapshot of locked liquidity")]
struct Cli {
    /// Book snapshot JSON file, or `-` for stdin
    #[arg(long, global = true, env = "LOCKCURVE_SNAPSHOT")]
    snapshot: Option<String>,
    /// Simulator tunables as JSON
    #[arg(long, global = true, env = "LOCKCURVE_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Launch price of the curve
    InitialPrice,
    /// Buy through the up-book, by SOL in or exact tokens out
    Buy {
        #[arg(long, required_unless_present = "tokens", conflicts_with = "tokens")]
        sol: Option<String>,
        #[arg(long)]
        tokens: Option<String>,
        #[arg(long, default_value_t = 100)]
        tolerance_bps: u32,
    },
    /// Sell tokens through the down-book
    Sell {
        #[arg(long)]
        tokens: String,
        #[arg(long, default_value_t = 100)]
        tolerance_bps: u32,
    },
    /// Largest token buy that costs at most `--sol`
    MaxBuy {
        #[arg(long)]
        sol: String,
        /// Upper bound for the search, in tokens; defaults to the bare-curve output
        #[arg(long)]
        estimate: Option<String>,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Largest token sell whose proceeds stay within `--sol-cap`
    MaxSell {
        #[arg(long)]
        sol_cap: String,
        /// Upper bound for the search, in tokens; defaults to the down-book depth
        #[arg(long)]
        estimate: Option<String>,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Stop-loss price whose close range avoids locked liquidity
    StopLoss {
        #[arg(long, value_enum)]
        side: Position,
        /// Desired stop-loss, SOL per token
        #[arg(long)]
        price: String,
        /// Position size in tokens
        #[arg(long)]
        size: String,
        #[arg(long)]
        step_bps: Option<u32>,
        #[arg(long)]
        max_iterations: Option<u32>,
    },
    /// Cost or proceeds of closing a position now
    Close {
        #[arg(long, value_enum)]
        side: Position,
        #[arg(long)]
        size: String,
        /// SOL the position was opened with, to report unrealized PnL
        #[arg(long)]
        entry_sol: Option<String>,
        /// Also report tokens to sell for this much SOL
        #[arg(long)]
        take_profit_sol: Option<String>,
    },
}

#[derive(Args, Debug)]
struct SearchArgs {
    #[arg(long)]
    max_iterations: Option<u32>,
    /// Convergence width in token base units
    #[arg(long)]
    precision: Option<u64>,
}

impl SearchArgs {
    fn apply(&self, mut cfg: SearchConfig) -> SearchConfig {
        if let Some(n) = self.max_iterations { cfg.max_iterations = n; }
        if let Some(p) = self.precision { cfg.precision = p; }
        cfg
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Position { Long, Short }

impl From<Position> for PositionSide {
    fn from(p: Position) -> Self {
        match p { Position::Long => PositionSide::Long, Position::Short => PositionSide::Short }
    }
}

#[derive(Serialize)]
struct PriceView { raw: Price, ui: String }

impl From<Price> for PriceView {
    fn from(p: Price) -> Self { Self { raw: p, ui: p.to_ui_string() } }
}

fn sol_arg(flag: &str, v: &str) -> Result<SolAmount> {
    SolAmount::from_ui_str(v).with_context(|| format!("invalid --{flag} {v}"))
}

fn token_arg(flag: &str, v: &str) -> Result<TokenAmount> {
    TokenAmount::from_ui_str(v).with_context(|| format!("invalid --{flag} {v}"))
}

fn books(cli: &Cli) -> Result<Books> {
    let Some(arg) = cli.snapshot.as_deref() else { bail!("--snapshot is required for this command") };
    load_books(&Source::from_arg(arg))
}

fn run(cli: &Cli, cfg: &SimulatorConfig) -> Result<Value> {
    let out = match &cli.command {
        Command::InitialPrice => json!({ "initial_price": PriceView::from(curve::initial_price()) }),
        Command::Buy { sol, tokens, tolerance_bps } => {
            let b = books(cli)?;
            let r = match (sol, tokens) {
                (Some(s), _) => simulate_buy(&b.up, sol_arg("sol", s)?)?,
                (None, Some(t)) => simulate_buy_exact_tokens(&b.up, token_arg("tokens", t)?)?,
                (None, None) => bail!("one of --sol or --tokens is required"),
            };
            info!(completion = r.completion_pct, slippage = r.slippage_pct, "buy simulated");
            json!({ "spot": PriceView::from(b.up.spot()), "max_sol_cost": r.max_sol_cost(*tolerance_bps), "result": r })
        }
        Command::Sell { tokens, tolerance_bps } => {
            let b = books(cli)?;
            let r = simulate_sell(&b.down, token_arg("tokens", tokens)?)?;
            info!(completion = r.completion_pct, slippage = r.slippage_pct, "sell simulated");
            json!({ "spot": PriceView::from(b.down.spot()), "min_sol_out": r.min_sol_out(*tolerance_bps), "result": r })
        }
        Command::MaxBuy { sol, estimate, search } => {
            let b = books(cli)?;
            let budget = sol_arg("sol", sol)?;
            let estimate = match estimate {
                Some(e) => token_arg("estimate", e)?,
                None => naive_buy_estimate(&b.up, budget).context("curve cannot price the budget")?,
            };
            let outcome = max_buy_tokens_for_budget(&b.up, budget, estimate, &search.apply(cfg.search))?;
            info!(tokens = %outcome.value(), iterations = outcome.iterations(), converged = outcome.is_converged(), "max buy found");
            let quote = simulate_buy_exact_tokens(&b.up, outcome.value())?;
            json!({ "spot": PriceView::from(b.up.spot()), "estimate": estimate, "outcome": outcome, "quote": quote })
        }
        Command::MaxSell { sol_cap, estimate, search } => {
            let b = books(cli)?;
            let cap = sol_arg("sol-cap", sol_cap)?;
            let estimate = match estimate {
                Some(e) => token_arg("estimate", e)?,
                None => depth(&b.down)?.0,
            };
            let outcome = max_sell_tokens_for_budget(&b.down, cap, estimate, &search.apply(cfg.search))?;
            info!(tokens = %outcome.value(), iterations = outcome.iterations(), converged = outcome.is_converged(), "max sell found");
            let quote = simulate_sell(&b.down, outcome.value())?;
            json!({ "spot": PriceView::from(b.down.spot()), "estimate": estimate, "outcome": outcome, "quote": quote })
        }
        Command::StopLoss { side, price, size, step_bps, max_iterations } => {
            let b = books(cli)?;
            let side = PositionSide::from(*side);
            let desired = Price::from_ui_str(price).with_context(|| format!("invalid --price {price}"))?;
            let mut sl = cfg.stop_loss;
            if let Some(s) = step_bps { sl.step_bps = *s; }
            if let Some(n) = max_iterations { sl.max_iterations = *n; }
            let book = match side { PositionSide::Long => &b.down, PositionSide::Short => &b.up };
            let r = solve_stop_loss(book, side, desired, token_arg("size", size)?, &sl)?;
            info!(%side, price = %r.executable_price.to_ui_string(), iterations = r.iterations, "stop-loss placed");
            json!({
                "spot": PriceView::from(book.spot()),
                "executable": PriceView::from(r.executable_price),
                "result": r,
            })
        }
        Command::Close { side, size, entry_sol, take_profit_sol } => {
            let b = books(cli)?;
            let side = PositionSide::from(*side);
            let book = match side { PositionSide::Long => &b.down, PositionSide::Short => &b.up };
            let r = estimate_close(book, side, token_arg("size", size)?)?;
            let pnl = entry_sol.as_deref().map(|e| sol_arg("entry-sol", e)).transpose()?.map(|e| unrealized_pnl(side, e, r.actual_sol));
            let take_profit = take_profit_sol.as_deref()
                .map(|s| -> Result<TokenAmount> { Ok(tokens_for_sol(b.down.spot(), sol_arg("take-profit-sol", s)?)?) })
                .transpose()?;
            info!(%side, sol = %r.actual_sol, "close estimated");
            json!({
                "spot": PriceView::from(book.spot()),
                "result": r,
                "unrealized_pnl_lamports": pnl.map(|p| p.to_string()),
                "take_profit_tokens": take_profit,
            })
        }
    };
    Ok(out)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;
    let out = run(&cli, &cfg)?;
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
