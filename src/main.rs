use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pa_engine::loader::load_candles;
use pa_engine::price_action::{build_context_from_base, build_strategy_view, TimeframeContext};
use pa_engine::{EngineConfig, Timeframe};

#[derive(Parser, Debug)]
#[command(name = "pa-engine")]
#[command(about = "Multi-timeframe price-action context from OHLC candles")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Print debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON engine config (defaults apply to anything it leaves out)
    #[arg(short, long, global = true, env = "PA_ENGINE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the multi-timeframe context and print its JSON summary
    Context {
        /// Base candle file (.csv or .csv.zst)
        #[arg(long)]
        candles: PathBuf,

        #[arg(short, long, default_value = "EURUSD")]
        instrument: String,

        /// Timeframes to build (comma-separated)
        #[arg(short, long, value_delimiter = ',', default_value = "M1,M5,M15,H1")]
        timeframes: Vec<Timeframe>,
    },

    /// Build the strategy view for a base/higher timeframe pair
    Strategy {
        /// Base candle file (.csv or .csv.zst)
        #[arg(long)]
        candles: PathBuf,

        #[arg(short, long, default_value = "EURUSD")]
        instrument: String,

        /// Timeframes to build (comma-separated)
        #[arg(short, long, value_delimiter = ',', default_value = "M1,M5,M15,H1")]
        timeframes: Vec<Timeframe>,

        /// Lower timeframe driving price, OB/FVG and sweep selection
        #[arg(long, default_value = "M5")]
        base: Timeframe,

        /// Reference timeframe for the trend filter
        #[arg(long, default_value = "M15")]
        higher: Timeframe,
    },

    /// List swings, order blocks, FVGs and liquidity of one timeframe
    Structure {
        /// Base candle file (.csv or .csv.zst)
        #[arg(long)]
        candles: PathBuf,

        #[arg(long, default_value = "M5")]
        timeframe: Timeframe,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(p) => {
            info!("Loading engine config from {:?}", p);
            EngineConfig::from_json_file(p)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let default_directive = if args.verbose { "pa_engine=debug" } else { "pa_engine=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(args.config.as_ref())?;

    match args.command {
        Commands::Context {
            candles,
            instrument,
            timeframes,
        } => {
            let base = load_candles(&candles)?;
            info!("Loaded {} candles from {:?}", base.len(), candles);
            let ctx = build_context_from_base(&instrument, base, &timeframes, &config);
            let summary = ctx.summary(&config.summary);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Strategy {
            candles,
            instrument,
            timeframes,
            base,
            higher,
        } => {
            let series = load_candles(&candles)?;
            info!("Loaded {} candles from {:?}", series.len(), candles);
            let ctx = build_context_from_base(&instrument, series, &timeframes, &config);
            let view = build_strategy_view(&ctx, base, higher, &config.strategy)
                .with_context(|| format!("Failed to build strategy view for {}/{}", base, higher))?;
            println!("{}", serde_json::to_string_pretty(&view.summary())?);
        }
        Commands::Structure { candles, timeframe } => {
            let series = load_candles(&candles)?;
            let ctx = build_context_from_base("-", series, &[timeframe], &config);
            if let Some(tf_ctx) = ctx.get(timeframe) {
                print_structure(tf_ctx);
            }
        }
    }

    Ok(())
}

fn print_structure(ctx: &TimeframeContext) {
    println!("=== {} ({} candles) ===", ctx.timeframe, ctx.frame.len());
    println!("Trend: {} - {}", ctx.trend.kind, ctx.trend.reason);

    println!("\nSwings ({}):", ctx.swings.len());
    for s in &ctx.swings {
        let label = s.label.map_or_else(|| "-".to_string(), |l| l.to_string());
        println!("  {} {:>4} {:>12.5} {}", s.timestamp(), s.kind(), s.price(), label);
    }

    println!("\nOrder blocks ({}):", ctx.order_blocks.len());
    for ob in &ctx.order_blocks {
        println!(
            "  {} {:<6} [{:.5}, {:.5}] body [{:.5}, {:.5}] BOS {} @ {:.5} score {:.1}",
            ob.timestamp,
            ob.kind,
            ob.low,
            ob.high,
            ob.body_low,
            ob.body_high,
            ob.bos_timestamp,
            ob.broken_level,
            ob.score_value()
        );
    }

    println!("\nFair value gaps ({}):", ctx.fvgs.len());
    for g in &ctx.fvgs {
        let filled = g.filled_at.map_or_else(|| "open".to_string(), |t| format!("filled {}", t));
        println!(
            "  {} {:<7} [{:.5}, {:.5}] size {:.5} ({}) {}",
            g.start_timestamp,
            g.direction,
            g.gap_low,
            g.gap_high,
            g.size_abs,
            g.size_atr.map_or_else(|| "n/a".to_string(), |v| format!("{:.2} ATR", v)),
            filled
        );
    }

    println!("\nLiquidity levels ({}):", ctx.liquidity_levels.len());
    for l in &ctx.liquidity_levels {
        println!("  {} {:<10} {:.5} touches={}", l.timestamp, l.kind, l.price, l.touches);
    }

    println!("\nSweeps ({}):", ctx.liquidity_sweeps.len());
    for s in &ctx.liquidity_sweeps {
        let score = s.score.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v));
        println!(
            "  {} {:<9} {} {:.5} close {:.5} score {}",
            s.timestamp, s.side, s.level.kind, s.level.price, s.close, score
        );
    }
}
