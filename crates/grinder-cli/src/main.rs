mod budget;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::core::{CoreArgs, ExchangePortKind};

#[derive(Parser)]
#[command(name = "grinder")]
#[command(about = "GRINDER adaptive grid-trading engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON.
    ConfigHash {
        /// Paths in merge order (base -> env -> engine -> risk -> stress...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Run lifecycle commands (attribution + evidence/exports init).
    Run {
        #[command(subcommand)]
        cmd: RunCmd,
    },

    /// Replay a fixture (or, with `--mainnet`, drive the live futures port)
    /// through the decision pipeline symbol by symbol.
    Core {
        /// Path to a newline-delimited TickEvent JSON fixture.
        #[arg(long)]
        fixture: String,

        /// Arm order dispatch. Without this flag the pipeline runs in
        /// observe-only mode: every gate that checks NOT_ARMED refuses.
        #[arg(long)]
        armed: bool,

        /// Which exchange port to route dispatched orders through.
        #[arg(long = "exchange-port", value_enum, default_value = "noop")]
        exchange_port: ExchangePortKind,

        /// Trade against the live mainnet API instead of the paper broker.
        /// Requires --armed and ALLOW_MAINNET_TRADE=1 in the environment.
        #[arg(long)]
        mainnet: bool,

        /// Comma-separated symbol whitelist, e.g. BTCUSDT,ETHUSDT.
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,

        /// Paper/base order size per grid level, in quantity steps.
        #[arg(long = "paper-size-per-level", default_value_t = 1_000)]
        paper_size_per_level: i64,

        /// Override the minimum order notional gate, in USD x1000.
        #[arg(long = "max-notional-per-order")]
        max_notional_per_order: Option<i64>,

        /// Serve Prometheus text exposition on this port until Ctrl-C.
        #[arg(long = "metrics-port")]
        metrics_port: Option<u16>,

        /// Force today's persisted order budget back to zero.
        #[arg(long = "reset-budget")]
        reset_budget: bool,

        /// Directory for persisted per-day state (budget.json, etc).
        #[arg(long = "state-dir", default_value = "./state")]
        state_dir: String,

        /// Root directory for evidence artifacts. Omit to skip evidence
        /// writing (e.g. for quick local fixture smoke tests).
        #[arg(long = "artifact-dir")]
        artifact_dir: Option<String>,
    },
}

#[derive(Subcommand)]
enum RunCmd {
    /// Print run attribution (run_id, git_hash, config_hash,
    /// host_fingerprint) and initialize the exports directory.
    Start {
        /// Engine ID (e.g. MAIN, EXP)
        #[arg(long)]
        engine: String,

        /// Mode (BACKTEST | PAPER | LIVE_TRADE)
        #[arg(long)]
        mode: String,

        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Root directory under which `exports/<run_id>/...` is created.
        #[arg(long = "exports-root", default_value = "./exports")]
        exports_root: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = grinder_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Run { cmd } => match cmd {
            RunCmd::Start { engine, mode, config_paths, exports_root } => {
                commands::run::run_start(engine, mode, config_paths, exports_root)?;
            }
        },

        Commands::Core {
            fixture,
            armed,
            exchange_port,
            mainnet,
            symbols,
            paper_size_per_level,
            max_notional_per_order,
            metrics_port,
            reset_budget,
            state_dir,
            artifact_dir,
        } => {
            commands::core::run_core(CoreArgs {
                fixture,
                armed,
                exchange_port,
                mainnet,
                symbols: symbols.iter().map(|s| s.trim().to_ascii_uppercase()).collect(),
                paper_size_per_level,
                max_notional_per_order,
                metrics_port,
                reset_budget,
                state_dir,
                artifact_dir,
            })
            .await?;
        }
    }

    Ok(())
}
