use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Daily position/portfolio ledger backtests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Run one backtest and print its summary
    Run {
        #[command(flatten)]
        inputs: commands::Inputs,

        /// Write the daily rows as CSV (flushed after every day)
        #[arg(long)]
        out: Option<String>,
    },

    /// Run the commission grid in parallel, one summary line per variant
    Sweep {
        #[command(flatten)]
        inputs: commands::Inputs,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
            let loaded = tally_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Run { inputs, out } => commands::run::run(&inputs, out.as_deref())?,

        Commands::Sweep { inputs } => commands::run::sweep(&inputs)?,
    }

    Ok(())
}
