use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use event_insights::config::AppConfig;
use event_insights::pipeline::report::{analyze_input, generate_report};
use event_insights::{logging, observability, server};

#[derive(Parser)]
#[command(name = "event_insights")]
#[command(about = "Event ticket sales cleaning, aggregation and insight report generator")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Input CSV, overriding the configured path
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    /// Output directory, overriding the configured one
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write the report, charts and insights
    Generate,
    /// Print the derived insight facts as JSON without writing files
    Insights {
        /// Include the cleaning summary and aggregates
        #[arg(long)]
        full: bool,
    },
    /// Serve the report endpoints over HTTP
    Serve {
        /// Bind address, overriding the configured one
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(input) = cli.input {
        config.input_path = input;
    }
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }

    let _log_guard = logging::init_logging(&config.logging.log_dir);

    if let Some(addr) = config.metrics.listen {
        if let Err(e) = observability::init(addr) {
            error!("Failed to start metrics exporter: {}", e);
        }
    }

    match cli.command {
        Commands::Generate => {
            println!("🔄 Generating report from {}...", config.input_path.display());
            let handle = tokio::task::spawn_blocking(move || generate_report(&config))
                .await
                .context("report job did not complete")??;
            info!(run_id = %handle.run_id, "Report run finished");
            println!("✅ Report written to {}", handle.report_path.display());
            println!("   Insights: {}", handle.insights_path.display());
            println!("   Charts: {}", handle.chart_paths.len());
            println!(
                "   Rows: {} in, {} kept",
                handle.cleaning.rows_in, handle.cleaning.rows_out
            );
            println!("   Input SHA-256: {}", handle.input_fingerprint);
        }
        Commands::Insights { full } => {
            let analysis = analyze_input(&config)?;
            let json = if full {
                serde_json::to_string_pretty(&analysis)?
            } else {
                serde_json::to_string_pretty(&analysis.facts)?
            };
            println!("{json}");
        }
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            server::start_server(config)
                .await
                .map_err(|e| anyhow::anyhow!("server error: {e}"))?;
        }
    }
    Ok(())
}
