mod output;
mod report;
mod result;

use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tracelens_analyzer::analyze_collected;
use tracelens_core::config::{AnalyzeConfig, Config};
use tracelens_ingest::read_trace_file;
use tracelens_store::{ShareStore, TtlLabel};

use crate::report::render_markdown;
use crate::result::RunResult;

#[derive(Parser, Debug)]
#[command(name = "tracelens")]
#[command(about = "Offline distributed-trace hierarchy and metrics analyzer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Analyze a trace export file and write a report")]
    Analyze {
        input: PathBuf,
        /// Markdown report path.
        #[arg(short = 'o', long, default_value = "trace_analysis.md")]
        output: PathBuf,
        /// Print the structured run as JSON instead of writing a report.
        #[arg(long)]
        json: bool,
        /// Keep query strings when normalizing paths.
        #[arg(long)]
        keep_query_params: bool,
        /// Count CLIENT spans of server-less services as incoming endpoints.
        #[arg(long)]
        include_gateway_services: bool,
        /// Keep same-service mesh hops in the hierarchy.
        #[arg(long)]
        include_service_mesh: bool,
        /// Worker threads for cross-trace analysis.
        #[arg(long)]
        jobs: Option<usize>,
        /// Save the run as a share snapshot. TTL is 24h, 7d, or 30d;
        /// omitted, the configured default applies.
        #[arg(long, value_name = "TTL", num_args = 0..=1)]
        share: Option<Option<String>>,
    },
    #[command(about = "Manage share snapshots")]
    Shares {
        #[command(subcommand)]
        command: SharesCommand,
    },
}

#[derive(Subcommand, Debug)]
enum SharesCommand {
    #[command(about = "List live shares")]
    List,
    #[command(about = "Print a share's stored run as JSON")]
    Show { id: String },
    #[command(about = "Delete expired shares")]
    Prune,
}

fn main() -> anyhow::Result<()> {
    init_cli_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze {
            input,
            output,
            json,
            keep_query_params,
            include_gateway_services,
            include_service_mesh,
            jobs,
            share,
        } => {
            let analyze_cfg = AnalyzeConfig {
                strip_query_params: !keep_query_params,
                include_gateway_services,
                include_service_mesh,
            };
            run_analyze(&input, &output, json, analyze_cfg, jobs, share)
        }
        Commands::Shares { command } => run_shares(command),
    }
}

fn init_cli_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

fn run_analyze(
    input: &Path,
    output: &Path,
    json: bool,
    analyze_cfg: AnalyzeConfig,
    jobs: Option<usize>,
    share: Option<Option<String>>,
) -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    let workers = jobs.unwrap_or(config.workers);
    let _ = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build_global();

    let collected = read_trace_file(input)
        .with_context(|| format!("reading trace file {}", input.display()))?;
    let dropped = collected.dropped_spans;
    let run = analyze_collected(collected.traces, &analyze_cfg);
    let result = RunResult::build(&run, dropped);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        fs::write(output, render_markdown(&result))
            .with_context(|| format!("writing report {}", output.display()))?;
        output::print_run_summary(&result);
        println!();
        println!("Report saved to {}", output.display());
    }

    if let Some(label) = share {
        let ttl = match label {
            Some(label) => TtlLabel::parse(&label)?,
            None => default_ttl(config.share_ttl)?,
        };
        let store = ShareStore::open(&config.share_dir)?;
        let filename = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.display().to_string());
        let meta = store.save(serde_json::to_value(&result)?, &filename, ttl)?;
        println!("Share created: {} (expires in {})", meta.share_id, ttl.label());
    }
    Ok(())
}

fn default_ttl(configured: std::time::Duration) -> anyhow::Result<TtlLabel> {
    match configured.as_secs() {
        86_400 => Ok(TtlLabel::Day),
        604_800 => Ok(TtlLabel::Week),
        2_592_000 => Ok(TtlLabel::Month),
        _ => anyhow::bail!("configured share_ttl must be one of 24h, 7d, 30d"),
    }
}

fn run_shares(command: SharesCommand) -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    let store = ShareStore::open(&config.share_dir)?;
    match command {
        SharesCommand::List => {
            let shares = store.list()?;
            if shares.is_empty() {
                println!("no live shares");
                return Ok(());
            }
            for share in shares {
                println!(
                    "{}  ttl={:<3}  created={}  expires={}  {}",
                    share.share_id,
                    share.ttl.label(),
                    share.created_at,
                    share.expires_at,
                    share.filename
                );
            }
        }
        SharesCommand::Show { id } => match store.load(&id)? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record.payload)?),
            None => anyhow::bail!("share {id} not found or expired"),
        },
        SharesCommand::Prune => {
            let deleted = store.prune()?;
            println!("deleted {deleted} expired share(s)");
        }
    }
    Ok(())
}
