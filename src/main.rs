// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use alert_triage::exporter::render_ai;
use alert_triage::iplist::{normalize, search};
use alert_triage::pipeline::collect_inputs;
use alert_triage::utils::logging::{
    format_error, format_info, format_step, format_success, format_warning,
};
use alert_triage::{
    BatchRunner, Config, FileListStore, HistoryStore, IntelAggregator, IntelSlot, JsonExporter,
    ListKind, ListSource, PairIntel, PipelineOrchestrator, PipelineResult, RunOptions, Validator,
    render_intel,
};
use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "alert_triage")]
#[command(author = "cipher")]
#[command(version = "0.1.0")]
#[command(about = "Security alert triage: field extraction, ip lists, threat intelligence", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct StageArgs {
    /// Skip threat intelligence lookups
    #[arg(long)]
    no_ti: bool,

    /// Skip the AI assessment
    #[arg(long)]
    no_ai: bool,

    /// Extra field for the rendered output, as KEY=VALUE
    #[arg(short = 'f', long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
    fields: Vec<(String, String)>,
}

impl StageArgs {
    fn options(&self) -> RunOptions {
        RunOptions {
            enable_ti: !self.no_ti,
            enable_ai: !self.no_ai,
            manual_fields: self.fields.iter().cloned().collect::<BTreeMap<_, _>>(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Triage one alert from a file, --text, or stdin
    Analyze {
        input: Option<PathBuf>,

        #[arg(short, long, conflicts_with = "input")]
        text: Option<String>,

        #[command(flatten)]
        stages: StageArgs,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,

        /// Do not record this run in history
        #[arg(long)]
        no_history: bool,
    },

    /// Triage every alert under the given files or directories
    Batch {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Treat each non-empty line as a separate alert
        #[arg(long)]
        per_line: bool,

        #[arg(short = 'j', long, default_value_t = 4)]
        concurrency: usize,

        /// Write one JSON file per result plus a manifest
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long)]
        pretty: bool,

        #[command(flatten)]
        stages: StageArgs,
    },

    /// Look up threat intelligence for addresses
    Intel {
        #[arg(required = true)]
        ips: Vec<String>,
    },

    /// Inspect and edit the whitelist and blacklist
    Lists {
        #[command(subcommand)]
        command: ListCommands,
    },

    /// Inspect, export or clear analysis history
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ListArg {
    Whitelist,
    Blacklist,
}

impl From<ListArg> for ListKind {
    fn from(arg: ListArg) -> Self {
        match arg {
            ListArg::Whitelist => ListKind::Whitelist,
            ListArg::Blacklist => ListKind::Blacklist,
        }
    }
}

#[derive(Subcommand)]
enum ListCommands {
    Show {
        list: ListArg,
    },
    Add {
        list: ListArg,
        entry: String,
    },
    Remove {
        list: ListArg,
        entry: String,
    },
    /// Substring search over entries of one or both lists
    Search {
        keyword: String,

        #[arg(short, long)]
        list: Option<ListArg>,
    },
    /// Print the canonical form of an entry
    Normalize {
        entry: String,
    },
    Import {
        list: ListArg,
        file: PathBuf,
    },
    Export {
        list: ListArg,
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum HistoryCommands {
    Show {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    Export {
        #[arg(short, long, default_value = "./exports")]
        output: PathBuf,

        #[arg(short, long)]
        pretty: bool,
    },
    Clear {
        #[arg(long)]
        confirm: bool,
    },
}

fn parse_field(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty field name in '{}'", raw));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    alert_triage::utils::logging::init_logger(cli.color, cli.verbose);
    colored::control::set_override(cli.color);

    info!("Loading configuration from: {}", cli.config.display());

    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::load(None).unwrap_or_else(|e| {
            warn!("Falling back to built-in defaults: {}", e);
            Config::default_config()
        })
    };

    match cli.command {
        Commands::Analyze {
            input,
            text,
            stages,
            json,
            no_history,
        } => {
            cmd_analyze(config, input, text, &stages, json, no_history).await?;
        }
        Commands::Batch {
            paths,
            per_line,
            concurrency,
            output,
            pretty,
            stages,
        } => {
            cmd_batch(config, &paths, per_line, concurrency, output, pretty, &stages, cli.color)
                .await?;
        }
        Commands::Intel { ips } => {
            cmd_intel(&config, &ips).await?;
        }
        Commands::Lists { command } => {
            cmd_lists(&config, command)?;
        }
        Commands::History { command } => {
            cmd_history(&config, command).await?;
        }
    }

    Ok(())
}

fn read_input(input: Option<PathBuf>, text: Option<String>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    match input {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            Ok(buffer)
        }
    }
}

async fn cmd_analyze(
    config: Config,
    input: Option<PathBuf>,
    text: Option<String>,
    stages: &StageArgs,
    json: bool,
    no_history: bool,
) -> Result<()> {
    let raw = read_input(input, text)?;
    Validator::validate_content_not_empty(&raw).context("Nothing to analyse")?;
    let history_config = config.history.clone();
    let orchestrator = PipelineOrchestrator::new(config);

    let result = orchestrator.run(&raw, &stages.options()).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if result.success && !no_history {
        match HistoryStore::from_config(&history_config).await {
            Ok(mut store) => {
                if let Err(e) = store.record(&raw, &result).await {
                    warn!("Failed to record history: {}", e);
                }
            }
            Err(e) => warn!("History unavailable: {}", e),
        }
    }

    if !result.success {
        return Err(anyhow!(
            result.error.unwrap_or_else(|| "triage failed".to_string())
        ));
    }
    Ok(())
}

fn print_result(result: &PipelineResult) {
    if !result.success {
        println!(
            "{}",
            format_error(result.error.as_deref().unwrap_or("triage failed"))
        );
        return;
    }

    println!("\n{}", "=== Alert ===".bold());
    println!("{}", result.formatted_output);

    for hit in [
        &result.ip_list_alerts.src_ip_status,
        &result.ip_list_alerts.dst_ip_status,
    ]
    .into_iter()
    .flatten()
    {
        let line = format!("{} is on the {}", hit.ip, hit.kind);
        match hit.kind {
            ListKind::Whitelist => println!("{}", format_info(&line)),
            ListKind::Blacklist => println!("{}", format_warning(&line)),
        }
    }

    if let Some(intel) = &result.ti_result {
        println!("\n{}", "=== Threat Intelligence ===".bold());
        println!("{}", render_intel(Some(intel)));
    }

    if !result.ai_result.is_empty() {
        println!("\n{}", "=== AI Assessment ===".bold());
        println!("{}", render_ai(&result.ai_result));
    }

    println!("\n{}", "=== Table Row ===".bold());
    println!("{}", result.table_output);

    if let Some(error) = &result.error {
        println!("\n{}", format_warning(error));
    }
    for warning in &result.warnings {
        println!("{}", format_warning(warning));
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_batch(
    config: Config,
    paths: &[PathBuf],
    per_line: bool,
    concurrency: usize,
    output: Option<PathBuf>,
    pretty: bool,
    stages: &StageArgs,
    colored: bool,
) -> Result<()> {
    let total_steps = if output.is_some() { 3 } else { 2 };

    println!("{}", format_step(1, total_steps, "Collecting alerts"));
    let inputs = collect_inputs(paths, per_line).context("Failed to collect inputs")?;
    info!("Collected {} alerts", inputs.len());

    println!("{}", format_step(2, total_steps, "Triaging"));

    let orchestrator = Arc::new(PipelineOrchestrator::new(config));
    let runner = BatchRunner::new(orchestrator, concurrency).with_progress(true, colored);
    let (outcomes, stats) = runner.run(inputs, &stages.options()).await;

    if let Some(output) = output {
        println!("{}", format_step(3, total_steps, "Exporting results"));
        let exporter = JsonExporter::new(output, pretty)?;
        let mut files = Vec::with_capacity(outcomes.len());
        for (index, outcome) in outcomes.iter().enumerate() {
            let stem = format!("{:04}_{}", index + 1, outcome.input.name);
            files.push(exporter.export_result(&stem, &outcome.input.name, &outcome.result)?);
        }
        let manifest = exporter.write_manifest(files, stats.alerts_failed)?;
        println!(
            "{}",
            format_success(&format!(
                "Exported {} results to {}",
                manifest.total_results,
                exporter.output_dir().display()
            ))
        );
    } else {
        for outcome in &outcomes {
            println!("\n{}", format!("--- {} ---", outcome.input.name).cyan());
            print_result(&outcome.result);
        }
    }

    println!(
        "{}",
        format_info(&format!(
            "{} triaged, {} unparsed, {} with list hits, {} flagged malicious",
            stats.alerts_succeeded, stats.alerts_failed, stats.list_hits, stats.malicious_alerts
        ))
    );
    Ok(())
}

async fn cmd_intel(config: &Config, ips: &[String]) -> Result<()> {
    let aggregator = IntelAggregator::from_config(&config.threat_intel)
        .context("Threat intelligence is not configured")?;

    for ip in ips {
        match aggregator.query_ip(ip).await {
            Ok(record) => {
                let intel = PairIntel {
                    src_ip_ti: IntelSlot::Found(record),
                    ..Default::default()
                };
                println!("{}\n", render_intel(Some(&intel)));
            }
            Err(e) => println!("{}", format_error(&e.to_string())),
        }
    }
    Ok(())
}

fn cmd_lists(config: &Config, command: ListCommands) -> Result<()> {
    let store = FileListStore::from_config(&config.lists);

    match command {
        ListCommands::Show { list } => {
            let kind = ListKind::from(list);
            let entries = store.load(kind)?;
            println!("{} ({} entries, {})", kind, entries.len(), store.path(kind).display());
            for entry in entries {
                println!("  {}", entry);
            }
        }
        ListCommands::Add { list, entry } => {
            let kind = ListKind::from(list);
            if store.add(kind, &entry)? {
                println!("{}", format_success(&format!("Added {} to {}", entry, kind)));
            } else {
                println!("{}", format_info(&format!("{} already on {}", entry, kind)));
            }
        }
        ListCommands::Remove { list, entry } => {
            let kind = ListKind::from(list);
            if store.remove(kind, &entry)? {
                println!("{}", format_success(&format!("Removed {} from {}", entry, kind)));
            } else {
                println!("{}", format_info(&format!("{} not on {}", entry, kind)));
            }
        }
        ListCommands::Search { keyword, list } => {
            let kinds = match list {
                Some(list) => vec![ListKind::from(list)],
                None => vec![ListKind::Whitelist, ListKind::Blacklist],
            };
            for kind in kinds {
                let entries = store.load(kind)?;
                for entry in search(&entries, &keyword) {
                    println!("{}\t{}", kind, entry);
                }
            }
        }
        ListCommands::Normalize { entry } => match normalize(&entry) {
            Ok(normalized) => println!("{}", normalized),
            Err(e) => {
                println!("{}", format_error(&e.to_string()));
                return Err(e.into());
            }
        },
        ListCommands::Import { list, file } => {
            let added = store.import(ListKind::from(list), &file)?;
            println!("{}", format_success(&format!("Imported {} new entries", added)));
        }
        ListCommands::Export { list, file } => {
            let count = store.export(ListKind::from(list), &file)?;
            println!(
                "{}",
                format_success(&format!("Exported {} entries to {}", count, file.display()))
            );
        }
    }

    Ok(())
}

async fn cmd_history(config: &Config, command: HistoryCommands) -> Result<()> {
    let mut store = HistoryStore::from_config(&config.history)
        .await
        .context("Failed to open history")?;

    match command {
        HistoryCommands::Show { limit } => {
            if store.is_empty() {
                println!("{}", format_info("History is empty"));
            }
            for entry in store.entries().iter().take(limit) {
                let src = entry.parsed_data.get("src_ip").unwrap_or("-");
                let dst = entry.parsed_data.get("dst_ip").unwrap_or("-");
                println!(
                    "{}  {} -> {}  {}",
                    entry.detected_at.format("%Y-%m-%d %H:%M:%S"),
                    src,
                    dst,
                    Validator::truncate_text(&Validator::flatten_lines(&entry.raw_text), 60)
                        .dimmed()
                );
            }
        }
        HistoryCommands::Export { output, pretty } => {
            let exporter = JsonExporter::new(output, pretty)?;
            let path = exporter.export_history(store.entries())?;
            println!("{}", format_success(&format!("History written to {}", path.display())));
        }
        HistoryCommands::Clear { confirm } => {
            if !confirm {
                println!(
                    "{}",
                    format_error("This deletes all history. Use --confirm to proceed")
                );
                return Ok(());
            }
            let removed = store.clear().await?;
            println!("{}", format_success(&format!("Removed {} entries", removed)));
        }
    }

    Ok(())
}
