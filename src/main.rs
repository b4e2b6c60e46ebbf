use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use flow_doctor::config::Config;
use flow_doctor::diagnose::static_rules::{all_rules, rule_by_id};
use flow_doctor::{AnalysisOptions, DiagnoseError, DiagnosisEngine, RawReport};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "flowdoctor",
    about = "Diagnose anomalies in business-process instances",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze one exception report (JSON file, or `-` for stdin)
    Analyze(AnalyzeArgs),
    /// List the static rule catalog, or show one rule
    Rules { id: Option<String> },
    /// Inspect or update the configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    report: PathBuf,
    /// Search this checkout instead of the built-in code map
    #[arg(long)]
    local_code_path: Option<PathBuf>,
    /// Skip the LLM second opinion
    #[arg(long)]
    no_llm: bool,
    /// Use a canned trace instead of the log store
    #[arg(long)]
    simulate_log: bool,
    /// Single-line JSON output
    #[arg(long)]
    compact: bool,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the config file location
    Path,
    /// Print the effective configuration with the key masked
    Show,
    /// Store the LLM API key
    SetKey { key: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Analyze(args) => run_analyze(args).await,
        Commands::Rules { id } => run_rules(id.as_deref()),
        Commands::Config(cmd) => run_config(cmd),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(input) = err.downcast_ref::<DiagnoseError>().filter(|e| e.is_input_error()) {
                eprintln!("error: {}", input);
                return ExitCode::from(2);
            }
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flow_doctor=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let text = read_report(&args.report)?;
    let mut report = RawReport::from_json(&text)?;
    if let Some(path) = &args.local_code_path {
        report.local_code_path = Some(path.display().to_string());
    }

    let config = Config::resolve();
    debug!(model = %config.llm.model, "configuration resolved");
    let engine = DiagnosisEngine::from_config(
        config.analyzer_config(),
        &config.log_store_config(),
        args.simulate_log,
    );

    let options = AnalysisOptions {
        use_llm: !args.no_llm,
    };
    let result = engine.analyze(&report, options).await?;
    info!(id = %result.id, severity = %result.severity, "report analyzed");
    print_json(&result, args.compact)
}

fn read_report(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read report from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn run_rules(id: Option<&str>) -> Result<()> {
    match id {
        Some(id) => {
            let rule = rule_by_id(id).ok_or_else(|| anyhow!("unknown rule `{}`", id))?;
            print_json(rule, false)
        }
        None => print_json(all_rules(), false),
    }
}

fn run_config(cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Path => {
            println!("{}", Config::config_location());
            Ok(())
        }
        ConfigCommand::Show => print_json(&Config::resolve().redacted(), false),
        ConfigCommand::SetKey { key } => {
            let key = key.trim();
            if key.is_empty() {
                return Err(anyhow!("API key must not be empty"));
            }
            let stored_in = Config::load().set_api_key(key)?;
            println!("API key saved to {}", stored_in);
            Ok(())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T, compact: bool) -> Result<()> {
    let out = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", out);
    Ok(())
}
