//! contractwatch command line
//!
//! Record-to-contract tooling: analyze traffic, synthesize a contract and
//! stubs, deploy stubs, and validate a provider against a contract.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::analysis::{analyze_interactions, detect_patterns_in_value};
use crate::config::Config;
use crate::errors::ContractWatchError;
use crate::gateway::MockServerGateway;
use crate::health::{HealthAssessment, HealthStatus};
use crate::observability::init_tracing;
use crate::openapi::OpenApiDocument;
use crate::orchestrator::{
    synthesize_from_traffic, InMemoryRunStore, RunState, StaticAuth, SynthesisSettings,
    TracingNotifier, ValidationOrchestrator, ValidationRequest, ValidationRun,
};
use crate::runner::connectivity_check;
use crate::stubs::{export, StubExport};
use crate::traffic::{group_by_endpoint, parse_str, summary_stats};

#[derive(Parser)]
#[command(name = "contractwatch")]
#[command(about = "Turn recorded HTTP traffic into API contracts and mocks, and keep them honest")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ./contractwatch.toml, then ~/.config/contractwatch/config.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log at info level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a traffic log: endpoints, patterns and sensitive data
    #[command(alias = "a")]
    Analyze {
        /// Traffic log (HAR JSON)
        har: PathBuf,
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Synthesize an OpenAPI contract and mock stubs from a traffic log
    #[command(alias = "s")]
    Synthesize(SynthesizeArgs),

    /// Push stubs to the mock server admin API
    #[command(alias = "d")]
    Deploy {
        /// Stub export file produced by `synthesize`
        #[arg(long, conflicts_with = "spec", required_unless_present = "spec")]
        stubs: Option<PathBuf>,
        /// Contract to derive one stub per operation from
        #[arg(long)]
        spec: Option<PathBuf>,
        /// Remove existing stubs first
        #[arg(long)]
        clear: bool,
        /// Admin API root, overrides config
        #[arg(long)]
        admin_url: Option<String>,
    },

    /// Test a provider against a contract and score contract health
    #[command(alias = "v")]
    Validate {
        /// Contract (JSON or YAML)
        #[arg(long)]
        spec: PathBuf,
        /// Provider base URL, overrides config
        #[arg(long)]
        provider: Option<String>,
        /// Admin API root, overrides config
        #[arg(long)]
        admin_url: Option<String>,
        #[arg(long)]
        run_id: Option<String>,
        /// Print the run record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that a provider is reachable
    Check {
        url: String,
        /// Timeout in seconds
        #[arg(long, default_value = "10")]
        timeout: u64,
    },
}

#[derive(Args)]
struct SynthesizeArgs {
    /// Traffic log (HAR JSON)
    har: PathBuf,
    /// Where to write the contract
    #[arg(long, default_value = "openapi.json")]
    spec_out: PathBuf,
    /// Where to write the stubs
    #[arg(long, default_value = "stubs.json")]
    stubs_out: PathBuf,
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,
    #[arg(long)]
    title: Option<String>,
    #[arg(long = "api-version")]
    api_version: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// Keep recorded response values verbatim
    #[arg(long)]
    no_templating: bool,
    /// One independent stub per interaction
    #[arg(long)]
    no_stateful: bool,
    /// Match every recorded request header
    #[arg(long)]
    strict_headers: bool,
    /// Prefix stripped from recorded URLs
    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color || std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    let config = Config::load(cli.config.as_deref())?;
    if cli.verbose && std::env::var("RUST_LOG").is_err() {
        crate::observability::telemetry::init_tracing_with_filter("info", config.logging.json);
    } else {
        init_tracing(config.logging.json);
    }

    match cli.command {
        Commands::Analyze { har, json } => analyze(&har, json),
        Commands::Synthesize(args) => synthesize(&config, args),
        Commands::Deploy {
            stubs,
            spec,
            clear,
            admin_url,
        } => deploy(&config, stubs, spec, clear, admin_url).await,
        Commands::Validate {
            spec,
            provider,
            admin_url,
            run_id,
            json,
        } => validate(config, spec, provider, admin_url, run_id, json).await,
        Commands::Check { url, timeout } => check(&url, timeout).await,
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn analyze(har: &Path, json: bool) -> Result<()> {
    let input = read_file(har)?;
    let interactions = parse_str(&input).map_err(ContractWatchError::from)?;
    let summary = summary_stats(&interactions);
    let groups = group_by_endpoint(&interactions);
    let findings = analyze_interactions(&interactions);

    let mut patterns = BTreeSet::new();
    for interaction in &interactions {
        let Some(body) = interaction.response.body.as_deref() else {
            continue;
        };
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
            for found in detect_patterns_in_value(&value) {
                patterns.insert((found.field_path, found.pattern.pattern_type.as_str()));
            }
        }
    }

    if json {
        let report = serde_json::json!({
            "summary": summary,
            "endpoints": groups.iter().map(|g| serde_json::json!({
                "domain": g.domain,
                "path": g.base_path,
                "methods": g.methods,
                "interactions": g.interactions.len(),
            })).collect::<Vec<_>>(),
            "patterns": patterns.iter().map(|(field, kind)| serde_json::json!({
                "field": field,
                "type": kind,
            })).collect::<Vec<_>>(),
            "sensitive": findings,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Traffic summary".bold());
    println!("  interactions  {}", summary.total_interactions);
    println!("  domains       {}", summary.unique_domains);
    println!("  endpoints     {}", summary.unique_endpoints);
    println!("  avg duration  {:.1} ms", summary.avg_duration_ms);
    for (method, count) in &summary.methods {
        println!("  {:<13} {}", method, count);
    }

    println!("\n{}", "Endpoints".bold());
    for group in &groups {
        let methods: Vec<&str> = group.methods.iter().map(String::as_str).collect();
        println!(
            "  {} {}{}  ({} calls)",
            methods.join(",").cyan(),
            group.domain.dimmed(),
            group.base_path,
            group.interactions.len()
        );
    }

    if !patterns.is_empty() {
        println!("\n{}", "Field patterns".bold());
        for (field, kind) in &patterns {
            println!("  {:<32} {}", field, kind.yellow());
        }
    }

    println!("\n{}", "Sensitive data".bold());
    if findings.is_empty() {
        println!("  {}", "none found".green());
    }
    for finding in &findings {
        let severity = match finding.severity.as_str() {
            "high" => finding.severity.red().bold(),
            "medium" => finding.severity.yellow(),
            _ => finding.severity.normal(),
        };
        println!(
            "  [{}] {} in {:?} ({})",
            severity,
            finding.matched.data_type.as_str(),
            finding.matched.location,
            finding.endpoint
        );
        println!("      {}", finding.recommendation.dimmed());
    }
    Ok(())
}

fn synthesize(config: &Config, args: SynthesizeArgs) -> Result<()> {
    let input = read_file(&args.har)?;

    let mut stubs = config.mock.stub_options();
    if args.no_templating {
        stubs = stubs.with_templating(false);
    }
    if args.no_stateful {
        stubs = stubs.with_stateful(false);
    }
    if args.strict_headers {
        stubs = stubs.with_strict_headers(true);
    }
    if let Some(base) = args.base_url {
        stubs = stubs.with_base_url(base);
    }
    let settings = SynthesisSettings {
        title: args.title.unwrap_or_else(|| config.openapi.title.clone()),
        version: args.api_version.unwrap_or_else(|| config.openapi.version.clone()),
        description: args.description.or_else(|| config.openapi.description.clone()),
        stubs,
    };

    let output = synthesize_from_traffic(&input, &settings).map_err(ContractWatchError::from)?;
    let exported = export(&output.stubs);

    let (spec_text, stubs_text) = match args.format {
        OutputFormat::Json => (output.contract.to_json_pretty()?, exported.to_json_pretty()?),
        OutputFormat::Yaml => (output.contract.to_yaml()?, exported.to_yaml()?),
    };
    write_file(&args.spec_out, &spec_text)?;
    write_file(&args.stubs_out, &stubs_text)?;

    println!(
        "{} {} interactions -> {} operations, {} stubs",
        "✓".green(),
        output.interaction_count,
        output.contract.operation_count(),
        output.stubs.len()
    );
    println!("  contract  {}", args.spec_out.display());
    println!("  stubs     {}", args.stubs_out.display());
    Ok(())
}

async fn deploy(
    config: &Config,
    stubs: Option<PathBuf>,
    spec: Option<PathBuf>,
    clear: bool,
    admin_url: Option<String>,
) -> Result<()> {
    let admin_url = admin_url.unwrap_or_else(|| config.mock.admin_url.clone());
    let gateway = MockServerGateway::new(&admin_url, config.runner_options().timeout)
        .map_err(ContractWatchError::from)?;

    let (requested, deployed) = match (stubs, spec) {
        (Some(path), _) => {
            let exported = StubExport::from_json(&read_file(&path)?)?;
            if clear {
                gateway.clear_stubs().await.map_err(ContractWatchError::from)?;
            }
            let deployed = gateway.deploy(&exported.mappings).await;
            (exported.mappings.len(), deployed.len())
        }
        (None, Some(path)) => {
            let contract = OpenApiDocument::from_str_auto(&read_file(&path)?)?;
            let deployed = gateway
                .generate_and_deploy(&contract, clear)
                .await
                .map_err(ContractWatchError::from)?;
            (contract.operation_count(), deployed.len())
        }
        (None, None) => anyhow::bail!(ContractWatchError::Config(
            "deploy needs --stubs or --spec".to_string()
        )),
    };

    let marker = if deployed == requested { "✓".green() } else { "!".yellow() };
    println!("{} deployed {}/{} stubs to {}", marker, deployed, requested, admin_url);
    Ok(())
}

async fn validate(
    config: Config,
    spec: PathBuf,
    provider: Option<String>,
    admin_url: Option<String>,
    run_id: Option<String>,
    json: bool,
) -> Result<()> {
    config.validate()?;
    let contract = OpenApiDocument::from_str_auto(&read_file(&spec)?)?;
    let provider_url = provider
        .or_else(|| config.provider.url.clone())
        .or_else(|| contract.servers.first().map(|s| s.url.clone()))
        .ok_or_else(|| ContractWatchError::Config("no provider URL configured".to_string()))?;
    let admin_url = admin_url.unwrap_or_else(|| config.mock.admin_url.clone());

    let gateway = MockServerGateway::new(&admin_url, config.runner_options().timeout)
        .map_err(ContractWatchError::from)?;
    let orchestrator = ValidationOrchestrator::new(
        Arc::new(InMemoryRunStore::new()),
        Arc::new(gateway),
        Arc::new(TracingNotifier),
        Arc::new(StaticAuth::new(
            config.auth.method.clone(),
            config.auth.settings.clone(),
        )),
    )
    .with_runner_options(config.runner_options());

    let request = ValidationRequest {
        run_id: run_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        contract,
        provider_url,
    };
    let run = orchestrator
        .execute(&request)
        .await
        .map_err(ContractWatchError::from)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_run(&run);
    }

    match (&run.state, &run.health) {
        (RunState::Completed, Some(health)) if health.status == HealthStatus::Broken => {
            Err(ContractWatchError::Unhealthy { score: health.score }.into())
        }
        (RunState::Failed, _) => match &run.error {
            Some(e) => Err(ContractWatchError::Pipeline(e.clone()).into()),
            None => anyhow::bail!("validation run failed"),
        },
        _ => Ok(()),
    }
}

fn print_run(run: &ValidationRun) {
    println!("{} {}  {}", "Run".bold(), run.run_id, run.state.as_str().bold());
    if let Some(error) = &run.error {
        println!("  {}", error.to_string().red());
    }
    if let Some(result) = &run.test_result {
        println!(
            "  provider   {}/{} passed ({:.1}%) in {:.2}s",
            result.passed, result.total, result.success_rate, result.execution_time
        );
        for outcome in result.results.iter().filter(|o| !o.passed || !o.issues.is_empty()) {
            let status = outcome
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "---".to_string());
            let marker = if outcome.passed { "!".yellow() } else { "✗".red() };
            println!("    {} {} {} -> {}", marker, outcome.method, outcome.path, status);
            for issue in &outcome.issues {
                println!("        {}", issue.dimmed());
            }
            if let Some(error) = &outcome.error {
                println!("        {}", error.dimmed());
            }
        }
    }
    if let Some(alignment) = &run.alignment {
        println!(
            "  alignment  {}/{} endpoints mocked, {} mismatches",
            alignment.aligned_endpoints, alignment.total_endpoints, alignment.schema_mismatches
        );
        for missing in &alignment.missing {
            println!("    {} {}", "missing".yellow(), missing);
        }
    }
    if let Some(health) = &run.health {
        print_health(health);
    }
}

fn print_health(health: &HealthAssessment) {
    let status = match health.status {
        HealthStatus::Healthy => health.status.as_str().green().bold(),
        HealthStatus::Degraded => health.status.as_str().yellow().bold(),
        HealthStatus::Broken => health.status.as_str().red().bold(),
    };
    println!("  health     {:.3} {}", health.score, status);
    for rec in &health.recommendations {
        println!("    - {}", rec);
    }
}

async fn check(url: &str, timeout: u64) -> Result<()> {
    let report = connectivity_check(url, Duration::from_secs(timeout)).await;
    if report.reachable {
        println!(
            "{} {} reachable (HTTP {}, {} ms)",
            "✓".green(),
            url,
            report.status_code.map(|s| s.to_string()).unwrap_or_default(),
            report.elapsed_ms.unwrap_or_default()
        );
        Ok(())
    } else {
        println!(
            "{} {} unreachable: {}",
            "✗".red(),
            url,
            report.error.as_deref().unwrap_or("unknown error")
        );
        Err(ContractWatchError::Gateway(crate::errors::GatewayError::Transport(
            report.error.unwrap_or_default(),
        ))
        .into())
    }
}
