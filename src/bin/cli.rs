use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use yematch::engine::golden::{self, GoldenCollector, GoldenFileMapping};
use yematch::engine::heartbeat::load_baseline;
use yematch::engine::{KeyListener, ReseedOnStart};
use yematch::prelude::*;
use yematch::runs::{self, catalog, ActivityPlan, CatalogSettings, System};

#[derive(Parser)]
#[command(name = "yematch")]
#[command(about = "Drive READY and SMART through year-end runs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to yematch.yaml (default: ./yematch.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory of extra run definition YAML files
    #[arg(short = 'D', long, global = true)]
    definitions: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a run definition
    Run {
        /// Definition name, or a path to a definition YAML file
        #[arg(value_name = "DEFINITION")]
        definition: String,

        /// Start at this activity, skipping everything before it
        #[arg(short, long, value_name = "CODE")]
        from: Option<ActivityName>,
    },

    /// List known run definitions
    List,

    /// List every activity and what it does
    Activities,

    /// Validate run definition files without running them
    Validate {
        /// Path to a definition file or directory
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Show the golden files an activity produces
    GoldenMap {
        #[arg(value_name = "CODE")]
        code: ActivityName,

        /// Render the filenames for this log id
        #[arg(long)]
        id: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "yematch=debug"
    } else {
        "yematch=info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %e, "yematch failed");
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = RunnerConfig::discover(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { definition, from } => {
            let definitions = all_definitions(cli.definitions.as_deref())?;
            let definition = select_definition(&definitions, &definition, from)?;
            execute(config, definition).await
        }
        Commands::List => list_definitions(cli.definitions.as_deref()),
        Commands::Activities => list_activities(&config),
        Commands::Validate { path } => validate(path),
        Commands::GoldenMap { code, id } => golden_map(code, id.as_deref()),
    }
}

fn all_definitions(extra: Option<&Path>) -> anyhow::Result<Vec<RunDefinition>> {
    let mut definitions = runs::builtin();
    if let Some(dir) = extra {
        for loaded in DefinitionLoader::load_directory(dir)? {
            if runs::find(&definitions, &loaded.name).is_some() {
                anyhow::bail!("Definition '{}' in {} shadows an existing one", loaded.name, dir.display());
            }
            definitions.push(loaded);
        }
    }
    Ok(definitions)
}

fn select_definition(
    definitions: &[RunDefinition],
    requested: &str,
    from: Option<ActivityName>,
) -> anyhow::Result<RunDefinition> {
    let path = Path::new(requested);
    let definition = if path.is_file() {
        DefinitionLoader::load_file(path)?
    } else {
        runs::find(definitions, requested)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Unknown run definition: {}", requested))?
    };

    match from {
        None => Ok(definition),
        Some(start) => definition.starting_at(start).ok_or_else(|| {
            anyhow::anyhow!("{} is not part of definition '{}'", start, definition.name)
        }),
    }
}

#[tracing::instrument(skip_all, fields(definition = %definition.name))]
async fn execute(config: RunnerConfig, definition: RunDefinition) -> anyhow::Result<bool> {
    let needs = |system: System| definition.activities.iter().any(|a| a.involves(system));

    let ssh = if needs(System::Ready) || definition.reseed {
        Some(Arc::new(SshBridge::new(config.ready.clone())?))
    } else {
        None
    };
    let api: Option<Arc<dyn SmartApi>> = if needs(System::Smart) {
        Some(Arc::new(SmartApiBridge::from_config(&config.smart)?))
    } else {
        None
    };

    let factory = Arc::new(ActivityFactory::new(
        ssh.clone().map(|s| s as Arc<dyn RemoteShell>),
        api.clone(),
        FactorySettings::from_config(&config),
    )?);
    let activities = factory.resolve(&definition.activities)?;

    // Read the baseline before a golden run clears it
    let baseline = load_baseline(&config.golden_dir);

    let data_dir = RunContext::create_data_dir(&config.data_root, &definition.name)?;
    let log = Arc::new(RunLog::create(&data_dir)?);
    log.line(&format!("Run '{}': {}", definition.name, definition.description));
    log.line(&format!("Data directory: {}", data_dir.display()));

    let mut ctx = RunContext::new(&data_dir, log.clone())
        .with_heartbeat_interval(Duration::from_secs(config.heartbeat_interval_secs))
        .with_baseline(baseline);
    if let Some(api) = api {
        ctx = ctx.with_api(api);
    }
    if let Some(ssh) = &ssh {
        ctx = ctx.with_collector(GoldenCollector::new(
            ssh.clone() as Arc<dyn RemoteFileStore>,
            GoldenFileMapping::builtin(),
            config.ready.report_dir.clone(),
            &data_dir,
        ));
    }
    tracing::info!(run_id = %ctx.run_id, "Prepared run in {}", data_dir.display());

    let signal = ctx.signal.clone();
    let interrupt = signal.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; stopping before the next activity");
            interrupt.cancel();
        }
    });
    let _listener = KeyListener::spawn(signal);

    // Hooks run after the SMART check: reseed first, then clear the old baseline
    let mut executor = RunExecutor::new(ctx);
    if definition.reseed {
        executor = executor.with_hooks(Box::new(ReseedOnStart::new(factory.clone())));
    }
    if definition.golden {
        executor = executor.with_hooks(Box::new(GoldenCapture::new(&config.golden_dir)));
    }

    let report = executor.run(&activities).await?;
    print_report(&report);
    Ok(report.completed_without_error())
}

fn print_report(report: &RunReport) {
    println!("\n=== Run Result ===\n");
    println!("State: {:?}", report.state);
    println!("Run ID: {}\n", report.run_id);

    for outcome in report.record.outcomes() {
        let mark = match outcome.status {
            OutcomeStatus::Ok => "✓",
            OutcomeStatus::NoOperation => "-",
            OutcomeStatus::Error => "✗",
        };
        println!("  {} {} {} {}", mark, outcome.took_display(), outcome.name, outcome.status);
    }

    let fetched: usize = report.golden.iter().map(|(_, c)| c.fetched.len()).sum();
    let failed: usize = report.golden.iter().map(|(_, c)| c.failed.len()).sum();
    if fetched + failed > 0 {
        println!("\nGolden files: {} fetched, {} failed", fetched, failed);
    }
}

fn list_definitions(extra: Option<&Path>) -> anyhow::Result<bool> {
    let definitions = all_definitions(extra)?;

    println!("Run definitions:\n");
    for d in &definitions {
        let mut flags = Vec::new();
        if d.reseed {
            flags.push("reseed");
        }
        if d.golden {
            flags.push("golden");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        println!("  {}{} - {}", d.name, flags, d.description);
        println!("      {}", d.codes().join(" "));
    }
    Ok(true)
}

fn list_activities(config: &RunnerConfig) -> anyhow::Result<bool> {
    let settings = CatalogSettings {
        profit_year: config.smart.profit_year,
        scramble: config.ready.scramble,
    };

    for name in ActivityName::ALL {
        let detail = match catalog::plan(*name, &settings) {
            ActivityPlan::ReadyJob(job) => match job.args {
                Some(args) => format!("EJR {} {}", job.job, args),
                None => format!("EJR {}", job.job),
            },
            ActivityPlan::SmartCalls(requests) => requests
                .iter()
                .map(|r| r.label())
                .collect::<Vec<_>>()
                .join(", "),
            ActivityPlan::Paired { ready, smart } => format!("{} + {}", ready, smart),
            ActivityPlan::Unavailable(reason) => format!("(no-op: {})", reason),
        };
        println!("{:<5} {:<55} {}", name.code(), name.description(), detail);
    }
    Ok(true)
}

fn validate(path: PathBuf) -> anyhow::Result<bool> {
    if !path.exists() {
        anyhow::bail!("Path not found: {}", path.display());
    }

    let definitions = if path.is_dir() {
        DefinitionLoader::load_directory(&path)?
    } else {
        vec![DefinitionLoader::load_file(&path)?]
    };

    if definitions.is_empty() {
        println!("No run definitions found in: {}", path.display());
        return Ok(true);
    }

    for d in &definitions {
        println!("✓ {} ({} activities)", d.name, d.activities.len());
    }
    Ok(true)
}

fn golden_map(code: ActivityName, id: Option<&str>) -> anyhow::Result<bool> {
    let mapping = GoldenFileMapping::builtin();
    let templates = mapping.templates_for(code.code());
    if templates.is_empty() {
        println!("{} produces no golden files", code);
        return Ok(true);
    }

    let files = match id {
        Some(id) => mapping.report_filenames_for(code.code(), id)?,
        None => templates.to_vec(),
    };
    for (legacy, canonical) in files {
        println!("{} -> {}-{}", legacy, code, canonical);
    }
    println!("(manifest: {})", golden::MANIFEST_FILE);
    Ok(true)
}
