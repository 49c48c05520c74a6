//! Narrator CLI - drill into a dataset and narrate what it finds
//!
//! Usage:
//!   narrator run <request.json> [--config <file>] [--policy <degrade|abort>] [--output <file>]
//!   narrator render <request.json> [--level <n>] [--key <key>]...
//!   narrator flat <request.json> [--config <file>]
//!
//! Examples:
//!   narrator run requests/sales_by_store.json
//!   narrator render requests/sales_by_store.json --level 1 --key East --key West
//!   narrator flat requests/sales_by_store.json --config narrator.toml

use clap::{Parser, Subcommand, ValueEnum};
use narrator::config::{Settings, SettingsError};
use narrator::drill::{single_level, DrillRequest, FailurePolicy, KeySet};
use narrator::narrative::ChatCompletionClient;
use narrator::pipeline::{render_level, run_pipeline, PipelineOptions, RequestFile};
use narrator::powerbi::PowerBiClient;
use narrator::sink::CsvSink;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "narrator")]
#[command(about = "Narrator - ranked drill-down narratives over a hosted analytical dataset")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to NARRATOR_CONFIG, ./narrator.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drill, narrate each level, summarize, and append to the log
    Run {
        /// Path to the request JSON file
        request: PathBuf,

        /// What to do when a level's query fails (overrides the settings file)
        #[arg(short, long)]
        policy: Option<PolicyArg>,

        /// Log file to append to (overrides the settings file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the queries for one drill level without executing them
    Render {
        /// Path to the request JSON file
        request: PathBuf,

        /// Drill level (0 is the top transition)
        #[arg(short, long, default_value_t = 0)]
        level: usize,

        /// Parent key to bind (repeatable)
        #[arg(short, long = "key")]
        keys: Vec<String>,
    },

    /// Run the flat grouping query and print its rows as JSON
    Flat {
        /// Path to the request JSON file
        request: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Degrade,
    Abort,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Degrade => FailurePolicy::Degrade,
            PolicyArg::Abort => FailurePolicy::Abort,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "narrator=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_ref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Run {
            request,
            policy,
            output,
        } => cmd_run(&settings, request, policy, output).await,
        Commands::Render {
            request,
            level,
            keys,
        } => cmd_render(&settings, request, level, keys),
        Commands::Flat { request } => cmd_flat(&settings, request).await,
    }
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings, SettingsError> {
    match path {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    }
}

fn read_request(path: &Path, default_depth: u32) -> Option<DrillRequest> {
    match RequestFile::from_file(path).and_then(|f| f.into_request(default_depth)) {
        Ok(request) => Some(request),
        Err(e) => {
            eprintln!("Error reading request '{}': {}", path.display(), e);
            None
        }
    }
}

async fn connect(settings: &Settings) -> Option<PowerBiClient> {
    let powerbi = match settings.powerbi.resolved() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return None;
        }
    };
    match PowerBiClient::connect(&powerbi).await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Connection error: {}", e);
            None
        }
    }
}

async fn cmd_run(
    settings: &Settings,
    request: PathBuf,
    policy: Option<PolicyArg>,
    output: Option<PathBuf>,
) -> ExitCode {
    let mut options = match PipelineOptions::from_settings(settings) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(policy) = policy {
        options = options.with_policy(policy.into());
    }
    if let Some(output) = output {
        options = options.with_destination(output.display().to_string());
    }

    let Some(request) = read_request(&request, options.rank_depth) else {
        return ExitCode::FAILURE;
    };

    let llm = match settings
        .openai
        .resolved()
        .map_err(|e| e.to_string())
        .and_then(|s| ChatCompletionClient::new(&s).map_err(|e| e.to_string()))
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let Some(client) = connect(settings).await else {
        return ExitCode::FAILURE;
    };

    match run_pipeline(&client, &llm, &CsvSink::new(), &request, &options).await {
        Ok(output) => {
            for (entry, narrative) in output.report.entries().iter().zip(&output.narration.narratives) {
                println!("## {}", entry.label);
                println!();
                println!("{}", narrative);
                println!();
            }
            println!("## Summary");
            println!();
            println!("{}", output.narration.summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_render(settings: &Settings, request: PathBuf, level: usize, keys: Vec<String>) -> ExitCode {
    let Some(request) = read_request(&request, settings.drill.rank_depth) else {
        return ExitCode::FAILURE;
    };

    match render_level(&request, level, &KeySet::new(keys)) {
        Ok(rendered) => {
            println!("// {} ({})", rendered.label, request.direction.mode_name());
            if let Some(bootstrap) = &rendered.bootstrap {
                println!("// key bootstrap");
                println!("{}", bootstrap);
                println!();
            }
            println!("// ranking");
            println!("{}", rendered.ranking);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Render error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn cmd_flat(settings: &Settings, request: PathBuf) -> ExitCode {
    let Some(request) = read_request(&request, settings.drill.rank_depth) else {
        return ExitCode::FAILURE;
    };
    let Some(client) = connect(settings).await else {
        return ExitCode::FAILURE;
    };

    match single_level(&client, &request).await {
        Ok(table) => {
            println!("{}", table.to_records());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Query error: {}", e);
            ExitCode::FAILURE
        }
    }
}
