use anyhow::{bail, Context, Result};
use clap::Parser;
use optiforge::config::Config;
use optiforge::llm::OpenRouterClient;
use optiforge::report;
use optiforge::run::{run_task, RunConfig};
use optiforge::sandbox::Sandbox;
use optiforge::{prompt, util};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "optiforge",
    about = "Generate, run, and repair AMPL optimization models with an LLM",
    version
)]
struct Args {
    /// Path to a file containing the problem statement
    problem_file: Option<PathBuf>,

    /// Problem statement given inline (overrides the file)
    #[arg(short, long)]
    problem: Option<String>,

    /// Maximum generate/repair attempts
    #[arg(short, long)]
    attempts: Option<u32>,

    /// Per-attempt execution timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Sampling temperature for generation
    #[arg(short = 'T', long)]
    temperature: Option<f32>,

    /// Model identifier sent to the provider
    #[arg(short, long)]
    model: Option<String>,

    /// API key for the provider (stored with --save-config)
    #[arg(long)]
    api_key: Option<String>,

    /// Persist the effective settings to the config file
    #[arg(long)]
    save_config: bool,

    /// Directory for report artifacts
    #[arg(short, long, default_value = "optiforge-out")]
    out_dir: PathBuf,

    /// Print the initial prompt and exit without calling the provider
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load();
    if let Some(attempts) = args.attempts {
        config.max_attempts = attempts;
    }
    if let Some(timeout) = args.timeout {
        config.exec_timeout_secs = timeout;
    }
    if let Some(temperature) = args.temperature {
        config.temperature = temperature;
    }
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(key) = args.api_key {
        config.openrouter_api_key = Some(key);
    }
    config.validate()?;

    if args.save_config {
        config.save()?;
        eprintln!("💾 Settings saved to the config file");
        if args.problem.is_none() && args.problem_file.is_none() {
            return Ok(());
        }
    }

    let task = match (&args.problem, &args.problem_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read problem file '{}'", path.display()))?,
        (None, None) => bail!("provide a problem statement file or --problem"),
    };
    let task = task.trim().to_string();
    if task.is_empty() {
        bail!("problem statement is empty");
    }

    if args.dry_run {
        println!("{}", prompt::initial_prompt(&task));
        return Ok(());
    }

    let api_key = config
        .api_key()
        .context("no API key; set OPENROUTER_API_KEY or store one with --api-key --save-config")?;
    let generator = OpenRouterClient::new(api_key, config.model.clone());
    let sandbox = Sandbox::new(Duration::from_secs(config.exec_timeout_secs));
    let run_config = RunConfig {
        max_attempts: config.max_attempts,
        temperature: config.temperature,
        verbose: true,
    };

    eprintln!("🔍 Task: {}", util::truncate(&task, 100));
    let result = run_task(&generator, &sandbox, &run_config, &task).await;

    eprintln!();
    if result.success {
        eprintln!("✨ Solved in {} attempt(s)", result.total_attempts());
        if let Some(outcome) = result.attempts.last().and_then(|a| a.outcome.as_ref()) {
            println!("{}", outcome.stdout.trim_end());
        }
    } else {
        eprintln!(
            "❌ Not solved after {} attempt(s): {}",
            result.total_attempts(),
            result.rationale
        );
    }

    for path in report::write_artifacts(&args.out_dir, &result, config.temperature)? {
        eprintln!("  📁 {}", path.display());
    }

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
