// Proof Cascade - command-line entry point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use proof_cascade::services::proof::{execute_steps, PlannedStep};
use proof_cascade::{server, AppConfig, AppState, ConfigOverrides};
use proof_cascade_core::StepStatus;
use proof_cascade_llm::ProviderType;

#[derive(Parser)]
#[command(name = "proof-cascade")]
#[command(version)]
#[command(about = "Step-by-step mathematical derivations, verified by a symbolic sandbox")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "PROOF_CASCADE_CONFIG")]
    config: Option<PathBuf>,

    /// Text-generation provider (openai or deepseek)
    #[arg(long, global = true, env = "PROOF_CASCADE_PROVIDER")]
    provider: Option<ProviderType>,

    /// API key for the provider
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Chat-completions endpoint override
    #[arg(long, global = true, env = "PROOF_CASCADE_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, global = true, env = "PROOF_CASCADE_MODEL")]
    model: Option<String>,

    /// Generation attempts per request
    #[arg(long, global = true, env = "PROOF_CASCADE_MAX_RETRIES")]
    max_retries: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        #[arg(long, env = "PROOF_CASCADE_BIND")]
        bind: Option<String>,
    },
    /// Solve one problem and print the chain as JSON
    Solve { problem: String },
    /// Run script files as one verification batch, without a generator
    Verify {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            provider: self.provider,
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            max_retries: self.max_retries,
            bind_addr: match &self.command {
                Commands::Serve { bind } => bind.clone(),
                _ => None,
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("proof_cascade=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_overrides(cli.overrides());

    match cli.command {
        Commands::Serve { .. } => {
            let state = Arc::new(AppState::from_config(config)?);
            info!(
                provider = %state.config().provider.provider,
                model = %state.config().provider.model,
                "starting proof-cascade"
            );
            server::serve(state).await?;
        }
        Commands::Solve { problem } => {
            let state = AppState::from_config(config)?;
            let steps = state.proof().solve(&problem).await?;
            println!("{}", serde_json::to_string_pretty(&steps)?);
        }
        Commands::Verify { files } => {
            let mut plan = Vec::with_capacity(files.len());
            for path in &files {
                let code = std::fs::read_to_string(path)
                    .with_context(|| format!("cannot read {}", path.display()))?;
                plan.push(PlannedStep {
                    content: path.display().to_string(),
                    code,
                    status: StepStatus::Normal,
                });
            }
            match execute_steps(&plan) {
                Ok(steps) => {
                    for step in steps {
                        println!("[{}] {}", step.content, step.output);
                    }
                }
                Err(err) => {
                    for step in &err.verified {
                        println!("[{}] {}", step.content, step.output);
                    }
                    anyhow::bail!("{}: {}", files[err.step - 1].display(), err.error);
                }
            }
        }
    }

    Ok(())
}
