//! Command-line interface for runscope.
//!
//! Provides commands for listing runs, inspecting steps and their
//! artifacts, and materializing artifact data.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::config::{self, ResolvedConfig};
use crate::core::{ArtifactMap, PostExecutionClient, SqliteMetadataStore, StepView};
use crate::materializers::{MaterializerRegistry, Payload};

/// runscope - Inspect recorded pipeline runs
#[derive(Parser, Debug)]
#[command(name = "runscope")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Metadata database to read (overrides configuration)
    #[arg(long, global = true, env = "RUNSCOPE_STORE")]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List recorded runs
    Runs {
        /// Maximum number of runs to show (most recent first)
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// List the steps of a run
    Steps {
        /// Run name
        run_name: String,
    },

    /// Show a step with its parameters, inputs and outputs
    Step {
        /// Execution ID of the step
        execution_id: i64,
    },

    /// Materialize an artifact and print it
    Read {
        /// Execution ID of the step
        execution_id: i64,

        /// Parameter name of the artifact
        name: String,

        /// Look up an input instead of an output
        #[arg(long)]
        input: bool,

        /// Use this materializer instead of the recorded one
        #[arg(short, long)]
        materializer: Option<String>,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Runs { limit } => {
                let client = open_client(self.store)?;
                list_runs(&client, limit).await
            }
            Commands::Steps { run_name } => {
                let client = open_client(self.store)?;
                list_steps(&client, &run_name).await
            }
            Commands::Step { execution_id } => {
                let client = open_client(self.store)?;
                show_step(&client, execution_id).await
            }
            Commands::Read {
                execution_id,
                name,
                input,
                materializer,
            } => {
                let client = open_client(self.store)?;
                read_artifact(&client, execution_id, &name, input, materializer.as_deref()).await
            }
            Commands::Config => {
                show_config(config::config()?, self.store.as_ref());
                Ok(())
            }
        }
    }
}

fn open_client(store_override: Option<PathBuf>) -> Result<PostExecutionClient> {
    let (path, registry) = resolve_store(store_override, config::config())?;
    let store = SqliteMetadataStore::open_read_only(&path)?;
    Ok(PostExecutionClient::new(Arc::new(store), Arc::new(registry)))
}

/// Pick the database and registry. An explicit store path does not need
/// a readable configuration; aliases are dropped when it is broken.
fn resolve_store(
    store_override: Option<PathBuf>,
    config: Result<&ResolvedConfig>,
) -> Result<(PathBuf, MaterializerRegistry)> {
    match (store_override, config) {
        (Some(path), Ok(config)) => Ok((path, config.registry())),
        (Some(path), Err(e)) => {
            warn!("Ignoring configuration: {:#}", e);
            Ok((path, MaterializerRegistry::with_builtins()))
        }
        (None, Ok(config)) => Ok((config.store_path.clone(), config.registry())),
        (None, Err(e)) => Err(e.context("No --store given and configuration could not be loaded")),
    }
}

async fn list_runs(client: &PostExecutionClient, limit: usize) -> Result<()> {
    let runs = client.runs().await?;

    if runs.is_empty() {
        println!("No runs found");
        return Ok(());
    }

    println!("{:<30} {:<20} {:<8} {:<12} {:<25}", "RUN", "PIPELINE", "STEPS", "STATUS", "CREATED");
    println!("{}", "-".repeat(98));

    for run in runs.iter().rev().take(limit) {
        let created = run
            .created_at()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<30} {:<20} {:<8} {:<12} {:<25}",
            run.name(),
            run.pipeline_name(),
            run.steps().len(),
            run.status().await?.to_string(),
            created
        );
    }

    Ok(())
}

async fn list_steps(client: &PostExecutionClient, run_name: &str) -> Result<()> {
    let run = client.get_run(run_name).await?;

    println!("Run: {}", run.name());
    println!("Pipeline: {}", run.pipeline_name());
    println!("Status: {}", run.status().await?);
    println!();
    println!("{:<10} {:<30} {:<12}", "ID", "STEP", "STATUS");
    println!("{}", "-".repeat(54));

    for step in run.steps() {
        println!(
            "{:<10} {:<30} {:<12}",
            step.id(),
            step.name(),
            step.status().await?.to_string()
        );
    }

    Ok(())
}

async fn show_step(client: &PostExecutionClient, execution_id: i64) -> Result<()> {
    let step = client.get_step(execution_id).await?;

    println!("Step: {} (id {})", step.name(), step.id());
    println!("State: {:?}", step.state().await?);
    println!("Status: {}", step.status().await?);

    println!("\nParameters:");
    if step.parameters().is_empty() {
        println!("  (none)");
    }
    for (key, value) in step.parameters() {
        println!("  {}: {}", key, value);
    }

    print_artifacts("Inputs", step.inputs().await?);
    print_artifacts("Outputs", step.outputs().await?);

    Ok(())
}

fn print_artifacts(title: &str, artifacts: &ArtifactMap) {
    println!("\n{}:", title);
    if artifacts.is_empty() {
        println!("  (none)");
    }
    for (name, artifact) in artifacts {
        println!(
            "  {:<20} #{:<8} {:<16} {}  [{}]",
            name,
            artifact.id(),
            artifact.artifact_type(),
            artifact.uri(),
            artifact.materializer()
        );
    }
}

async fn read_artifact(
    client: &PostExecutionClient,
    execution_id: i64,
    name: &str,
    input: bool,
    materializer: Option<&str>,
) -> Result<()> {
    let step: StepView = client.get_step(execution_id).await?;
    let artifact = if input {
        step.get_input(name).await?
    } else {
        step.get_output(name).await?
    };

    let payload = match materializer {
        Some(identifier) => {
            let factory = client.registry().resolve(identifier)?;
            artifact.read_with(&factory).await?
        }
        None => artifact.read(client.registry()).await?,
    };

    print_payload(payload).with_context(|| format!("Failed to print artifact {}", artifact.id()))
}

fn print_payload(payload: Payload) -> Result<()> {
    let payload = match payload.downcast::<String>() {
        Ok(text) => {
            println!("{}", text);
            return Ok(());
        }
        Err(payload) => payload,
    };

    let payload = match payload.downcast::<serde_json::Value>() {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }
        Err(payload) => payload,
    };

    match payload.downcast::<Vec<u8>>() {
        Ok(bytes) => println!("<{} bytes>", bytes.len()),
        Err(payload) => println!("<{}>", payload.type_name()),
    }
    Ok(())
}

fn show_config(config: &ResolvedConfig, store_override: Option<&PathBuf>) {
    println!("Home: {}", config.home.display());
    match store_override {
        Some(path) => println!("Store: {} (override)", path.display()),
        None => println!("Store: {}", config.store_path.display()),
    }
    match &config.config_file {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none)"),
    }
    println!("Materializers: {}", config.registry().identifiers().join(", "));
    for (alias, target) in &config.aliases {
        println!("  {} -> {}", alias, target);
    }
}
