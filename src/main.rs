//! sbiectl - administrative front end over the Sandboxie interface

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sandboxie::{Sandboxie, SandboxieConfig, StartOptions};
use tracing::info;

#[derive(Parser)]
#[command(name = "sbiectl")]
#[command(about = "Manage Sandboxie sandboxes and sandboxed processes")]
#[command(version)]
struct Cli {
    /// Path to an sbiectl.toml describing the engine installation
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a sandbox (or merge options into an existing one)
    Create {
        box_name: String,
        /// Sandbox options as KEY=VALUE, can be repeated
        #[arg(short, long = "option")]
        options: Vec<String>,
    },
    /// Remove a sandbox's config section
    Destroy { box_name: String },
    /// List configured sandboxes
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show a sandbox's options
    Options {
        box_name: String,
        #[arg(long)]
        json: bool,
    },
    /// Launch a command inside a sandbox
    Start {
        command: String,
        #[arg(short, long = "box")]
        box_name: Option<String>,
        /// Block until the sandboxed process exits, propagating its exit code
        #[arg(long)]
        wait: bool,
        #[arg(long)]
        elevate: bool,
        /// Run outside the sandbox even if the program is forced
        #[arg(long)]
        disable_forced: bool,
    },
    /// List pids of processes running in a sandbox
    Pids {
        #[arg(short, long = "box")]
        box_name: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Terminate sandboxed processes
    Terminate {
        #[arg(short, long = "box")]
        box_name: Option<String>,
        /// Terminate processes in every sandbox
        #[arg(long)]
        all: bool,
    },
    /// Clear a sandbox's virtualized contents, keeping its config
    DeleteContents {
        #[arg(short, long = "box")]
        box_name: Option<String>,
    },
    /// Tell the running engine to re-read its config
    Reload,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sbiectl=info".parse()?)
                .add_directive("sandboxie=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SandboxieConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => SandboxieConfig::default(),
    };
    let sbie = Sandboxie::new(config).context("failed to open Sandboxie installation")?;

    match cli.command {
        Command::Create { box_name, options } => {
            let options = options
                .iter()
                .map(|pair| parse_option(pair))
                .collect::<Result<Vec<_>>>()?;
            sbie.create_sandbox(&box_name, options).await?;
            info!("created sandbox '{}'", box_name);
        }
        Command::Destroy { box_name } => {
            sbie.destroy_sandbox(&box_name).await?;
            info!("destroyed sandbox '{}'", box_name);
        }
        Command::List { json } => {
            let boxes = sbie.list_sandboxes().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&boxes)?);
            } else {
                for name in boxes {
                    println!("{name}");
                }
            }
        }
        Command::Options { box_name, json } => {
            let options = sbie.read_sandbox_options(&box_name).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&options)?);
            } else {
                for (key, value) in &options {
                    println!("{key}={value}");
                }
            }
        }
        Command::Start {
            command,
            box_name,
            wait,
            elevate,
            disable_forced,
        } => {
            let mut opts = StartOptions::new()
                .with_wait(wait)
                .with_elevate(elevate)
                .with_disable_forced(disable_forced);
            opts.box_name = box_name;
            let outcome = sbie.start(&command, &opts).await?;
            if wait {
                std::process::exit(outcome.exit_code);
            }
        }
        Command::Pids { box_name, json } => {
            let pids = sbie.running_processes(box_name.as_deref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&pids)?);
            } else {
                for pid in pids {
                    println!("{pid}");
                }
            }
        }
        Command::Terminate { box_name, all } => {
            if all {
                sbie.terminate_all_processes().await?;
            } else {
                sbie.terminate_processes(box_name.as_deref()).await?;
            }
        }
        Command::DeleteContents { box_name } => {
            sbie.delete_contents(box_name.as_deref()).await?;
        }
        Command::Reload => {
            sbie.reload_config().await?;
        }
    }

    Ok(())
}

/// Split a KEY=VALUE pair from the command line.
fn parse_option(pair: &str) -> Result<(String, String)> {
    let (key, value) = pair
        .split_once('=')
        .with_context(|| format!("expected KEY=VALUE, got '{pair}'"))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}
