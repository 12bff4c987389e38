//! CLI argument parsing.

use clap::{Args, Parser, Subcommand};
use mp_protocol::StepKey;
use serde_json::Value;
use std::path::PathBuf;

/// Runs marketing pipeline steps against the remote step service.
#[derive(Parser)]
#[command(name = "mpipe")]
#[command(version)]
#[command(about = "Run and inspect marketing pipeline steps")]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct GlobalOptions {
    /// Configuration file. Defaults to `.mpipe/config.toml` in the
    /// working directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging and print the run's log trail.
    #[arg(short = 'v', long = "verbose", global = true)]
    pub is_verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the configured steps in pipeline order.
    Steps,

    /// Run one step or the whole pipeline for a project.
    Run(RunArgs),

    /// Show artifacts and live progress for a project.
    Status(StatusArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Project identifier.
    #[arg(short, long)]
    pub project: String,

    /// Run only this step, even if its output already exists.
    #[arg(long, conflicts_with_all = ["from", "only"])]
    pub step: Option<StepKey>,

    /// Start the pipeline at this step.
    #[arg(long)]
    pub from: Option<StepKey>,

    /// Restrict the pipeline to these steps. May be repeated.
    #[arg(long)]
    pub only: Vec<StepKey>,

    /// Answer "yes" to every rerun confirmation.
    #[arg(long, conflicts_with = "no")]
    pub yes: bool,

    /// Answer "no" to every rerun confirmation.
    #[arg(long)]
    pub no: bool,

    /// Extra request field as `key=value`. JSON values are parsed, anything
    /// else is sent as a string. May be repeated.
    #[arg(long = "arg", value_parser = parse_key_value)]
    pub args: Vec<(String, Value)>,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Project identifier.
    #[arg(short, long)]
    pub project: String,
}

fn parse_key_value(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
    Ok((key.to_string(), value))
}
