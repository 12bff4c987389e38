mod cli;
mod prompt;
mod render;

use clap::Parser;
use cli::{Cli, Commands, RunArgs, StatusArgs};
use color_eyre::eyre::WrapErr;
use mp_core::config::loader::{load_config, load_config_file};
use mp_core::engine::{PipelineOrchestrator, RunOptions, StepRunner};
use mp_core::registry::{build_http_registry, StepRegistry};
use mp_core::remote::http::{HttpArtifactStore, HttpClient};
use mp_core::resume::{prompt_channel, AutoConfirm, Confirmer};
use mp_protocol::{Event, GlobalConfig, RunStatus};
use serde_json::Map;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_logging(cli.global.is_verbose);

    let config = match &cli.global.config {
        Some(path) => load_config_file(path).await,
        None => load_config(Path::new(".")).await,
    }
    .wrap_err("Failed to load configuration")?;

    match cli.command {
        Commands::Steps => {
            let http = HttpClient::new(config.base_url.clone())?;
            render::print_steps(&build_http_registry(&config, &http)?);
        }
        Commands::Run(args) => {
            let status = run(&config, args, cli.global.is_verbose).await?;
            if status != RunStatus::Completed {
                std::process::exit(1);
            }
        }
        Commands::Status(args) => status(&config, args).await?,
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    } else if std::env::var("RUST_LOG").is_err() {
        builder.filter_level(log::LevelFilter::Warn);
    }
    let _ = builder.try_init();
}

fn build_orchestrator(
    config: &GlobalConfig,
    confirmer: Arc<dyn Confirmer>,
    events_tx: Option<UnboundedSender<Event>>,
) -> color_eyre::Result<PipelineOrchestrator> {
    let http = HttpClient::new(config.base_url.clone())?;
    let registry: StepRegistry = build_http_registry(config, &http)?;
    let store = Arc::new(HttpArtifactStore::new(http, config.artifacts_endpoint.clone()));
    Ok(PipelineOrchestrator::new(
        Arc::new(registry),
        StepRunner::from_config(config),
        store,
        confirmer,
        events_tx,
    ))
}

async fn run(config: &GlobalConfig, args: RunArgs, verbose: bool) -> color_eyre::Result<RunStatus> {
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let mut answerer = None;
    let confirmer: Arc<dyn Confirmer> = if args.yes {
        Arc::new(AutoConfirm(true))
    } else if args.no {
        Arc::new(AutoConfirm(false))
    } else {
        let (channel, prompts_rx) = prompt_channel(Some(events_tx.clone()));
        answerer = Some(tokio::spawn(prompt::answer_from_stdin(prompts_rx)));
        Arc::new(channel)
    };

    let orchestrator = build_orchestrator(config, confirmer, Some(events_tx))?;
    let renderer = tokio::spawn(render::render_events(events_rx, verbose));

    let step_args: Map<_, _> = args.args.into_iter().collect();
    let report = {
        let run = async {
            match args.step {
                Some(key) => orchestrator.run_step(&args.project, key, &step_args).await,
                None => {
                    let options = RunOptions {
                        from: args.from,
                        only: (!args.only.is_empty()).then_some(args.only),
                        args: step_args.clone(),
                    };
                    orchestrator.run_all(&args.project, &options).await
                }
            }
        };
        tokio::pin!(run);

        let mut halting = false;
        loop {
            tokio::select! {
                report = &mut run => break report?,
                _ = tokio::signal::ctrl_c(), if !halting => {
                    halting = orchestrator.halt();
                    if halting {
                        eprintln!("Halting; an in-flight remote call is allowed to finish...");
                    }
                }
            }
        }
    };

    // Dropping the orchestrator closes the event stream.
    drop(orchestrator);
    let _ = renderer.await;
    if let Some(answerer) = answerer {
        answerer.abort();
    }

    render::print_report(&report);
    Ok(report.status)
}

async fn status(config: &GlobalConfig, args: StatusArgs) -> color_eyre::Result<()> {
    let orchestrator = build_orchestrator(config, Arc::new(AutoConfirm(false)), None)?;
    let artifacts = orchestrator.artifacts(&args.project).await;
    let progress = orchestrator.progress_overview(&args.project).await;
    render::print_status(&args.project, artifacts, &progress);
    Ok(())
}
