//! Binary entrypoint: backend service, headless player and one-shot tools.

use std::path::PathBuf;
use std::sync::Arc;

use ambient_slideshow::client::HttpBackend;
use ambient_slideshow::config::Configuration;
use ambient_slideshow::events::{ClientMessage, PhotoDescriptor, SchedulerCommand, ServerMessage};
use ambient_slideshow::render::HeadlessSurface;
use ambient_slideshow::scan::photo_url;
use ambient_slideshow::tasks::scheduler;
use ambient_slideshow::web::{self, Backend};
use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "ambient-slideshow", about = "Ambient photo slideshow backend and player")]
struct Cli {
    /// Path to YAML config file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Seed photo selection and effect randomness
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the backend HTTP service
    Serve,
    /// Run the slideshow against the configured backend without a screen
    Play {
        #[arg(long, default_value_t = 1920)]
        width: u32,
        #[arg(long, default_value_t = 1080)]
        height: u32,
    },
    /// Print the catalog of the configured instance
    Catalog,
    /// Print one enriched photo descriptor
    Enrich {
        /// Photo path relative to the instance directory
        path: String,
    },
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(format!("ambient_slideshow={level}").parse()?);
    fmt().with_env_filter(filter).with_target(true).compact().init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = Configuration::from_yaml_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?
        .validated()
        .context("validating configuration")?;

    match cli.command {
        Command::Serve => {
            let backend = Backend::new(cfg.server.clone())?;
            let cancel = shutdown_on_ctrl_c();
            web::serve(backend, cfg.server.bind_address, cancel).await
        }
        Command::Play { width, height } => play(cfg, cli.seed, (width, height)).await,
        Command::Catalog => {
            let backend = Backend::new(cfg.server.clone())?;
            let ctx = backend.register(cfg.slideshow.instance()).await;
            let entries = backend.catalog(&ctx.id).await?;
            info!(count = entries.len(), root = %ctx.root.display(), "catalog built");
            println!("{}", serde_json::to_string_pretty(&entries)?);
            Ok(())
        }
        Command::Enrich { path } => {
            let backend = Backend::new(cfg.server.clone())?;
            let ctx = backend.register(cfg.slideshow.instance()).await;
            let photo = PhotoDescriptor::new(path.clone(), photo_url(&ctx.id, &path));
            let reply = backend
                .handle(ClientMessage::Metadata {
                    id: ctx.id.clone(),
                    photo,
                })
                .await?;
            match reply {
                ServerMessage::Metadata { photo, .. } => {
                    println!("{}", serde_json::to_string_pretty(&photo)?);
                    Ok(())
                }
                ServerMessage::Ready { .. } => bail!("backend answered with readiness instead of metadata"),
            }
        }
    }
}

async fn play(cfg: Configuration, seed: Option<u64>, viewport: (u32, u32)) -> Result<()> {
    let slideshow = cfg.slideshow;
    info!(
        id = %slideshow.id,
        backend = %slideshow.backend_url,
        cycle = %humantime::format_duration(slideshow.timings().total()),
        "starting slideshow"
    );
    let backend = Arc::new(HttpBackend::new(&slideshow.backend_url));
    let surface = Arc::new(HeadlessSurface::new(&slideshow.backend_url, viewport));
    let rng = seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

    let cancel = shutdown_on_ctrl_c();
    let (commands, commands_rx) = mpsc::channel(4);
    spawn_suspend_toggle(commands, cancel.clone());

    scheduler::run(slideshow, backend, surface, commands_rx, cancel, rng).await
}

fn shutdown_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received; shutting down");
        }
        trigger.cancel();
    });
    cancel
}

#[cfg(unix)]
fn spawn_suspend_toggle(commands: mpsc::Sender<SchedulerCommand>, cancel: CancellationToken) {
    use tokio::signal::unix::{SignalKind, signal};
    tokio::spawn(async move {
        let mut usr1 = match signal(SignalKind::user_defined1()) {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "SIGUSR1 handler unavailable; suspend toggle disabled");
                return;
            }
        };
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                Some(()) = usr1.recv() => {
                    if commands.send(SchedulerCommand::ToggleSuspend).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_suspend_toggle(_commands: mpsc::Sender<SchedulerCommand>, _cancel: CancellationToken) {}
