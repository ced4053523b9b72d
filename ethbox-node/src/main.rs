use std::panic;
use std::path::Path;

use anyhow::Context;
use backtrace::Backtrace;
use clap::Parser;
use clap::Subcommand;
use mimalloc::MiMalloc;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing::span;
use tracing::Instrument;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::repo::Repository;

mod api;
mod boot;
mod config;
mod metrics;
mod node;
mod repo;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Clone, Debug)]
struct Cli {
    /// Path to the configuration file.
    #[clap(short, long)]
    config: Option<String>,

    /// If set, output logs in JSON format.
    #[clap(short, long, action)]
    json: bool,

    /// Repository directory, overrides `repo.path`.
    #[clap(short, long, global = true, env = "IPFS_PATH")]
    repo: Option<String>,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Debug, Default)]
enum Command {
    /// Create an empty repository.
    Init,

    /// Serve blocks until interrupted.
    #[default]
    Daemon,
}

fn setup_logging(json: bool) {
    if json {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_level(true)
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_env_filter(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
            .finish();
        tracing::subscriber::set_global_default(subscriber).expect("Setting up logging failed");
    } else {
        let subscriber = tracing_subscriber::fmt()
            .pretty()
            .compact()
            .with_level(true)
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_env_filter(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
            .finish();
        tracing::subscriber::set_global_default(subscriber).expect("Setting up logging failed");
    };
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.json);

    panic::set_hook(Box::new(|panic_info| {
        let msg = match panic_info.payload().downcast_ref::<&'static str>() {
            Some(s) => *s,
            None => {
                match panic_info.payload().downcast_ref::<String>() {
                    Some(s) => &s[..],
                    None => "Box<dyn Any>",
                }
            },
        };
        let (file, lineno, col) = match panic_info.location() {
            Some(l) => (l.file(), l.line(), l.column()),
            None => ("<unknown>", 0, 0),
        };

        error!(
            msg,
            file,
            lineno,
            col,
            "Panic occurred: {:?}",
            Backtrace::new(),
        );
    }));

    if let Err(err) = run(cli).await {
        error!("ethbox-node exited due to an error: {:?}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    info!("Starting ethbox-node. version: {}", version);
    let config = Config::load(cli.config, cli.repo)?;
    config.validate();
    debug!("Loaded configuration: {:?}", config);

    match cli.command.unwrap_or_default() {
        Command::Init => Repository::init(Path::new(&config.repo.path)).await,
        Command::Daemon => run_daemon(&config).await,
    }
}

async fn run_daemon(config: &Config) -> anyhow::Result<()> {
    if config.prometheus.port != 0 {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.prometheus.port))
            .install()
            .context("setting up Prometheus")?;
    }

    let span = span!(
        Level::INFO,
        "Booting daemon",
        "repo" = config.repo.path.as_str(),
        "remote" = config.eth.host.as_str(),
        "version" = env!("CARGO_PKG_VERSION"),
    );
    let ctx = boot::boot(config).instrument(span).await?;

    tokio::signal::ctrl_c()
        .await
        .context("listening for interrupt signal")?;
    info!("Received interrupt signal, shutting down..");

    boot::shutdown(ctx).await
}
