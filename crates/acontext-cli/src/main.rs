use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;

use acontext_blob::FsBlobStore;
use acontext_bus::EventBus;
use acontext_server::state::AppState;
use acontext_store::Store;
use config::{ensure_skeleton_config, load_config, AppConfig};

#[derive(Parser)]
#[command(name = "acontext", version, about = "acontext agent-memory service")]
struct Cli {
    #[arg(long, default_value = "~/.acontext", help = "Config root directory (holds config.yaml, acontext.db, blobs/)")]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the HTTP API server")]
    Serve {
        #[arg(long, help = "HTTP API server port, overrides config.yaml")]
        port: Option<u16>,
    },
    #[command(about = "Validate the config file")]
    Validate,
}

fn expand_tilde(path: PathBuf) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path
}

fn init_tracing(config_root: &std::path::Path) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "acontext.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    Ok(guard)
}

async fn run(config_root: &std::path::Path, config: AppConfig, port_override: Option<u16>) -> Result<()> {
    let store = Store::open(&config.storage.sqlite_path)?;
    let blob: Arc<dyn acontext_blob::BlobStore> = Arc::new(FsBlobStore::new(&config.storage.blob_root));
    let bus = EventBus::new(config.bus.capacity);
    let state = AppState::new(store, blob, bus.sender());

    let port = port_override.unwrap_or(config.server.port);
    let addr = format!("{}:{}", config.server.host, port);
    tracing::info!(config_root = %config_root.display(), %addr, "starting acontext-server");
    acontext_server::serve(state, &addr).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    cli.config_root = expand_tilde(cli.config_root);

    let _guard = init_tracing(&cli.config_root)?;

    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Validate => {
            let config = load_config(&cli.config_root.join("config.yaml"))?;
            println!(
                "Config valid. storage={} server={}:{}",
                config.storage.sqlite_path, config.server.host, config.server.port
            );
        }
        Commands::Serve { port } => {
            let config = ensure_skeleton_config(&cli.config_root, port.unwrap_or(3000))?;
            run(&cli.config_root, config, port).await?;
        }
    }

    Ok(())
}
