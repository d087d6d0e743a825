//! Memory Machine: console entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Build the docstore backend, open the namespace, refresh from disk
//!   6. Seed sample documents into an empty namespace (when configured)
//!   7. Build the researcher (plugin-chat)
//!   8. Spawn Ctrl-C → shutdown signal watcher
//!   9. Run the console until quit / EOF / Ctrl-C, then save

use tokio_util::sync::CancellationToken;
use tracing::info;

use memory_machine::error::AppError;
use memory_machine::subsystems::comms;
use memory_machine::subsystems::memory::document::sample_documents;
use memory_machine::subsystems::memory::{DocBackend, DocStore, DocStoreRegistry, stores};
use memory_machine::{config, logger};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present: ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    let force_cli_level = args.log_level.is_some();
    logger::init(effective_log_level, force_cli_level, config.log_file.as_deref())?;

    info!(
        app_name = %config.app_name,
        work_dir = %config.work_dir.display(),
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    let backend = stores::build(&config.docstore, &config.work_dir)?;
    info!(backend = backend.backend_type(), "docstore backend ready");

    let namespace = config.docstore.namespace.clone();
    let mut store = DocStore::open(namespace.as_str(), backend)?;
    let loaded = store.refresh()?;
    info!(%namespace, loaded, "docstore refreshed");

    if store.is_empty() && config.docstore.seed_samples {
        let seeded = store.seed(sample_documents())?;
        info!(%namespace, seeded, "seeded sample documents");
    }

    let mut registry = DocStoreRegistry::new();
    registry.register(store)?;

    let console = comms::Console::new(&mut registry, namespace.as_str())?;
    #[cfg(feature = "plugin-chat")]
    let console = console.with_researcher(memory_machine::subsystems::chat::build(&config)?);

    // Shared shutdown token: Ctrl-C cancels it, the console loop watches it.
    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received: initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    comms::run(console, shutdown).await?;

    info!("memory machine stopped");
    Ok(())
}

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: memory-machine [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    //   -v → warn, -vv → info, -vvv → debug, -vvvv+ → trace
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, config_path }
}
