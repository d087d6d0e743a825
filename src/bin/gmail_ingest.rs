//! Gmail ingestion: one pass over messages from the configured sender.
//!
//! Stores attachment bytes and a metadata record per message, marks each
//! message read, optionally imports text attachments into a docstore
//! namespace, and writes an HTML report to `<work_dir>/gmail/report.html`.

use tracing::info;

use memory_machine::error::AppError;
use memory_machine::subsystems::memory::{DocStore, stores};
use memory_machine::subsystems::tools::gmail::{
    self, GmailClient, GmailPaths, IngestOptions, Ingester, report,
};
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
    let mut config = config::load(args.config_path.as_deref())?;
    if let Some(dry_run) = args.dry_run {
        config.gmail.dry_run = dry_run;
    }
    if args.sender.is_some() {
        config.gmail.sender_filter = args.sender;
    }

    logger::init(&config.log_level, false, config.log_file.as_deref())?;

    let paths = GmailPaths::from_config(&config);
    info!(
        sender = ?config.gmail.sender_filter,
        dry_run = config.gmail.dry_run,
        replace_existing = config.gmail.replace_existing,
        token_file = %paths.token_file.display(),
        "gmail ingestion starting"
    );

    let client = GmailClient::connect(&paths.token_file).await?;
    let (objects, records) = gmail::local_stores(&config, &paths)?;
    let ingester = Ingester::new(client, objects, records, IngestOptions::from_config(&config.gmail));

    let summary = match config.gmail.import_namespace.clone() {
        Some(namespace) => {
            let backend = stores::build(&config.docstore, &config.work_dir)?;
            let mut store = DocStore::open(namespace.as_str(), backend)?;
            store.refresh()?;
            let summary = ingester.run(Some(&mut store)).await;
            store.save_all_to_remote()?;
            info!(%namespace, imported = summary.imported, "docstore updated");
            summary
        }
        None => ingester.run::<stores::Backend>(None).await,
    };

    report::write_report(&paths.report, &summary.records)?;

    println!(
        "listed {}, processed {}, skipped {}, failed {}, imported {}",
        summary.listed, summary.processed, summary.skipped, summary.failed, summary.imported
    );
    println!("report: {}", paths.report.display());
    Ok(())
}

struct CliArgs {
    config_path: Option<String>,
    dry_run: Option<bool>,
    sender: Option<String>,
}

fn usage() {
    println!("Usage: gmail_ingest [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -h, --help               Print help");
    println!("  -f, --config <PATH>      Path to configuration file (default: config/default.toml)");
    println!("      --sender <ADDRESS>   Only ingest messages from this sender (overrides EMAIL_FILTER)");
    println!("      --dry-run            Log only; store nothing");
    println!("      --commit             Store objects and records (disables dry run)");
}

fn parse_cli_args() -> CliArgs {
    let mut args = CliArgs { config_path: None, dry_run: None, sender: None };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                usage();
                std::process::exit(0);
            }
            "-f" | "--config" | "--sender" => {
                let Some(value) = iter.next() else {
                    eprintln!("error: {arg} requires a value");
                    std::process::exit(2);
                };
                if arg == "--sender" {
                    args.sender = Some(value);
                } else {
                    args.config_path = Some(value);
                }
            }
            "--dry-run" => args.dry_run = Some(true),
            "--commit" => args.dry_run = Some(false),
            other => {
                eprintln!("error: unknown argument {other}");
                usage();
                std::process::exit(2);
            }
        }
    }
    args
}
