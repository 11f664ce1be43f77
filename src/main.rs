use std::env;
use std::process::ExitCode;

use log::error;
use tokio_util::sync::CancellationToken;

use easydb_backup::config::Config;
use easydb_backup::store::BackupRecord;
use easydb_backup::{BackupError, BackupService};

fn print_listing(records: &[BackupRecord]) {
    if records.is_empty() {
        println!("No backups found.");
        return;
    }
    for record in records {
        println!(
            "{}\t{}\t{}",
            record.filename,
            record.size,
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
}

fn usage() {
    eprintln!("usage: easydb-backup <create | list | delete <filename> | download <filename>>");
    eprintln!("       configuration is read from config.toml (or $EASYDB_BACKUP_CONFIG)");
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config_path =
        env::var("EASYDB_BACKUP_CONFIG").unwrap_or_else(|_| "config.toml".to_string());

    let config = match Config::new(&config_path).await {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load {}: {}", config_path, e);
            return ExitCode::FAILURE;
        }
    };

    let service = match BackupService::from_config(&config) {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to initialize the backup directory: {}", e);
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let result: Result<(), BackupError> = match args.get(1).map(String::as_str) {
        Some("create") => {
            let cancel = CancellationToken::new();
            service.create_backup(&cancel).await.map(|payload| {
                println!("{}", payload.message);
                print_listing(&payload.backups);
            })
        }
        Some("list") | None => service.list_backups().map(|records| print_listing(&records)),
        Some("delete") => match args.get(2) {
            Some(filename) => service.delete_backup(filename).map(|payload| {
                println!("{}", payload.message);
                print_listing(&payload.backups);
            }),
            None => {
                usage();
                return ExitCode::FAILURE;
            }
        },
        Some("download") => match args.get(2) {
            Some(filename) => service.download_backup(filename).map(|payload| {
                println!("{}", payload.path.display());
            }),
            None => {
                usage();
                return ExitCode::FAILURE;
            }
        },
        Some(_) => {
            usage();
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
