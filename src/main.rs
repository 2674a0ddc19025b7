use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use field_backup::cli::{handle_backup_command, BackupCommands};
use field_backup::config::{paths::FieldPaths, settings::Settings};

#[derive(Parser)]
#[command(
    name = "fieldbackup",
    version,
    about = "Full-snapshot backup and restore for field-service data",
    long_about = "fieldbackup captures the field-service database, the user's \
                  preferences and the inspection photos as one checksummed backup, \
                  and restores them with either a replace-all or a merge strategy."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Backup management commands
    #[command(subcommand)]
    Backup(BackupCommands),

    /// Create the data directories and default settings
    Init,

    /// Show current configuration and paths
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Initialize paths and settings
    let paths = FieldPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;

    match cli.command {
        Some(Commands::Backup(cmd)) => {
            handle_backup_command(&paths, &settings, cmd).await?;
        }
        Some(Commands::Init) => {
            println!("Initializing fieldbackup at: {}", paths.base_dir().display());
            paths.ensure_directories()?;
            settings.save(&paths)?;
            println!("Initialization complete!");
            println!();
            println!("Run 'fieldbackup backup create' to take the first backup.");
        }
        Some(Commands::Config) => {
            println!("fieldbackup Configuration");
            println!("=========================");
            println!("Base directory:   {}", paths.base_dir().display());
            println!("Data directory:   {}", paths.data_dir().display());
            println!("Photo directory:  {}", paths.photos_dir().display());
            println!("Backup directory: {}", paths.backup_dir().display());
            println!();
            println!("Settings:");
            println!("  Include photos:     {}", settings.backup.include_photos);
            println!("  Include thumbnails: {}", settings.backup.include_thumbnails);
            println!("  Max photo size:     {} bytes", settings.backup.max_photo_bytes);
            println!("  Max archive size:   {} bytes", settings.backup.max_archive_bytes);
            println!("  Default strategy:   {}", settings.backup.default_strategy);
        }
        None => {
            println!("fieldbackup - Backup and restore for field-service data");
            println!();
            println!("Run 'fieldbackup --help' for usage information.");
        }
    }

    Ok(())
}
