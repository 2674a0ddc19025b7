//! Backup CLI commands
//!
//! Implements CLI commands for creating, inspecting and restoring backups.

use std::path::PathBuf;

use clap::Subcommand;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::backup::{BackupInfo, BackupOrchestrator, BackupProgress, RestoreProgress};
use crate::config::paths::FieldPaths;
use crate::config::settings::Settings;
use crate::error::{BackupError, BackupResult};
use crate::models::{BackupId, RestoreStrategy};

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// Create a new full backup
    Create {
        /// Leave photos out of the backup
        #[arg(long)]
        no_photos: bool,

        /// Include photo thumbnails
        #[arg(long)]
        thumbnails: bool,

        /// Free-form description stored with the backup
        #[arg(short, long)]
        description: Option<String>,

        /// Restore strategy to suggest for this backup (replace-all or merge)
        #[arg(long)]
        strategy_hint: Option<RestoreStrategy>,
    },

    /// List all available backups
    List {
        /// Show detailed information
        #[arg(short, long)]
        verbose: bool,
    },

    /// Restore from a backup
    Restore {
        /// Backup id, id prefix or path (use 'latest' for most recent)
        backup: String,

        /// How to apply the records (replace-all or merge)
        #[arg(short, long)]
        strategy: Option<RestoreStrategy>,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Check a backup without restoring it
    Validate {
        /// Backup id, id prefix or path (use 'latest' for most recent)
        backup: String,
    },

    /// Delete a backup
    Delete {
        /// Backup id or id prefix
        backup: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Estimate the size of a new backup
    Estimate {
        /// Leave photos out of the estimate
        #[arg(long)]
        no_photos: bool,
    },
}

#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Photos")]
    photos: usize,
    #[tabled(rename = "Description")]
    description: String,
}

impl BackupRow {
    fn new(index: usize, backup: &BackupInfo, verbose: bool) -> Self {
        let id = backup.id.to_string();
        Self {
            index,
            id: if verbose { id } else { id[..8].to_string() },
            created: backup.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            age: format_duration(chrono::Utc::now().signed_duration_since(backup.created_at)),
            size: format_size(backup.size_bytes),
            photos: backup.photo_count,
            description: backup.description.clone().unwrap_or_default(),
        }
    }
}

/// Handle a backup command
pub async fn handle_backup_command(
    paths: &FieldPaths,
    settings: &Settings,
    cmd: BackupCommands,
) -> BackupResult<()> {
    let orchestrator = BackupOrchestrator::from_paths(paths, settings)?;

    match cmd {
        BackupCommands::Create {
            no_photos,
            thumbnails,
            description,
            strategy_hint,
        } => {
            let include_photos = settings.backup.include_photos && !no_photos;
            let include_thumbnails = include_photos && (thumbnails || settings.backup.include_thumbnails);

            println!("Creating backup...");
            let mut progress = orchestrator.create_full_backup(
                include_photos,
                include_thumbnails,
                strategy_hint,
                description,
            );

            while let Some(event) = progress.next_event().await {
                match event {
                    BackupProgress::Progress {
                        percent, message, ..
                    } => println!("[{:>3}%] {}", percent, message),
                    BackupProgress::Completed {
                        backup_id,
                        path,
                        total_size,
                        duration,
                        table_count,
                    } => {
                        println!();
                        println!("Backup created: {}", backup_id);
                        println!("Location: {}", path.display());
                        println!("Size: {}", format_size(total_size));
                        println!("Tables: {}", table_count);
                        println!("Took: {:.1}s", duration.as_secs_f64());
                        return Ok(());
                    }
                    BackupProgress::Error(failure) => {
                        return Err(failure.into_error());
                    }
                }
            }
            return Err(BackupError::Io("backup ended without a result".into()));
        }

        BackupCommands::List { verbose } => {
            let backups = orchestrator.list_available_backups()?;

            if backups.is_empty() {
                println!("No backups found.");
                println!("Create one with: fieldbackup backup create");
                return Ok(());
            }

            let rows: Vec<BackupRow> = backups
                .iter()
                .enumerate()
                .map(|(i, b)| BackupRow::new(i + 1, b, verbose))
                .collect();
            println!("{}", Table::new(rows).with(Style::rounded()));

            if verbose {
                println!();
                for backup in &backups {
                    println!("{}", backup.id);
                    println!("   Path: {}", backup.path.display());
                    println!("   App version: {}", backup.app_version);
                    if let Some(hint) = backup.restore_hint {
                        println!("   Suggested restore: {}", hint);
                    }
                }
            }

            println!();
            println!("Total: {} backup(s)", backups.len());
        }

        BackupCommands::Restore {
            backup,
            strategy,
            force,
        } => {
            let info = orchestrator.find_backup(&backup)?;
            let validation = orchestrator.validate_backup(&info.path)?;
            let strategy = strategy
                .or(info.restore_hint)
                .unwrap_or(settings.backup.default_strategy);

            println!("Backup Information");
            println!("==================");
            println!("Id: {}", info.id);
            println!("Created: {}", info.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("Records: {}", validation.record_count);
            println!("Photos: {}", validation.photo_count);
            println!("Strategy: {}", strategy);
            println!("Status: {}", validation.summary());
            println!();

            if !validation.is_valid() {
                return Err(BackupError::Validation(validation.summary()));
            }

            if !force {
                if strategy == RestoreStrategy::ReplaceAll {
                    println!("WARNING: This will overwrite ALL current data!");
                } else {
                    println!("WARNING: Records in the backup will overwrite current ones!");
                }
                println!("To proceed, run again with --force flag:");
                println!("  fieldbackup backup restore {} --force", backup);
                return Ok(());
            }

            println!("Restoring from backup...");
            let mut progress = orchestrator.restore_from_backup(
                info.path.clone(),
                info.bundle_path.clone(),
                strategy,
            );

            while let Some(event) = progress.next_event().await {
                match event {
                    RestoreProgress::Progress {
                        percent, message, ..
                    } => println!("[{:>3}%] {}", percent, message),
                    RestoreProgress::Completed {
                        records_restored,
                        photos_restored,
                        preferences_restored,
                        duration,
                        ..
                    } => {
                        println!();
                        println!("Restore complete!");
                        println!("Records restored: {}", records_restored);
                        println!("Photo files restored: {}", photos_restored);
                        if preferences_restored {
                            println!("Preferences restored.");
                        } else {
                            println!("Note: preferences could not be restored, see the log.");
                        }
                        println!("Took: {:.1}s", duration.as_secs_f64());
                        return Ok(());
                    }
                    RestoreProgress::Error(failure) => {
                        return Err(failure.into_error());
                    }
                }
            }
            return Err(BackupError::Io("restore ended without a result".into()));
        }

        BackupCommands::Validate { backup } => {
            let path = resolve_backup_path(&orchestrator, &backup)?;
            let validation = orchestrator.validate_backup(&path)?;

            println!("Backup Validation");
            println!("=================");
            println!("File: {}", validation.bundle_path.display());
            if let Some(id) = validation.backup_id {
                println!("Id: {}", id);
            }
            if let Some(created) = validation.created_at {
                println!("Created: {}", created.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            if let Some(version) = validation.schema_version {
                println!("Schema version: {}", version);
            }
            println!("Records: {}", validation.record_count);
            println!("Photos: {}", validation.photo_count);
            println!(
                "Checksum: {}",
                if validation.checksum_valid { "OK" } else { "MISMATCH" }
            );
            println!(
                "Photo archive: {}",
                if validation.photo_archive_present { "present" } else { "absent" }
            );
            for error in &validation.errors {
                println!("  error: {}", error);
            }
            for warning in &validation.warnings {
                println!("  warning: {}", warning);
            }
            println!();
            println!("Status: {}", validation.summary());

            if !validation.is_valid() {
                return Err(BackupError::Validation(validation.summary()));
            }
        }

        BackupCommands::Delete { backup, force } => {
            let info = orchestrator.find_backup(&backup)?;

            if !force {
                println!(
                    "About to delete backup {} from {} ({}).",
                    info.id,
                    info.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    format_size(info.size_bytes)
                );
                println!("To proceed, run again with --force flag:");
                println!("  fieldbackup backup delete {} --force", backup);
                return Ok(());
            }

            orchestrator.delete_backup(&info.id)?;
            println!("Deleted backup {}.", info.id);
        }

        BackupCommands::Estimate { no_photos } => {
            let include_photos = settings.backup.include_photos && !no_photos;
            let estimate = orchestrator.get_estimated_backup_size(include_photos)?;
            println!(
                "Estimated backup size: {} ({})",
                format_size(estimate),
                if include_photos { "with photos" } else { "without photos" }
            );
        }
    }

    Ok(())
}

/// Resolve a backup reference to a backup directory or bundle file
fn resolve_backup_path(orchestrator: &BackupOrchestrator, backup: &str) -> BackupResult<PathBuf> {
    // Plain paths may point outside the catalog
    let path = PathBuf::from(backup);
    if path.exists() {
        return Ok(path);
    }

    if let Ok(id) = BackupId::parse(backup) {
        let dir = orchestrator.backup_dir().join(id.to_string());
        if dir.exists() {
            return Ok(dir);
        }
    }

    Ok(orchestrator.find_backup(backup)?.path)
}

/// Format a duration in human-readable form
fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);

    if total_seconds < 60 {
        return format!("{}s", total_seconds);
    }

    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < 30 {
        return format!("{}d", days);
    }

    format!("{}mo", days / 30)
}

/// Format a file size in human-readable form
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(16 * 1024), "16.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024 / 2), "1.5 MB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(chrono::Duration::seconds(42)), "42s");
        assert_eq!(format_duration(chrono::Duration::minutes(90)), "1h");
        assert_eq!(format_duration(chrono::Duration::days(65)), "2mo");
    }
}
