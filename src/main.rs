// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Bibsafe-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Bibsafe and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Bibsafe CLI entrypoint.
//!
//! `watch` keeps a document backed up until stdin is closed (or a line is entered); the other
//! commands inspect or act on existing backups without starting a session.

use std::error::Error;
use std::io::{self, BufRead};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use bibsafe::{BackupConfig, BackupManager, DocumentHandle, WriteDurability};
use tracing_subscriber::EnvFilter;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} status <file> [options]\n  {program} list <file> [options]\n  {program} restore <file> [options]\n  {program} discard <file> [options]\n  {program} watch <file> [options]\n\nOptions:\n  --backup-dir <dir>     where backups live (default: from --config, else <tmp>/bibsafe-backups)\n  --config <file>        JSON configuration file\n  --interval-ms <ms>     snapshot period for `watch` (default 19000)\n  --max-backups <n>      backups kept per session (default 10)\n  --durable-writes       fsync backups and restores where supported\n\n`watch` takes a final backup and exits when stdin reaches end of input or a line is entered.\nSet RUST_LOG (e.g. RUST_LOG=bibsafe=debug) for diagnostics."
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Status,
    List,
    Restore,
    Discard,
    Watch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    command: Command,
    file: String,
    backup_dir: Option<String>,
    config: Option<String>,
    interval_ms: Option<u64>,
    max_backups: Option<usize>,
    durable_writes: bool,
}

fn parse_options(mut args: impl Iterator<Item = String>) -> Result<CliOptions, ()> {
    let command = match args.next().as_deref() {
        Some("status") => Command::Status,
        Some("list") => Command::List,
        Some("restore") => Command::Restore,
        Some("discard") => Command::Discard,
        Some("watch") => Command::Watch,
        _ => return Err(()),
    };

    let mut file = None;
    let mut backup_dir = None;
    let mut config = None;
    let mut interval_ms = None;
    let mut max_backups = None;
    let mut durable_writes = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--backup-dir" => {
                if backup_dir.is_some() {
                    return Err(());
                }
                backup_dir = Some(args.next().ok_or(())?);
            }
            "--config" => {
                if config.is_some() {
                    return Err(());
                }
                config = Some(args.next().ok_or(())?);
            }
            "--interval-ms" => {
                if interval_ms.is_some() {
                    return Err(());
                }
                let raw = args.next().ok_or(())?;
                let ms: u64 = raw.parse().map_err(|_| ())?;
                if ms == 0 {
                    return Err(());
                }
                interval_ms = Some(ms);
            }
            "--max-backups" => {
                if max_backups.is_some() {
                    return Err(());
                }
                let raw = args.next().ok_or(())?;
                let n: usize = raw.parse().map_err(|_| ())?;
                if n == 0 {
                    return Err(());
                }
                max_backups = Some(n);
            }
            "--durable-writes" => {
                if durable_writes {
                    return Err(());
                }
                durable_writes = true;
            }
            _ if arg.starts_with('-') => return Err(()),
            _ => {
                if file.is_some() {
                    return Err(());
                }
                file = Some(arg);
            }
        }
    }

    Ok(CliOptions {
        command,
        file: file.ok_or(())?,
        backup_dir,
        config,
        interval_ms,
        max_backups,
        durable_writes,
    })
}

fn build_config(options: &CliOptions) -> Result<BackupConfig, Box<dyn Error>> {
    let mut config = match &options.config {
        Some(path) => BackupConfig::load(path)?,
        None => BackupConfig::default(),
    };
    if let Some(dir) = &options.backup_dir {
        config.backup_dir = PathBuf::from(dir);
    }
    if let Some(ms) = options.interval_ms {
        config = config.with_interval(Duration::from_millis(ms));
    }
    if let Some(n) = options.max_backups {
        config = config.with_max_backups(n);
    }
    if options.durable_writes {
        config = config.with_durability(WriteDurability::Durable);
    }
    config.validate()?;
    Ok(config)
}

/// Backups are namespaced by the full document path, so `lib.bib`, `./lib.bib` and the
/// absolute spelling must all name the same file.
fn document_path(raw: &str, cwd: &Path) -> PathBuf {
    let path = Path::new(raw);
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    joined
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

fn run(options: CliOptions) -> Result<(), Box<dyn Error>> {
    let config = build_config(&options)?;
    let backup_dir = config.backup_dir.clone();
    let manager = BackupManager::new(config)?;
    let file = document_path(&options.file, &std::env::current_dir()?);

    match options.command {
        Command::Status => {
            match manager.list_backups(&file, &backup_dir).last() {
                Some(latest) => println!("latest backup: {}", latest.display()),
                None => println!("latest backup: none"),
            }
            let differs = manager.backup_file_differs(&file, &backup_dir);
            println!("differs from file: {}", if differs { "yes" } else { "no" });
            let discarded = manager.discard_marker_path(&file, &backup_dir).exists();
            println!("discarded: {}", if discarded { "yes" } else { "no" });
        }
        Command::List => {
            for backup in manager.list_backups(&file, &backup_dir) {
                println!("{}", backup.display());
            }
        }
        Command::Restore => match manager.restore_backup(&file, &backup_dir)? {
            Some(backup) => println!("restored {} from {}", file.display(), backup.display()),
            None => println!("no backup of {} in {}", file.display(), backup_dir.display()),
        },
        Command::Discard => {
            let document = DocumentHandle::new(&file);
            if !manager.discard_backup(&document, &backup_dir) {
                return Err(format!("cannot mark backup of {} as discarded", file.display()).into());
            }
            println!("discarded pending backup of {}", file.display());
        }
        Command::Watch => {
            let document = DocumentHandle::new(&file);
            manager.start(&document)?;
            eprintln!(
                "bibsafe: backing up {} into {} every {:?}; press Enter to stop",
                file.display(),
                backup_dir.display(),
                manager.config().interval()
            );

            let mut line = String::new();
            let _ = io::stdin().lock().read_line(&mut line);

            manager.shutdown(&document, true);
            if let Some(latest) = manager.list_backups(&file, &backup_dir).last() {
                println!("latest backup: {}", latest.display());
            }
        }
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "bibsafe".to_owned());

    let options = match parse_options(args) {
        Ok(options) => options,
        Err(()) => {
            print_usage(&program);
            std::process::exit(2);
        }
    };

    if let Err(err) = run(options) {
        eprintln!("bibsafe: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{document_path, parse_options, Command};

    fn args(raw: &[&str]) -> impl Iterator<Item = String> {
        raw.iter().map(|s| (*s).to_owned()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn parses_command_and_file() {
        let options = parse_options(args(&["restore", "lib.bib"])).expect("parse options");
        assert_eq!(options.command, Command::Restore);
        assert_eq!(options.file, "lib.bib");
        assert!(options.backup_dir.is_none());
        assert!(!options.durable_writes);
    }

    #[test]
    fn parses_options_in_any_position() {
        let options = parse_options(args(&[
            "watch",
            "--interval-ms",
            "500",
            "lib.bib",
            "--backup-dir",
            "/backups",
            "--durable-writes",
        ]))
        .expect("parse options");
        assert_eq!(options.command, Command::Watch);
        assert_eq!(options.file, "lib.bib");
        assert_eq!(options.interval_ms, Some(500));
        assert_eq!(options.backup_dir.as_deref(), Some("/backups"));
        assert!(options.durable_writes);
    }

    #[test]
    fn rejects_missing_or_unknown_command() {
        parse_options(args(&[])).unwrap_err();
        parse_options(args(&["backup", "lib.bib"])).unwrap_err();
    }

    #[test]
    fn rejects_missing_file() {
        parse_options(args(&["status"])).unwrap_err();
        parse_options(args(&["status", "--backup-dir", "/b"])).unwrap_err();
    }

    #[test]
    fn rejects_zero_values() {
        parse_options(args(&["watch", "a.bib", "--interval-ms", "0"])).unwrap_err();
        parse_options(args(&["watch", "a.bib", "--max-backups", "0"])).unwrap_err();
    }

    #[test]
    fn rejects_duplicates_and_extra_files() {
        parse_options(args(&["list", "a.bib", "b.bib"])).unwrap_err();
        parse_options(args(&["list", "a.bib", "--durable-writes", "--durable-writes"]))
            .unwrap_err();
        parse_options(args(&["list", "a.bib", "--config", "x", "--config", "y"])).unwrap_err();
    }

    #[test]
    fn rejects_unknown_flags() {
        parse_options(args(&["list", "a.bib", "--nope"])).unwrap_err();
    }

    #[cfg(unix)]
    #[test]
    fn relative_and_absolute_spellings_name_the_same_document() {
        let cwd = Path::new("/home/reader/papers");
        let expected = PathBuf::from("/home/reader/papers/lib.bib");
        assert_eq!(document_path("lib.bib", cwd), expected);
        assert_eq!(document_path("./lib.bib", cwd), expected);
        assert_eq!(document_path("/home/reader/papers/lib.bib", cwd), expected);
        assert_eq!(document_path("/home/reader/./papers/lib.bib", cwd), expected);
    }
}
