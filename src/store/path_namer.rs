// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Bibsafe-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Bibsafe and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Naming of backup files and discard markers inside the backup directory.
//!
//! Layout produced by [`TimestampNamer`]:
//!
//! ```text
//! <backup_dir>/<hash16>--<file name>--<YYYY-MM-DD--HH.MM.SS.nnnnnnnnn>.bak
//! <backup_dir>/<hash16>--<file name>--discarded
//! ```
//!
//! `hash16` is derived from the full original path, so two documents that share a file name
//! in different folders never see each other's backups.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::error::{BackupError, Result};

const BACKUP_EXTENSION: &str = ".bak";
const DISCARDED_SUFFIX: &str = "discarded";
const STAMP_FORMAT: &str = "%Y-%m-%d--%H.%M.%S%.9f";

/// Derives backup and marker paths for an original document.
///
/// Implementations must hand out a path from [`PathNamer::new_backup_path`] that differs from
/// every earlier one for the same original in the same directory, and list existing backups in
/// creation order.
pub trait PathNamer: Send + Sync + fmt::Debug {
    /// Path for a new snapshot. Creates `backup_dir` when missing.
    fn new_backup_path(&self, original: &Path, backup_dir: &Path) -> Result<PathBuf>;

    /// Existing backups of `original`, oldest first.
    fn existing_backups(&self, original: &Path, backup_dir: &Path) -> Vec<PathBuf>;

    fn latest_backup_path(&self, original: &Path, backup_dir: &Path) -> Option<PathBuf> {
        self.existing_backups(original, backup_dir).pop()
    }

    fn discard_marker_path(&self, original: &Path, backup_dir: &Path) -> PathBuf;
}

/// Names backups by a hash of the original path plus a nanosecond UTC timestamp.
///
/// Timestamps handed out by one namer are strictly increasing, even when the wall clock
/// stalls or steps backwards. New stamps also sort after every backup of the same original
/// already in the directory, so a clock set back between runs cannot hide the newest backup.
#[derive(Debug, Default)]
pub struct TimestampNamer {
    last_issued: Mutex<Option<DateTime<Utc>>>,
}

impl TimestampNamer {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_stamp(&self, floor: Option<DateTime<Utc>>) -> DateTime<Utc> {
        let mut last = self.last_issued.lock();
        let now = Utc::now();
        let stamp = match (*last).max(floor) {
            Some(prev) if now <= prev => prev + ChronoDuration::nanoseconds(1),
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }
}

impl PathNamer for TimestampNamer {
    fn new_backup_path(&self, original: &Path, backup_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(backup_dir).map_err(|source| BackupError::PathResolution {
            path: backup_dir.to_path_buf(),
            source,
        })?;

        let prefix = backup_name_prefix(original);
        let newest_on_disk = stamped_backups(&prefix, backup_dir)
            .last()
            .map(|(created, _)| created.and_utc());
        loop {
            let stamp = self.next_stamp(newest_on_disk).format(STAMP_FORMAT);
            let candidate = backup_dir.join(format!("{prefix}{stamp}{BACKUP_EXTENSION}"));
            match fs::symlink_metadata(&candidate) {
                Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(candidate),
                Ok(_) => continue,
                Err(source) => {
                    return Err(BackupError::PathResolution {
                        path: candidate,
                        source,
                    })
                }
            }
        }
    }

    fn existing_backups(&self, original: &Path, backup_dir: &Path) -> Vec<PathBuf> {
        stamped_backups(&backup_name_prefix(original), backup_dir)
            .into_iter()
            .map(|(_, path)| path)
            .collect()
    }

    fn discard_marker_path(&self, original: &Path, backup_dir: &Path) -> PathBuf {
        backup_dir.join(format!("{}{DISCARDED_SUFFIX}", backup_name_prefix(original)))
    }
}

/// Backup files named `<prefix><stamp>.bak` in `backup_dir`, sorted by stamp.
fn stamped_backups(prefix: &str, backup_dir: &Path) -> Vec<(NaiveDateTime, PathBuf)> {
    let entries = match fs::read_dir(backup_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            tracing::warn!(dir = ?backup_dir, error = %err, "cannot list backup directory");
            return Vec::new();
        }
    };

    let mut found = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_str()?;
            let stamp = name.strip_prefix(prefix)?.strip_suffix(BACKUP_EXTENSION)?;
            let created = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()?;
            entry
                .file_type()
                .ok()
                .filter(|kind| kind.is_file())
                .map(|_| (created, entry.path()))
        })
        .collect::<Vec<_>>();

    found.sort();
    found
}

/// `<hash16>--<file name>--`, shared by every backup and the marker of one original.
fn backup_name_prefix(original: &Path) -> String {
    let file_name = original
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_owned());
    format!("{}--{file_name}--", unique_file_prefix(original))
}

fn unique_file_prefix(original: &Path) -> String {
    let digest = Sha256::digest(original.to_string_lossy().as_bytes());
    digest[..8].iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rstest::{fixture, rstest};

    use super::*;

    struct NamerCtx {
        tmp: tempfile::TempDir,
        backup_dir: PathBuf,
        original: PathBuf,
        namer: TimestampNamer,
    }

    #[fixture]
    fn ctx() -> NamerCtx {
        let tmp = tempfile::tempdir().expect("tempdir");
        let backup_dir = tmp.path().join("backups");
        let original = tmp.path().join("library").join("lib.bib");
        NamerCtx {
            tmp,
            backup_dir,
            original,
            namer: TimestampNamer::new(),
        }
    }

    fn touch(path: &Path) {
        fs::write(path, b"").expect("touch");
    }

    #[rstest]
    fn new_backup_path_creates_missing_directory(ctx: NamerCtx) {
        assert!(!ctx.backup_dir.exists());
        let path = ctx.namer.new_backup_path(&ctx.original, &ctx.backup_dir).expect("path");

        assert!(ctx.backup_dir.is_dir());
        assert_eq!(path.parent(), Some(ctx.backup_dir.as_path()));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.contains("--lib.bib--"), "{name}");
        assert!(name.ends_with(".bak"), "{name}");
    }

    #[rstest]
    fn new_backup_paths_never_collide(ctx: NamerCtx) {
        let mut seen = BTreeSet::new();
        for _ in 0..200 {
            let path = ctx.namer.new_backup_path(&ctx.original, &ctx.backup_dir).expect("path");
            assert!(seen.insert(path), "duplicate backup path");
        }
    }

    #[rstest]
    fn new_backup_path_skips_existing_files(ctx: NamerCtx) {
        let first = ctx.namer.new_backup_path(&ctx.original, &ctx.backup_dir).expect("path");
        touch(&first);
        let fresh = TimestampNamer::new();
        for _ in 0..20 {
            let path = fresh.new_backup_path(&ctx.original, &ctx.backup_dir).expect("path");
            assert_ne!(path, first);
        }
    }

    #[rstest]
    fn new_backup_path_reports_unusable_directory(ctx: NamerCtx) {
        let blocker = ctx.tmp.path().join("not-a-dir");
        touch(&blocker);
        let err = ctx.namer.new_backup_path(&ctx.original, &blocker).unwrap_err();
        assert!(matches!(err, BackupError::PathResolution { .. }), "{err}");
    }

    #[rstest]
    fn latest_follows_creation_order(ctx: NamerCtx) {
        assert_eq!(ctx.namer.latest_backup_path(&ctx.original, &ctx.backup_dir), None);

        let mut created = Vec::new();
        for _ in 0..5 {
            let path = ctx.namer.new_backup_path(&ctx.original, &ctx.backup_dir).expect("path");
            touch(&path);
            created.push(path);
        }

        assert_eq!(ctx.namer.existing_backups(&ctx.original, &ctx.backup_dir), created);
        assert_eq!(
            ctx.namer.latest_backup_path(&ctx.original, &ctx.backup_dir),
            created.last().cloned()
        );

        fs::remove_file(created.last().unwrap()).expect("remove newest");
        assert_eq!(
            ctx.namer.latest_backup_path(&ctx.original, &ctx.backup_dir),
            created.get(3).cloned()
        );
    }

    #[rstest]
    fn backups_are_namespaced_per_original(ctx: NamerCtx) {
        let sibling = ctx.tmp.path().join("other").join("lib.bib");
        let mine = ctx.namer.new_backup_path(&ctx.original, &ctx.backup_dir).expect("path");
        touch(&mine);
        let theirs = ctx.namer.new_backup_path(&sibling, &ctx.backup_dir).expect("path");
        touch(&theirs);

        assert_eq!(ctx.namer.existing_backups(&ctx.original, &ctx.backup_dir), vec![mine]);
        assert_eq!(ctx.namer.existing_backups(&sibling, &ctx.backup_dir), vec![theirs]);
    }

    #[rstest]
    fn listing_ignores_markers_and_foreign_files(ctx: NamerCtx) {
        fs::create_dir_all(&ctx.backup_dir).expect("mkdir");
        touch(&ctx.namer.discard_marker_path(&ctx.original, &ctx.backup_dir));
        touch(&ctx.backup_dir.join("notes.txt"));
        touch(&ctx.backup_dir.join(format!(
            "{}garbage.bak",
            backup_name_prefix(&ctx.original)
        )));

        assert!(ctx.namer.existing_backups(&ctx.original, &ctx.backup_dir).is_empty());
    }

    #[rstest]
    fn discard_marker_is_deterministic(ctx: NamerCtx) {
        let a = ctx.namer.discard_marker_path(&ctx.original, &ctx.backup_dir);
        let b = TimestampNamer::new().discard_marker_path(&ctx.original, &ctx.backup_dir);
        assert_eq!(a, b);
        assert!(a.to_string_lossy().ends_with("--lib.bib--discarded"));
    }

    #[test]
    fn stamps_are_strictly_increasing() {
        let namer = TimestampNamer::new();
        let mut prev = namer.next_stamp(None);
        for _ in 0..1000 {
            let next = namer.next_stamp(None);
            assert!(next > prev);
            prev = next;
        }
    }

    #[rstest]
    fn new_backups_sort_after_stamps_from_a_faster_clock(ctx: NamerCtx) {
        fs::create_dir_all(&ctx.backup_dir).expect("mkdir");
        let ahead = (Utc::now() + ChronoDuration::days(1)).format(STAMP_FORMAT);
        let from_earlier_run = ctx.backup_dir.join(format!(
            "{}{ahead}{BACKUP_EXTENSION}",
            backup_name_prefix(&ctx.original)
        ));
        touch(&from_earlier_run);

        let fresh = ctx.namer.new_backup_path(&ctx.original, &ctx.backup_dir).expect("path");
        touch(&fresh);

        assert_eq!(
            ctx.namer.existing_backups(&ctx.original, &ctx.backup_dir),
            vec![from_earlier_run, fresh.clone()]
        );
        assert_eq!(ctx.namer.latest_backup_path(&ctx.original, &ctx.backup_dir), Some(fresh));
    }
}
