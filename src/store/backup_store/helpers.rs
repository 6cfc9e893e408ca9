// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Bibsafe-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Bibsafe and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::fs;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::WriteDurability;

const COMPARE_CHUNK: usize = 64 * 1024;

fn rename_overwrite(from: &Path, to: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::AlreadyExists | io::ErrorKind::PermissionDenied
                ) =>
            {
                let _ = fs::remove_file(to);
                fs::rename(from, to)
            }
            Err(err) => Err(err),
        }
    }

    #[cfg(not(windows))]
    {
        fs::rename(from, to)
    }
}

/// Writes `contents` to a sibling temp file and renames it over `path`.
///
/// Readers never observe a partially written `path`. On failure the temp file is removed and
/// `path` keeps its previous content.
pub(super) fn write_atomic(
    path: &Path,
    contents: &[u8],
    durability: WriteDurability,
) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::other("path has no parent"))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other("path has no file name"))?;

    if let Ok(md) = fs::symlink_metadata(path) {
        if md.file_type().is_symlink() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "refusing to write through symlink",
            ));
        }
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let tmp_path = parent.join(format!(
        ".bibsafe.tmp.{}.{}.{}",
        file_name.to_string_lossy(),
        std::process::id(),
        nanos
    ));

    let written = (|| {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;
        file.write_all(contents)?;
        if durability == WriteDurability::Durable {
            file.sync_all()?;
        }
        drop(file);
        rename_overwrite(&tmp_path, path)
    })();

    if let Err(err) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }

    if durability == WriteDurability::Durable {
        #[cfg(unix)]
        {
            fs::File::open(parent)?.sync_all()?;
        }
    }

    Ok(())
}

/// Copies `from` over `to` through [`write_atomic`].
///
/// When `to` is a symlink the link is kept and its target receives the content.
pub(super) fn copy_atomic(from: &Path, to: &Path, durability: WriteDurability) -> io::Result<()> {
    let contents = fs::read(from)?;
    let target = match fs::symlink_metadata(to) {
        Ok(md) if md.file_type().is_symlink() => fs::canonicalize(to)?,
        _ => to.to_path_buf(),
    };
    write_atomic(&target, &contents, durability)
}

/// Whether `candidate` was modified strictly after `reference`.
pub(super) fn modified_after(candidate: &Path, reference: &Path) -> io::Result<bool> {
    let candidate = fs::metadata(candidate)?.modified()?;
    let reference = fs::metadata(reference)?.modified()?;
    Ok(candidate > reference)
}

/// Whether the two files differ in at least one byte (or in length).
pub(super) fn contents_differ(a: &Path, b: &Path) -> io::Result<bool> {
    let a_file = fs::File::open(a)?;
    let b_file = fs::File::open(b)?;
    if a_file.metadata()?.len() != b_file.metadata()?.len() {
        return Ok(true);
    }

    let mut a_reader = BufReader::new(a_file);
    let mut b_reader = BufReader::new(b_file);
    let mut a_buf = vec![0u8; COMPARE_CHUNK];
    let mut b_buf = vec![0u8; COMPARE_CHUNK];

    loop {
        let read = read_full(&mut a_reader, &mut a_buf)?;
        let other = read_full(&mut b_reader, &mut b_buf)?;
        if read != other || a_buf[..read] != b_buf[..other] {
            return Ok(true);
        }
        if read == 0 {
            return Ok(false);
        }
    }
}

fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
