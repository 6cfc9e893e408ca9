// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Bibsafe-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Bibsafe and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::time::Duration;

use bibsafe::{BackupStore, DocumentHandle};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|raw| raw.trim().parse::<u64>().ok()).unwrap_or(default)
}

fn criterion() -> Criterion {
    Criterion::default()
        .sample_size(env_u64("BENCH_SAMPLE_SIZE", 60).clamp(10, 200) as usize)
        .warm_up_time(Duration::from_secs(env_u64("BENCH_WARMUP_SECS", 3).clamp(1, 60)))
        .measurement_time(Duration::from_secs(env_u64("BENCH_MEASUREMENT_SECS", 5).clamp(1, 120)))
}

fn library(entries: usize) -> Vec<u8> {
    (0..entries)
        .map(|i| format!("@article{{key{i},\n  title = {{Entry {i}}},\n  year = {{2026}}\n}}\n\n"))
        .collect::<String>()
        .into_bytes()
}

// Benchmark identity (keep stable):
// - Group name in this file: `store.snapshot`
// - Case IDs must remain stable across refactors so results stay comparable over time.
fn benches_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store.snapshot");

    for (case, entries) in [("small", 50), ("large", 5_000)] {
        let contents = library(entries);
        group.bench_function(format!("rotate_full_queue_{case}"), |b| {
            b.iter_batched_ref(
                || {
                    let tmp = tempfile::tempdir().expect("tempdir");
                    let original = tmp.path().join("lib.bib");
                    std::fs::write(&original, &contents).expect("seed");
                    let store = BackupStore::default();
                    let document = DocumentHandle::new(&original);
                    let backup_dir = tmp.path().join("backups");
                    for _ in 0..store.capacity() {
                        store.snapshot(&document, &backup_dir).expect("warm queue");
                    }
                    (tmp, store, document, backup_dir)
                },
                |(_tmp, store, document, backup_dir)| {
                    black_box(store.snapshot(document, backup_dir).expect("snapshot"))
                },
                BatchSize::PerIteration,
            )
        });

        group.bench_function(format!("compare_identical_{case}"), |b| {
            let tmp = tempfile::tempdir().expect("tempdir");
            let original = tmp.path().join("lib.bib");
            let backup = tmp.path().join("lib.bak");
            std::fs::write(&original, &contents).expect("seed");
            std::fs::write(&backup, &contents).expect("seed backup");
            let past = std::time::SystemTime::now() - Duration::from_secs(60);
            std::fs::File::options()
                .write(true)
                .open(&original)
                .expect("open")
                .set_modified(past)
                .expect("mtime");
            let store = BackupStore::default();
            b.iter(|| black_box(store.is_different_from_latest(&original, &backup)))
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = criterion();
    targets = benches_store
}
criterion_main!(benches);
