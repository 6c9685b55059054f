//! C2 — Corpus Layout (spec.md §4.2). Per-session temp-directory
//! provisioning, seed unpacking, subset sampling, and merge-back. Grounded
//! in `original_source/bot/fuzzers/engine_common.py`
//! (`unpack_seed_corpus_if_needed`, `recreate_directory`) and
//! `libFuzzer/launcher.py` (`copy_from_corpus`, `move_mergeable_units`,
//! `is_sha1_hash`).

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Maximum number of files in the corpus for which we still unpack the seed
/// archive unconditionally (`engine_common.MAX_FILES_FOR_UNPACK`).
pub const MAX_FILES_FOR_UNPACK: usize = 5;

/// One entry taken from a seed corpus archive.
pub struct ArchiveEntry<'a> {
    pub name: &'a str,
    pub size: u64,
    pub is_dir: bool,
    pub contents: &'a [u8],
}

/// Name a fresh corpus file by the first 20 bytes (40 hex characters) of its
/// SHA-256 digest, matching the Data Model's "flat directory of files named
/// by content hash" (spec.md §3) and giving natural coverage-based
/// deduplication for anything this crate itself writes into a corpus
/// directory.
pub fn content_hash_name(contents: &[u8]) -> String {
    let digest = Sha256::digest(contents);
    digest[..20].iter().map(|b| format!("{b:02x}")).collect()
}

/// `is_sha1_hash`: true iff `name` looks like an already-hashed survivor
/// (exactly 40 hex characters), independent of whether it is actually a
/// valid sha1 digest of anything.
pub fn looks_like_content_hash(name: &str) -> bool {
    name.len() == 40 && name.chars().all(|c| c.is_ascii_hexdigit())
}

/// `newCorpusDir`: a freshly recreated empty directory under `session_root`.
pub fn new_corpus_dir(session_root: &Path, name: &str) -> io::Result<PathBuf> {
    let dir = session_root.join(name);
    recreate_directory(&dir)?;
    Ok(dir)
}

fn recreate_directory(dir: &Path) -> io::Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)
}

/// Number of regular files directly inside `dir` (mirrors
/// `shell.get_directory_file_count`, which does not recurse).
pub fn directory_file_count(dir: &Path) -> io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            count += 1;
        }
    }
    Ok(count)
}

fn files_list(dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            out.push(entry.path());
        }
    }
    Ok(out)
}

/// `unpackSeedIfNeeded`: expand `entries` into `corpus_dir` if a seed corpus
/// is present and either `force` is set or the corpus has fewer than
/// `max_files_for_unpack` files. Skips directory entries and entries larger
/// than `max_bytes`. Entries are renamed to sequential zero-padded indices
/// to avoid collisions, per spec.md §4.2.
pub fn unpack_seed_if_needed(
    entries: &[ArchiveEntry<'_>],
    corpus_dir: &Path,
    max_bytes: u64,
    force: bool,
    max_files_for_unpack: usize,
) -> io::Result<usize> {
    if entries.is_empty() {
        return Ok(0);
    }

    let existing = directory_file_count(corpus_dir)?;
    if !force && existing >= max_files_for_unpack {
        return Ok(0);
    }

    fs::create_dir_all(corpus_dir)?;

    let mut written = 0usize;
    for entry in entries {
        if entry.is_dir || entry.size > max_bytes {
            continue;
        }
        let output_name = format!("{written:016}");
        let output_path = corpus_dir.join(output_name);
        let mut file = File::create(&output_path)?;
        file.write_all(entry.contents)?;
        written += 1;
    }

    Ok(written)
}

/// `copyFromCorpus`: randomly sample up to `n` distinct files (flattening
/// subdirectories) from `src` and copy them into `dst` with fresh
/// content-hash names.
pub fn copy_from_corpus<R: Rng + ?Sized>(dst: &Path, src: &Path, n: usize, rng: &mut R) -> io::Result<usize> {
    fs::create_dir_all(dst)?;

    let mut candidates = Vec::new();
    collect_files_recursive(src, &mut candidates)?;

    let sample_size = n.min(candidates.len());
    let sampled = candidates.partial_shuffle(rng, sample_size).0;

    for path in sampled.iter() {
        let contents = fs::read(path)?;
        let name = content_hash_name(&contents);
        fs::write(dst.join(name), contents)?;
    }

    Ok(sampled.len())
}

fn collect_files_recursive(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files_recursive(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// `moveMergeableUnits`: move every file from `merge_dir` into `corpus_dir`
/// except those whose name is already present there AND looks like an
/// already-hashed survivor (spec.md §4.2).
pub fn move_mergeable_units(merge_dir: &Path, corpus_dir: &Path) -> io::Result<usize> {
    fs::create_dir_all(corpus_dir)?;

    let initial: HashSet<String> = files_list(corpus_dir)?
        .into_iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();

    let mut moved = 0usize;
    for unit_path in files_list(merge_dir)? {
        let Some(name) = unit_path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if initial.contains(&name) && looks_like_content_hash(&name) {
            continue;
        }
        let dest = corpus_dir.join(&name);
        fs::rename(&unit_path, &dest).or_else(|_| {
            // Cross-device rename falls back to copy+remove.
            let mut src_file = File::open(&unit_path)?;
            let mut buf = Vec::new();
            src_file.read_to_end(&mut buf)?;
            drop(src_file);
            fs::write(&dest, buf)?;
            fs::remove_file(&unit_path)
        })?;
        moved += 1;
    }

    Ok(moved)
}
