//! File discovery for indexing
//!
//! Expands a path-or-glob into the supported files beneath it. Existing
//! directories are walked recursively; anything else is treated as a glob
//! pattern (with `**` support). Only regular files are considered.

use crate::cache::expand;
use crate::config::{is_supported_extension, supported_extensions_hint};
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Outcome of collection: absolute, deduplicated, sorted supported paths,
/// plus the regular files that were skipped for their extension.
#[derive(Debug, Default)]
pub struct Collected {
    pub supported: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Expand `path_or_glob` and partition the matched regular files by the
/// extension allow-list. Fails with `NoSupportedFiles` when nothing
/// retrievable matched.
pub fn collect(path_or_glob: &str) -> Result<Collected> {
    let expanded = expand(path_or_glob);
    let root = Path::new(&expanded);

    // Dot-prefixed entries don't match a glob without a literal leading
    // dot, and directory walks prune them the same way.
    let candidates: Vec<PathBuf> = if root.is_dir() {
        WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect()
    } else {
        let options = glob::MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: true,
        };
        glob::glob_with(&expanded, options)
            .map_err(|e| Error::InvalidPattern(format!("{path_or_glob}: {e}")))?
            .filter_map(|entry| entry.ok())
            .filter(|p| p.is_file())
            .collect()
    };

    debug!("{} candidate files for {}", candidates.len(), path_or_glob);

    let mut supported = BTreeSet::new();
    let mut skipped = Vec::new();
    for path in candidates {
        if has_supported_extension(&path) {
            supported.insert(to_absolute(&path));
        } else {
            skipped.push(path);
        }
    }

    if supported.is_empty() {
        return Err(Error::NoSupportedFiles(format!(
            "{path_or_glob}\nSupported extensions: {}",
            supported_extensions_hint()
        )));
    }

    skipped.sort();
    skipped.dedup();

    Ok(Collected {
        supported: supported.into_iter().collect(),
        skipped,
    })
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(is_supported_extension)
}

fn to_absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
