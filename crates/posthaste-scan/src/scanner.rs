//! JWalk-based upload root scanner.

use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use globset::{Glob, GlobSet, GlobSetBuilder};
use jwalk::{Parallelism, WalkDir};
use rayon::slice::ParallelSliceMut;
use tracing::{debug, warn};

use posthaste_core::{ScanError, ScanWarning, UploadItem, WarningKind};

use crate::config::ScanConfig;

/// Everything found under an upload root.
#[derive(Debug, Clone)]
pub struct LocalScan {
    /// Canonical root that was scanned.
    pub root: PathBuf,
    /// Regular files, largest first.
    pub items: Vec<UploadItem>,
    /// Sum of all item sizes.
    pub total_bytes: u64,
    /// Entries that were skipped.
    pub warnings: Vec<ScanWarning>,
    /// Wall time of the scan.
    pub scan_duration: Duration,
}

/// Scanner that uses jwalk for parallel traversal.
#[derive(Debug, Default)]
pub struct LocalScanner;

impl LocalScanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        Self
    }

    /// Enumerate every regular file under the configured root.
    ///
    /// Directories are walked but never emitted. The returned items are
    /// sorted by descending size; ties keep walk order.
    pub fn scan(&self, config: &ScanConfig) -> Result<LocalScan, ScanError> {
        let start = Instant::now();
        let root = config
            .root
            .canonicalize()
            .map_err(|e| ScanError::io(&config.root, e))?;

        if !root.is_dir() {
            return Err(ScanError::NotADirectory { path: root });
        }

        let excludes = build_excludes(&config.exclude)?;

        let parallelism = match config.threads {
            0 => Parallelism::RayonDefaultPool {
                busy_timeout: Duration::from_millis(100),
            },
            n => Parallelism::RayonNewPool(n),
        };

        let walker = WalkDir::new(&root)
            .parallelism(parallelism)
            .skip_hidden(!config.include_hidden)
            .follow_links(config.follow_symlinks);

        let mut items = Vec::new();
        let mut warnings = Vec::new();
        let mut total_bytes = 0u64;

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
                    let kind = match err.io_error().map(|e| e.kind()) {
                        Some(std::io::ErrorKind::PermissionDenied) => WarningKind::PermissionDenied,
                        _ => WarningKind::ReadError,
                    };
                    warnings.push(ScanWarning::new(path, err.to_string(), kind));
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                continue;
            }

            let path = entry.path();
            if file_type.is_symlink() {
                warnings.push(ScanWarning::skipped_symlink(&path));
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let Some(name) = object_name(&root, &path) else {
                warnings.push(ScanWarning::invalid_name(&path));
                continue;
            };

            if excludes.is_match(&name) {
                debug!(name = %name, "excluded");
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    warnings.push(ScanWarning::new(
                        &path,
                        err.to_string(),
                        WarningKind::MetadataError,
                    ));
                    continue;
                }
            };

            total_bytes += metadata.len();
            items.push(UploadItem::new(path, name, metadata.len()));
        }

        items.par_sort_by(|a, b| b.size.cmp(&a.size));

        for warning in &warnings {
            warn!(path = %warning.path.display(), "{}", warning.message);
        }

        Ok(LocalScan {
            root,
            items,
            total_bytes,
            warnings,
            scan_duration: start.elapsed(),
        })
    }
}

/// Object name for `path` under `root`: its relative components joined with `/`.
///
/// Returns `None` when the path is not under the root or is not valid UTF-8.
pub fn object_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

fn build_excludes(patterns: &[String]) -> Result<GlobSet, ScanError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ScanError::InvalidPattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ScanError::InvalidPattern {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })
}
