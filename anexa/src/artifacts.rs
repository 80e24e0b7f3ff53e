use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// One local file queued for upload.
///
/// Ledger identity is the file NAME within its task, not the full path —
/// operators move per-instrument folders around between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub name: String,
}

/// Extensions SEI accepts from this robot.
const UPLOAD_EXTENSIONS: [&str; 2] = ["pdf", "zip"];

/// Immediate subdirectories of `base` whose name contains the instrument
/// number. Sorted for a reproducible processing order; an empty result is a
/// valid outcome, not an error.
pub fn matching_folders(base: &Path, instrument: &str) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(base)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if entry.file_name().to_string_lossy().contains(instrument) {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}

/// Recursively collect the PDF and ZIP files under `folder`, sorted
/// lexicographically by full path so every run sees the same order.
pub fn scan_artifacts(folder: &Path) -> io::Result<Vec<Artifact>> {
    let mut artifacts = Vec::new();
    for entry in WalkDir::new(folder) {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !UPLOAD_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        artifacts.push(Artifact {
            name: name.to_string(),
            path,
        });
    }
    artifacts.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(artifacts)
}
