//! Quantized model artifact discovery
//!
//! Finds the GGUF file the server should load, either at an explicitly
//! configured path or by scanning a directory, and computes the content hash
//! that identifies the converted model in the cache.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

/// File extension of quantized model artifacts (matched case-insensitively)
pub const ARTIFACT_EXTENSION: &str = "gguf";

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("{0}")]
    NotFound(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LocateError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A located GGUF file together with its content hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifact {
    path: PathBuf,
    hash: String,
}

impl ModelArtifact {
    /// Hash the file at `path` and wrap it as an artifact
    pub fn identify(path: impl Into<PathBuf>) -> Result<Self, LocateError> {
        let path = path.into();
        let hash = hash_file(&path)?;
        Ok(Self { path, hash })
    }

    /// Wrap a file whose content hash is already known
    pub fn from_parts(path: impl Into<PathBuf>, hash: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            hash: hash.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name including the extension
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// File name without the extension
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// Hex-encoded SHA-256 of the file contents
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Prefix of the content hash used for cache snapshot directories
    pub fn short_hash(&self) -> &str {
        let end = self.hash.len().min(16);
        &self.hash[..end]
    }
}

/// Locate the model artifact to load.
///
/// An explicit path wins over scanning. When scanning finds several
/// candidates the first in file-name order is used, so repeated runs over
/// the same directory always pick the same file.
pub fn locate(explicit_path: Option<&Path>, scan_dir: &Path) -> Result<ModelArtifact, LocateError> {
    let path = match explicit_path {
        Some(path) => verify_explicit(path)?,
        None => select_from_dir(scan_dir)?,
    };

    info!("Using GGUF model: {}", path.display());
    ModelArtifact::identify(path)
}

/// List every GGUF file directly inside `dir`, sorted by file name
pub fn find_candidates(dir: &Path) -> Result<Vec<PathBuf>, LocateError> {
    let entries = std::fs::read_dir(dir).map_err(|e| LocateError::io(dir, e))?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| LocateError::io(dir, e))?;
        let path = entry.path();
        if path.is_file() && has_artifact_extension(&path) {
            candidates.push(path);
        }
    }

    candidates.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(candidates)
}

fn has_artifact_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARTIFACT_EXTENSION))
}

fn verify_explicit(path: &Path) -> Result<PathBuf, LocateError> {
    if !path.is_file() {
        return Err(LocateError::NotFound(format!(
            "Model file {} does not exist",
            path.display()
        )));
    }
    if !has_artifact_extension(path) {
        return Err(LocateError::NotFound(format!(
            "Model file {} is not a .{ARTIFACT_EXTENSION} file",
            path.display()
        )));
    }
    Ok(path.to_path_buf())
}

fn select_from_dir(dir: &Path) -> Result<PathBuf, LocateError> {
    let mut candidates = find_candidates(dir)?;

    match candidates.len() {
        0 => Err(LocateError::NotFound(format!(
            "No .{ARTIFACT_EXTENSION} files found in {}",
            dir.display()
        ))),
        1 => Ok(candidates.remove(0)),
        count => {
            let selected = candidates.remove(0);
            warn!(
                candidates = count,
                selected = %selected.display(),
                "Multiple GGUF files found, using the first one"
            );
            Ok(selected)
        }
    }
}

/// Compute the hex-encoded SHA-256 digest of a file
pub fn hash_file(path: &Path) -> Result<String, LocateError> {
    let file = File::open(path).map_err(|e| LocateError::io(path, e))?;
    let mut reader = BufReader::with_capacity(1 << 20, file);
    let mut hasher = Sha256::new();
    std::io::copy(&mut reader, &mut hasher).map_err(|e| LocateError::io(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}
