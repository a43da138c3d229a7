//! GGUF → safetensors conversion
//!
//! The speech engine loads dense safetensors weights, while models are
//! distributed as quantized GGUF files. A [`ModelConverter`] dequantizes an
//! artifact into the Hugging Face hub cache layout so the engine can load it
//! like any downloaded snapshot:
//!
//! ```text
//! <cache>/models--<org>--<repo>/snapshots/<hash>/model.safetensors
//! ```
//!
//! The snapshot directory is keyed by the artifact's content hash, so a
//! different GGUF file never reuses a stale conversion.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::artifact::ModelArtifact;
use super::device::Precision;
use super::safetensors;

/// File name of the converted weights inside a snapshot directory
pub const CONVERTED_FILENAME: &str = "model.safetensors";

/// Suffix of the in-progress conversion output
const PARTIAL_SUFFIX: &str = "partial";

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("model converter is not available")]
    Unavailable,

    #[error("Failed to read GGUF file {path}: {message}")]
    Gguf { path: PathBuf, message: String },

    #[error("Invalid safetensors header in {path}: {message}")]
    Header { path: PathBuf, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl ConvertError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn header(path: &Path, message: impl Into<String>) -> Self {
        Self::Header {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

/// Converts a quantized artifact into dense safetensors weights
pub trait ModelConverter: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Write the dequantized weights of `source` to `destination`
    fn convert(&self, source: &Path, destination: &Path, precision: Precision)
    -> Result<(), ConvertError>;

    /// Merge string metadata into the header of a safetensors file
    fn tag_metadata(
        &self,
        path: &Path,
        metadata: &BTreeMap<String, String>,
    ) -> Result<(), ConvertError> {
        safetensors::tag_metadata(path, metadata)
    }
}

/// Metadata written into every converted file so PyTorch-style loaders
/// accept it
pub fn default_metadata() -> BTreeMap<String, String> {
    BTreeMap::from([("format".to_string(), "pt".to_string())])
}

/// Hub cache directory of a model repository
pub fn hub_repo_dir(cache_root: &Path, model_id: &str) -> PathBuf {
    cache_root.join(format!("models--{}", model_id.replace('/', "--")))
}

/// Location of the converted weights for one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedModel {
    path: PathBuf,
}

impl ConvertedModel {
    pub fn locate(cache_root: &Path, model_id: &str, artifact: &ModelArtifact) -> Self {
        let path = hub_repo_dir(cache_root, model_id)
            .join("snapshots")
            .join(artifact.short_hash())
            .join(CONVERTED_FILENAME);
        Self { path }
    }

    /// Path of the converted safetensors file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot directory handed to the engine as its weights directory
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Path the converter writes to before the result is published
    pub fn partial_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".");
        name.push(PARTIAL_SUFFIX);
        PathBuf::from(name)
    }

    /// Whether a completed conversion is already cached
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Run `converter` and publish the result at [`Self::path`].
    ///
    /// Output goes to a partial file first and is renamed into place only
    /// after conversion and tagging both succeed, so an interrupted run never
    /// leaves a file that looks complete.
    pub fn materialize(
        &self,
        converter: &dyn ModelConverter,
        source: &Path,
        precision: Precision,
    ) -> Result<(), ConvertError> {
        let dir = self.directory();
        std::fs::create_dir_all(dir).map_err(|e| ConvertError::io(dir, e))?;

        let partial = self.partial_path();
        let result = converter
            .convert(source, &partial, precision)
            .and_then(|()| converter.tag_metadata(&partial, &default_metadata()))
            .and_then(|()| {
                std::fs::rename(&partial, &self.path).map_err(|e| ConvertError::io(&self.path, e))
            });

        if result.is_err() {
            let _ = std::fs::remove_file(&partial);
        }
        result
    }
}

/// Dequantizes GGUF tensors with candle and saves them as safetensors
#[cfg(feature = "gguf")]
#[derive(Debug, Default, Clone, Copy)]
pub struct GgufConverter;

#[cfg(feature = "gguf")]
impl ModelConverter for GgufConverter {
    fn name(&self) -> &str {
        "gguf"
    }

    fn convert(
        &self,
        source: &Path,
        destination: &Path,
        precision: Precision,
    ) -> Result<(), ConvertError> {
        use std::collections::HashMap;
        use std::fs::File;
        use std::io::BufReader;

        use candle_core::quantized::gguf_file;
        use candle_core::{DType, Device};

        let gguf_error = |e: candle_core::Error| ConvertError::Gguf {
            path: source.to_path_buf(),
            message: e.to_string(),
        };

        let file = File::open(source).map_err(|e| ConvertError::io(source, e))?;
        let mut reader = BufReader::new(file);
        let content = gguf_file::Content::read(&mut reader).map_err(gguf_error)?;

        let dtype = match precision {
            Precision::Bf16 => DType::BF16,
            Precision::F32 => DType::F32,
        };
        let device = Device::Cpu;

        let mut names: Vec<&String> = content.tensor_infos.keys().collect();
        names.sort();

        tracing::info!(
            tensors = names.len(),
            precision = %precision,
            "Dequantizing GGUF tensors from {}",
            source.display()
        );

        let mut tensors = HashMap::with_capacity(names.len());
        for name in names {
            let tensor = content
                .tensor(&mut reader, name, &device)
                .and_then(|qtensor| qtensor.dequantize(&device))
                .and_then(|tensor| tensor.to_dtype(dtype))
                .map_err(gguf_error)?;
            tracing::debug!(name = %name, shape = ?tensor.dims(), "Converted tensor");
            tensors.insert(name.clone(), tensor);
        }

        candle_core::safetensors::save(&tensors, destination).map_err(|e| ConvertError::Other(
            format!("Failed to write {}: {e}", destination.display()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct WritingConverter {
        calls: AtomicUsize,
        fail: bool,
    }

    impl ModelConverter for WritingConverter {
        fn name(&self) -> &str {
            "writing"
        }

        fn convert(
            &self,
            _source: &Path,
            destination: &Path,
            _precision: Precision,
        ) -> Result<(), ConvertError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let header = br#"{"w":{"dtype":"F32","shape":[1],"data_offsets":[0,4]}}"#;
            let mut bytes = (header.len() as u64).to_le_bytes().to_vec();
            bytes.extend_from_slice(header);
            bytes.extend_from_slice(&[0u8; 4]);
            std::fs::write(destination, bytes).map_err(|e| ConvertError::io(destination, e))?;
            if self.fail {
                return Err(ConvertError::Other("corrupt tensor".to_string()));
            }
            Ok(())
        }
    }

    fn artifact() -> ModelArtifact {
        ModelArtifact::from_parts("/models/vibevoice-q4.gguf", "ab".repeat(32))
    }

    #[test]
    fn test_converted_model_layout() {
        let converted = ConvertedModel::locate(Path::new("/cache"), "callgg/vibevoice-bf16", &artifact());
        assert_eq!(
            converted.path(),
            Path::new(
                "/cache/models--callgg--vibevoice-bf16/snapshots/abababababababab/model.safetensors"
            )
        );
        assert_eq!(
            converted.partial_path(),
            PathBuf::from(
                "/cache/models--callgg--vibevoice-bf16/snapshots/abababababababab/model.safetensors.partial"
            )
        );
    }

    #[test]
    fn test_materialize_publishes_tagged_file() {
        let cache = TempDir::new().unwrap();
        let converted = ConvertedModel::locate(cache.path(), "org/model", &artifact());
        let converter = WritingConverter {
            calls: AtomicUsize::new(0),
            fail: false,
        };

        converted
            .materialize(&converter, Path::new("unused.gguf"), Precision::F32)
            .unwrap();

        assert!(converted.exists());
        assert!(!converted.partial_path().exists());
        assert_eq!(
            safetensors::read_metadata(converted.path()).unwrap(),
            default_metadata()
        );
        assert_eq!(converter.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_materialize_leaves_no_output() {
        let cache = TempDir::new().unwrap();
        let converted = ConvertedModel::locate(cache.path(), "org/model", &artifact());
        let converter = WritingConverter {
            calls: AtomicUsize::new(0),
            fail: true,
        };

        let err = converted
            .materialize(&converter, Path::new("unused.gguf"), Precision::Bf16)
            .unwrap_err();

        assert!(err.to_string().contains("corrupt tensor"));
        assert!(!converted.exists());
        assert!(!converted.partial_path().exists());
    }

    #[cfg(feature = "gguf")]
    #[test]
    fn test_gguf_converter_rejects_non_gguf_input() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("fake.gguf");
        std::fs::write(&source, b"definitely not gguf").unwrap();

        let err = GgufConverter
            .convert(&source, &dir.path().join("out.safetensors"), Precision::F32)
            .unwrap_err();
        assert!(matches!(err, ConvertError::Gguf { .. }));
    }
}
