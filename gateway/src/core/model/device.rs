//! Compute device and numeric precision selection
//!
//! The gateway does not run the neural network itself, but it decides which
//! device and precision the speech engine loads the model with, and the
//! converter casts weights to the matching dtype.
//!
//! Automatic selection falls back in the order Metal → CUDA → CPU, subject
//! to the GPU backends compiled in (`metal` / `cuda` features).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::{info, warn};

/// Device selection error
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("{0} requested but not available: {1}")]
    Unavailable(&'static str, String),
}

/// Device preference from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// Pick the best available device
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" | "nvidia" => Ok(Self::Cuda),
            "metal" | "mps" | "apple" => Ok(Self::Metal),
            other => Err(format!(
                "Invalid device '{other}'. Expected one of: auto, cpu, cuda, metal"
            )),
        }
    }
}

/// A concrete compute device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeDevice {
    Cpu,
    Cuda(usize),
    Metal(usize),
}

impl ComputeDevice {
    /// Resolve a preference to a device that is actually usable
    pub fn select(preference: DevicePreference) -> Result<Self, DeviceError> {
        match preference {
            DevicePreference::Cpu => {
                info!("Using CPU device (forced)");
                Ok(Self::Cpu)
            }
            DevicePreference::Cuda => probe::cuda(0)
                .map(|()| Self::Cuda(0))
                .map_err(|e| DeviceError::Unavailable("CUDA GPU", e)),
            DevicePreference::Metal => probe::metal(0)
                .map(|()| Self::Metal(0))
                .map_err(|e| DeviceError::Unavailable("Metal GPU", e)),
            DevicePreference::Auto => Ok(Self::auto()),
        }
    }

    fn auto() -> Self {
        match probe::metal(0) {
            Ok(()) => {
                info!("Auto-selected Metal GPU");
                return Self::Metal(0);
            }
            Err(e) => tracing::debug!("Metal GPU not available: {}", e),
        }

        match probe::cuda(0) {
            Ok(()) => {
                info!("Auto-selected CUDA GPU");
                return Self::Cuda(0);
            }
            Err(e) => tracing::debug!("CUDA GPU not available: {}", e),
        }

        info!("Using CPU device (no GPU available)");
        Self::Cpu
    }

    /// Device family name as reported by `/health`
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cuda(_) => "cuda",
            Self::Metal(_) => "metal",
        }
    }

    pub fn is_cuda(&self) -> bool {
        matches!(self, Self::Cuda(_))
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
            Self::Metal(ordinal) => write!(f, "metal:{ordinal}"),
        }
    }
}

/// Precision preference from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrecisionPreference {
    /// BF16 on CUDA, F32 everywhere else
    #[default]
    Auto,
    Bf16,
    F32,
}

impl FromStr for PrecisionPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "bf16" | "bfloat16" => Ok(Self::Bf16),
            "f32" | "float32" | "fp32" => Ok(Self::F32),
            other => Err(format!(
                "Invalid precision '{other}'. Expected one of: auto, bf16, f32"
            )),
        }
    }
}

/// Numeric precision the model weights are converted to and loaded with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Bf16,
    F32,
}

impl Precision {
    pub fn resolve(preference: PrecisionPreference, device: ComputeDevice) -> Self {
        match preference {
            PrecisionPreference::Bf16 => Self::Bf16,
            PrecisionPreference::F32 => Self::F32,
            PrecisionPreference::Auto if device.is_cuda() => Self::Bf16,
            PrecisionPreference::Auto => {
                if matches!(device, ComputeDevice::Metal(_)) {
                    warn!("BF16 is not selected automatically on Metal, using F32");
                }
                Self::F32
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bf16 => "bf16",
            Self::F32 => "f32",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "gguf")]
mod probe {
    use candle_core::Device;

    pub fn cuda(ordinal: usize) -> Result<(), String> {
        Device::new_cuda(ordinal).map(|_| ()).map_err(|e| e.to_string())
    }

    pub fn metal(ordinal: usize) -> Result<(), String> {
        Device::new_metal(ordinal).map(|_| ()).map_err(|e| e.to_string())
    }
}

#[cfg(not(feature = "gguf"))]
mod probe {
    pub fn cuda(_ordinal: usize) -> Result<(), String> {
        Err("GPU probing requires the `gguf` feature".to_string())
    }

    pub fn metal(_ordinal: usize) -> Result<(), String> {
        Err("GPU probing requires the `gguf` feature".to_string())
    }
}
