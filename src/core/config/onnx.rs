//! ONNX Runtime configuration types and utilities.

use crate::core::errors::OCRError;
use serde::{Deserialize, Serialize};

/// Graph optimization levels for ONNX Runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum OrtGraphOptimizationLevel {
    /// Disable all optimizations.
    DisableAll,
    /// Enable basic optimizations.
    #[default]
    Level1,
    /// Enable extended optimizations.
    Level2,
    /// Enable all optimizations.
    Level3,
}

/// Execution providers for ONNX Runtime.
///
/// Only the CPU provider is always compiled in; CUDA requires the `cuda` feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum OrtExecutionProvider {
    /// CPU execution provider (always available)
    #[default]
    CPU,
    /// NVIDIA CUDA execution provider
    CUDA {
        /// CUDA device ID (default: 0)
        device_id: Option<i32>,
        /// Memory limit in bytes (optional)
        gpu_mem_limit: Option<usize>,
    },
}

/// Configuration for ONNX Runtime sessions.
///
/// Every field is optional; unset fields leave the ONNX Runtime default in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrtSessionConfig {
    /// Number of threads used to parallelize execution within nodes
    pub intra_threads: Option<usize>,
    /// Number of threads used to parallelize execution across nodes
    pub inter_threads: Option<usize>,
    /// Graph optimization level
    pub optimization_level: Option<OrtGraphOptimizationLevel>,
    /// Execution providers in order of preference
    pub execution_providers: Option<Vec<OrtExecutionProvider>>,
    /// Enable memory pattern optimization
    pub enable_mem_pattern: Option<bool>,
    /// Log severity level (0=Verbose, 1=Info, 2=Warning, 3=Error, 4=Fatal)
    pub log_severity_level: Option<i32>,
}

impl OrtSessionConfig {
    /// Creates a new OrtSessionConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of intra-op threads.
    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = Some(threads);
        self
    }

    /// Sets the number of inter-op threads.
    pub fn with_inter_threads(mut self, threads: usize) -> Self {
        self.inter_threads = Some(threads);
        self
    }

    /// Sets the graph optimization level.
    pub fn with_optimization_level(mut self, level: OrtGraphOptimizationLevel) -> Self {
        self.optimization_level = Some(level);
        self
    }

    /// Sets the execution providers.
    ///
    /// # Arguments
    ///
    /// * `providers` - Vector of execution providers in order of preference.
    pub fn with_execution_providers(mut self, providers: Vec<OrtExecutionProvider>) -> Self {
        self.execution_providers = Some(providers);
        self
    }

    /// Enables or disables memory pattern optimization.
    pub fn with_memory_pattern(mut self, enable: bool) -> Self {
        self.enable_mem_pattern = Some(enable);
        self
    }

    /// Sets the log severity level (0=Verbose, 1=Info, 2=Warning, 3=Error, 4=Fatal).
    pub fn with_log_severity_level(mut self, level: i32) -> Self {
        self.log_severity_level = Some(level);
        self
    }

    /// Gets the execution providers, defaulting to CPU.
    pub fn get_execution_providers(&self) -> Vec<OrtExecutionProvider> {
        self.execution_providers
            .clone()
            .unwrap_or_else(|| vec![OrtExecutionProvider::CPU])
    }

    /// Builds a session configuration from a device string.
    ///
    /// Accepts `cpu`, `cuda` and `cuda:N`. CUDA devices fall back to CPU for
    /// operators the CUDA provider does not cover.
    pub fn for_device(self, device: &str) -> Result<Self, OCRError> {
        let device_lower = device.trim().to_lowercase();

        if device_lower == "cpu" {
            return Ok(self.with_execution_providers(vec![OrtExecutionProvider::CPU]));
        }

        if device_lower.starts_with("cuda") {
            let device_id = if device_lower == "cuda" {
                0
            } else if let Some(id_str) = device_lower.strip_prefix("cuda:") {
                id_str.parse::<i32>().map_err(|_| OCRError::ConfigError {
                    message: format!("Invalid CUDA device ID: {}", device),
                })?
            } else {
                return Err(OCRError::ConfigError {
                    message: format!(
                        "Invalid device format: {}. Expected 'cuda' or 'cuda:N'",
                        device
                    ),
                });
            };

            return Ok(self.with_execution_providers(vec![
                OrtExecutionProvider::CUDA {
                    device_id: Some(device_id),
                    gpu_mem_limit: None,
                },
                OrtExecutionProvider::CPU,
            ]));
        }

        Err(OCRError::ConfigError {
            message: format!("Unsupported device: {}", device),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ort_session_config_builder() {
        let config = OrtSessionConfig::new()
            .with_intra_threads(4)
            .with_inter_threads(1)
            .with_optimization_level(OrtGraphOptimizationLevel::Level2)
            .with_memory_pattern(true)
            .with_log_severity_level(3);

        assert_eq!(config.intra_threads, Some(4));
        assert_eq!(config.inter_threads, Some(1));
        assert_eq!(
            config.optimization_level,
            Some(OrtGraphOptimizationLevel::Level2)
        );
        assert_eq!(config.enable_mem_pattern, Some(true));
        assert_eq!(config.log_severity_level, Some(3));
        assert_eq!(
            config.get_execution_providers(),
            vec![OrtExecutionProvider::CPU]
        );
    }

    #[test]
    fn test_for_device_cpu() {
        let config = OrtSessionConfig::new().for_device("CPU").unwrap();
        assert_eq!(
            config.execution_providers,
            Some(vec![OrtExecutionProvider::CPU])
        );
    }

    #[test]
    fn test_for_device_cuda_with_index() {
        let config = OrtSessionConfig::new().for_device("cuda:1").unwrap();
        let providers = config.get_execution_providers();
        assert_eq!(providers.len(), 2);
        assert_eq!(
            providers[0],
            OrtExecutionProvider::CUDA {
                device_id: Some(1),
                gpu_mem_limit: None
            }
        );
        assert_eq!(providers[1], OrtExecutionProvider::CPU);
    }

    #[test]
    fn test_for_device_rejects_unknown() {
        assert!(OrtSessionConfig::new().for_device("tpu").is_err());
        assert!(OrtSessionConfig::new().for_device("cuda:x").is_err());
        assert!(OrtSessionConfig::new().for_device("cuda0").is_err());
    }
}
