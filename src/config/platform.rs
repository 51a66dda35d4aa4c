//! Runtime configuration for capability capture and worker naming.

use super::{parse_env_bool, parse_env_var, Config};
use crate::error::{Result, ZiporaError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Platform layer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Skip CPUID and hand out the empty snapshot, forcing scalar code paths
    pub disable_cpu_detection: bool,
    /// Log the captured feature list at info level
    pub log_capabilities: bool,
    /// Prefix for worker thread names; workers are named `{prefix}-{index}`
    pub worker_name_prefix: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            disable_cpu_detection: false,
            log_capabilities: false,
            worker_name_prefix: "zipora-worker".to_string(),
        }
    }
}

impl PlatformConfig {
    /// Scalar-only configuration: detection disabled
    pub fn scalar_preset() -> Self {
        Self {
            disable_cpu_detection: true,
            ..Self::default()
        }
    }

    /// Diagnostic configuration: capabilities logged on capture
    pub fn diagnostic_preset() -> Self {
        Self {
            log_capabilities: true,
            ..Self::default()
        }
    }
}

impl Config for PlatformConfig {
    fn validate(&self) -> Result<()> {
        if self.worker_name_prefix.is_empty() {
            return Err(ZiporaError::configuration("worker_name_prefix must not be empty"));
        }
        if self.worker_name_prefix.contains('\0') {
            return Err(ZiporaError::configuration(
                "worker_name_prefix must not contain NUL bytes",
            ));
        }
        Ok(())
    }

    fn from_env_with_prefix(prefix: &str) -> Result<Self> {
        let mut config = Self::default();
        config.disable_cpu_detection = parse_env_bool(
            &format!("{}CPU_DISABLE_DETECTION", prefix),
            config.disable_cpu_detection,
        );
        config.log_capabilities = parse_env_bool(
            &format!("{}CPU_LOG_CAPABILITIES", prefix),
            config.log_capabilities,
        );
        config.worker_name_prefix = parse_env_var(
            &format!("{}THREAD_WORKER_PREFIX", prefix),
            config.worker_name_prefix,
        );
        config.validate()?;
        Ok(config)
    }

    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self).map_err(|e| {
            ZiporaError::configuration(format!("Failed to serialize platform config: {}", e))
        })?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            ZiporaError::configuration(format!("Failed to parse platform config file: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }
}
