//! Configuration APIs for the platform layer
//!
//! Build mode for the threading primitives is fixed by Cargo features and is
//! not configurable here. What *is* configurable at runtime is how the
//! capability snapshot is captured and how worker threads are named.
//!
//! # Environment Initialization
//!
//! ```rust
//! use zipora_platform::config::{Config, PlatformConfig};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Reads ZIPORA_CPU_DISABLE_DETECTION, ZIPORA_CPU_LOG_CAPABILITIES, ...
//! let config = PlatformConfig::from_env()?;
//!
//! // Same variables under a custom prefix
//! let config = PlatformConfig::from_env_with_prefix("MYAPP_")?;
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use std::env;
use std::fmt;
use std::path::Path;

pub mod platform;

#[cfg(test)]
mod tests;

pub use platform::PlatformConfig;

/// Common configuration trait providing validation, environment
/// initialization and persistence.
pub trait Config: Clone + fmt::Debug {
    /// Validate the configuration for correctness and consistency.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, `Err` with details if invalid.
    fn validate(&self) -> Result<()>;

    /// Initialize configuration from environment variables with the
    /// `ZIPORA_` prefix.
    fn from_env() -> Result<Self>
    where
        Self: Default,
    {
        Self::from_env_with_prefix("ZIPORA_")
    }

    /// Initialize configuration from environment variables with a custom prefix.
    ///
    /// Unset or unparsable variables keep their default value.
    fn from_env_with_prefix(prefix: &str) -> Result<Self>
    where
        Self: Default;

    /// Save configuration to a file as JSON.
    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()>;

    /// Load and validate configuration from a JSON file.
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self>;
}

/// Parse an environment variable, falling back to `default` when the variable
/// is unset or does not parse.
pub fn parse_env_var<T>(var_name: &str, default: T) -> T
where
    T: std::str::FromStr + Clone,
{
    env::var(var_name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Parse a boolean environment variable.
///
/// Accepts: "true", "1", "yes", "on" (case-insensitive) as true,
/// everything else as false.
pub fn parse_env_bool(var_name: &str, default: bool) -> bool {
    env::var(var_name)
        .ok()
        .map(|s| {
            let s = s.to_lowercase();
            matches!(s.as_str(), "true" | "1" | "yes" | "on")
        })
        .unwrap_or(default)
}
