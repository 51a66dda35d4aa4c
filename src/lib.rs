//! # Zipora Platform: primitives beneath the compression kernels
//!
//! Two independent building blocks that the algorithmic code sits on:
//!
//! - **CPU capability snapshots**: capture the raw CPUID feature words once,
//!   then answer "does this processor support X" with a pure bit test. Pass
//!   the snapshot to whatever selects a code path; nothing is cached globally.
//! - **Threading primitives**: a mutex and a condition variable with one call
//!   surface and three build-time shapes (compiled out, native, or
//!   heap-allocated and error-checking for sanitizer runs).
//!
//! ## Quick Start
//!
//! ```rust
//! use zipora_platform::{CapabilitySnapshot, CpuFeature};
//! use zipora_platform::thread::{Condvar, Mutex, RawCondvar, RawMutex};
//!
//! let caps = CapabilitySnapshot::capture();
//! let use_avx2 = caps.has(CpuFeature::Avx2);
//! # let _ = use_avx2;
//!
//! let mut mutex = Mutex::init().unwrap();
//! let mut cv = Condvar::init().unwrap();
//! {
//!     let mut guard = mutex.lock_guard();
//!     cv.signal();
//!     cv.wait_while(&mut guard, || false);
//! }
//! cv.destroy();
//! mutex.destroy();
//! ```

#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod error;
pub mod system;
pub mod thread;

pub use config::{Config, PlatformConfig};
pub use error::{Result, ZiporaError};
pub use system::{CapabilitySnapshot, CapabilityWord, CpuFeature};
pub use thread::{BuildMode, RawCondvar, RawMutex, BUILD_MODE};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the build configuration and capture a snapshot per `config`.
///
/// Intended to run once at startup; the returned snapshot is what the caller
/// passes on to code-path selection.
pub fn init(config: &PlatformConfig) -> CapabilitySnapshot {
    log::debug!(
        "Initializing zipora-platform v{} (threading: {})",
        VERSION,
        BUILD_MODE.as_str()
    );
    CapabilitySnapshot::capture_with(config)
}
