//! Named OS worker threads with create/join semantics.
//!
//! Only compiled when concurrency is enabled; a build without `multithread`
//! has no second thread to start.

use crate::config::{Config, PlatformConfig};
use crate::error::{Result, ZiporaError};
use std::thread::{Builder, JoinHandle};

/// A spawned worker that must be joined to collect its result
#[derive(Debug)]
pub struct WorkerThread<T> {
    name: String,
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> WorkerThread<T> {
    /// Start `f` on a new thread called `name`.
    ///
    /// Fails with `Configuration` when `name` contains a NUL byte and with
    /// `ResourceExhausted` when the OS refuses to create the thread.
    pub fn spawn<F>(name: impl Into<String>, f: F) -> Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let name = name.into();
        if name.contains('\0') {
            return Err(ZiporaError::configuration(format!(
                "worker name {:?} contains a NUL byte",
                name
            )));
        }
        let handle = Builder::new().name(name.clone()).spawn(f).map_err(|e| {
            log::error!("failed to spawn worker '{}': {}", name, e);
            ZiporaError::resource_exhausted(format!("worker thread '{}': {}", name, e))
        })?;
        log::debug!("spawned worker '{}'", name);
        Ok(Self { name, handle })
    }

    /// Start worker number `index`, named from the configured prefix
    pub fn spawn_indexed<F>(config: &PlatformConfig, index: usize, f: F) -> Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        config.validate()?;
        Self::spawn(format!("{}-{}", config.worker_name_prefix, index), f)
    }

    /// Name the worker was spawned with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the worker's closure has returned
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker and return its result
    pub fn join(self) -> Result<T> {
        let Self { name, handle } = self;
        handle.join().map_err(|_| {
            log::error!("worker '{}' panicked", name);
            ZiporaError::worker_panicked(name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_and_join() {
        let worker = WorkerThread::spawn("zipora-test", || 6 * 7).unwrap();
        assert_eq!(worker.name(), "zipora-test");
        assert_eq!(worker.join().unwrap(), 42);
    }

    #[test]
    fn test_thread_name_is_applied() {
        let worker = WorkerThread::spawn("named-worker", || {
            std::thread::current().name().map(str::to_owned)
        })
        .unwrap();
        assert_eq!(worker.join().unwrap().as_deref(), Some("named-worker"));
    }

    #[test]
    fn test_spawn_indexed_uses_prefix() {
        let config = PlatformConfig {
            worker_name_prefix: "zstd-mt".to_string(),
            ..PlatformConfig::default()
        };
        let worker = WorkerThread::spawn_indexed(&config, 3, || ()).unwrap();
        assert_eq!(worker.name(), "zstd-mt-3");
        worker.join().unwrap();
    }

    #[test]
    fn test_nul_in_name_is_rejected() {
        let result = WorkerThread::spawn("bad\0name", || ());
        assert!(matches!(result, Err(ZiporaError::Configuration { .. })));
    }

    #[test]
    fn test_spawn_indexed_validates_config() {
        let config = PlatformConfig {
            worker_name_prefix: "bad\0prefix".to_string(),
            ..PlatformConfig::default()
        };
        let result = WorkerThread::spawn_indexed(&config, 0, || ());
        assert!(matches!(result, Err(ZiporaError::Configuration { .. })));

        let config = PlatformConfig {
            worker_name_prefix: String::new(),
            ..PlatformConfig::default()
        };
        assert!(WorkerThread::spawn_indexed(&config, 1, || ()).is_err());
    }

    #[test]
    fn test_panicking_worker_reports_error() {
        let worker = WorkerThread::spawn("doomed", || -> u32 { panic!("boom") }).unwrap();
        match worker.join() {
            Err(ZiporaError::WorkerPanicked { name }) => assert_eq!(name, "doomed"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
