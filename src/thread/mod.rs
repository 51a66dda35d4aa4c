//! Thread and synchronization primitives
//!
//! One call surface for mutual exclusion and condition signaling, compiled in
//! one of three shapes chosen by Cargo features:
//!
//! | features                          | mode         | representation                     |
//! |-----------------------------------|--------------|------------------------------------|
//! | no `multithread`                  | `Disabled`   | zero-sized no-op values            |
//! | `multithread`                     | `Production` | inline `pthread` objects           |
//! | `multithread` + `debug-threading` | `Debug`      | heap `pthread` objects, errorcheck |
//!
//! [`Mutex`] and [`Condvar`] alias the concrete types for the configured mode.
//! The concrete types stay nameable so tests can drive every mode in one build.
//!
//! Every primitive follows the lifecycle Uninitialized → Initialized →
//! Destroyed. `init` is the only way to obtain a value. Locking, waiting or
//! signaling a destroyed primitive panics.

mod disabled;
mod guard;

#[cfg(unix)]
mod debug;
#[cfg(unix)]
mod native;

#[cfg(feature = "multithread")]
pub mod worker;


#[cfg(all(feature = "multithread", not(unix)))]
compile_error!("the `multithread` feature requires a target with pthreads");

pub use disabled::{DisabledCondvar, DisabledMutex};
pub use guard::MutexGuard;

#[cfg(unix)]
pub use debug::{DebugCondvar, DebugMutex};
#[cfg(unix)]
pub use native::{NativeCondvar, NativeMutex};

#[cfg(feature = "multithread")]
pub use worker::WorkerThread;

use crate::error::Result;

/// Which shape of primitives this build uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildMode {
    /// Concurrency is compiled out; every operation is a no-op
    Disabled,
    /// Native OS primitives stored inline
    Production,
    /// Heap-allocated, error-checking native primitives
    Debug,
}

impl BuildMode {
    /// Whether primitives of this mode can block and coordinate threads
    pub fn is_threaded(self) -> bool {
        !matches!(self, BuildMode::Disabled)
    }

    /// Short lowercase name used in log lines
    pub fn as_str(self) -> &'static str {
        match self {
            BuildMode::Disabled => "disabled",
            BuildMode::Production => "production",
            BuildMode::Debug => "debug",
        }
    }
}

/// Mode selected for this build
pub const BUILD_MODE: BuildMode = if !cfg!(feature = "multithread") {
    BuildMode::Disabled
} else if cfg!(feature = "debug-threading") {
    BuildMode::Debug
} else {
    BuildMode::Production
};

/// Mutex for the configured build mode
#[cfg(not(feature = "multithread"))]
pub type Mutex = DisabledMutex;
/// Condition variable for the configured build mode
#[cfg(not(feature = "multithread"))]
pub type Condvar = DisabledCondvar;

/// Mutex for the configured build mode
#[cfg(all(feature = "multithread", not(feature = "debug-threading"), unix))]
pub type Mutex = NativeMutex;
/// Condition variable for the configured build mode
#[cfg(all(feature = "multithread", not(feature = "debug-threading"), unix))]
pub type Condvar = NativeCondvar;

/// Mutex for the configured build mode
#[cfg(all(feature = "debug-threading", unix))]
pub type Mutex = DebugMutex;
/// Condition variable for the configured build mode
#[cfg(all(feature = "debug-threading", unix))]
pub type Condvar = DebugCondvar;

/// Mutual exclusion primitive shared by every build mode.
///
/// The primitive knows nothing about the data it protects. Callers agree by
/// convention to touch that data only between `lock` and `unlock`.
pub trait RawMutex: Sized {
    /// Create an initialized mutex.
    ///
    /// Fails with [`ZiporaError::ResourceExhausted`](crate::ZiporaError) when
    /// the backing resource cannot be allocated. No partial state survives a
    /// failed call.
    fn init() -> Result<Self>;

    /// Release the backing resource. Further lock/unlock calls panic.
    fn destroy(&mut self);

    /// Block until the calling thread owns the mutex
    fn lock(&self);

    /// Release ownership.
    ///
    /// # Safety
    ///
    /// The calling thread must currently own the mutex.
    unsafe fn unlock(&self);

    /// Whether the mutex is between `init` and `destroy`
    fn is_initialized(&self) -> bool;

    /// Lock and return a guard that unlocks on drop
    fn lock_guard(&self) -> MutexGuard<'_, Self> {
        self.lock();
        // SAFETY: the lock was acquired on the line above by this thread.
        unsafe { MutexGuard::new(self) }
    }
}

/// Condition variable shared by every build mode.
///
/// A condition variable is not bound to a mutex; the mutex is passed at each
/// wait. Waiters must re-check their predicate after every return.
pub trait RawCondvar: Sized {
    /// Mutex type this condition variable waits with
    type Mutex: RawMutex;

    /// Create an initialized condition variable
    fn init() -> Result<Self>;

    /// Release the backing resource. Further wait/signal calls panic.
    fn destroy(&mut self);

    /// Atomically release `mutex`, sleep until woken, and reacquire `mutex`.
    ///
    /// May return spuriously.
    ///
    /// # Safety
    ///
    /// The calling thread must currently own `mutex`.
    unsafe fn wait(&self, mutex: &Self::Mutex);

    /// Wake at least one waiter, if any
    fn signal(&self);

    /// Wake every waiter
    fn broadcast(&self);

    /// Whether the condition variable is between `init` and `destroy`
    fn is_initialized(&self) -> bool;

    /// Wait using the mutex held by `guard`
    fn wait_guard(&self, guard: &mut MutexGuard<'_, Self::Mutex>) {
        // SAFETY: a live guard proves this thread owns the mutex.
        unsafe { self.wait(guard.mutex()) }
    }

    /// Wait until `condition` returns false
    fn wait_while<F>(&self, guard: &mut MutexGuard<'_, Self::Mutex>, mut condition: F)
    where
        F: FnMut() -> bool,
    {
        while condition() {
            self.wait_guard(guard);
        }
    }
}

/// Panic for a primitive used outside its initialized lifetime
#[cold]
#[track_caller]
pub(crate) fn lifecycle_violation(what: &str) -> ! {
    panic!("{} used outside its initialized lifetime", what)
}
