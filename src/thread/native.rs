//! Production primitives: one `pthread` object stored inline per value.
//!
//! The native object lives and dies with the Rust value. Dropping an
//! initialized primitive destroys it, and an explicit `destroy` does the same
//! earlier. Return codes from lock/unlock/wait are only checked in debug
//! builds.
//!
//! A `pthread` object may not be copied once it is in use. Each value records
//! the address of its first lock, wait or signal, and any later use from a
//! different address panics. Put the primitive where it will live (an `Arc`,
//! a struct field, a local that is only borrowed) before touching it.

use super::{lifecycle_violation, RawCondvar, RawMutex};
use crate::error::{Result, ZiporaError};
use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// Return `current`, pinning it as the only address `anchor` accepts
#[inline]
#[track_caller]
fn anchored<T>(anchor: &AtomicPtr<T>, current: *mut T, what: &str) -> *mut T {
    let first = anchor.load(Ordering::Relaxed);
    if first == current {
        return current;
    }
    if first.is_null() {
        match anchor.compare_exchange(
            ptr::null_mut(),
            current,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return current,
            Err(seen) if seen == current => return current,
            Err(_) => {}
        }
    }
    moved_after_use(what)
}

#[cold]
#[track_caller]
fn moved_after_use(what: &str) -> ! {
    panic!("{} moved after first use", what)
}

/// Mutex backed by an inline `pthread_mutex_t`.
///
/// Moving the value is fine until the first `lock`. After that it must stay
/// at the same address until `destroy` or drop.
pub struct NativeMutex {
    inner: UnsafeCell<libc::pthread_mutex_t>,
    anchor: AtomicPtr<libc::pthread_mutex_t>,
    live: bool,
}

impl NativeMutex {
    #[track_caller]
    pub(crate) fn raw(&self) -> *mut libc::pthread_mutex_t {
        if !self.live {
            lifecycle_violation("mutex");
        }
        anchored(&self.anchor, self.inner.get(), "mutex")
    }
}

impl RawMutex for NativeMutex {
    fn init() -> Result<Self> {
        let mut mutex = Self {
            inner: UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER),
            anchor: AtomicPtr::new(ptr::null_mut()),
            live: false,
        };
        // SAFETY: `inner` points to writable storage owned by `mutex`.
        let ret = unsafe { libc::pthread_mutex_init(mutex.inner.get(), ptr::null()) };
        if ret != 0 {
            log::error!("pthread_mutex_init failed with code {}", ret);
            return Err(ZiporaError::from_os_code("pthread_mutex_init", ret));
        }
        mutex.live = true;
        Ok(mutex)
    }

    fn destroy(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;
        // SAFETY: `&mut self` rules out other users; the mutex was initialized.
        let ret = unsafe { libc::pthread_mutex_destroy(self.inner.get()) };
        if ret != 0 {
            log::error!("pthread_mutex_destroy failed with code {}", ret);
        }
    }

    #[inline]
    fn lock(&self) {
        // SAFETY: `raw` only hands out a pointer to an initialized mutex.
        let ret = unsafe { libc::pthread_mutex_lock(self.raw()) };
        debug_assert_eq!(ret, 0, "pthread_mutex_lock failed");
    }

    #[inline]
    unsafe fn unlock(&self) {
        // SAFETY: initialized per `raw`, owned by this thread per the caller.
        let ret = unsafe { libc::pthread_mutex_unlock(self.raw()) };
        debug_assert_eq!(ret, 0, "pthread_mutex_unlock failed");
    }

    fn is_initialized(&self) -> bool {
        self.live
    }
}

impl Drop for NativeMutex {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for NativeMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeMutex").field("live", &self.live).finish()
    }
}

// SAFETY: NativeMutex is Send because:
// 1. `inner` is a plain pthread object with no thread affinity until locked.
// 2. `live` is only written through `&mut self`.
unsafe impl Send for NativeMutex {}

// SAFETY: NativeMutex is Sync because:
// 1. Every `&self` operation goes through pthread calls that serialize access.
// 2. `live` is only read through `&self`, never written.
// 3. `anchor` is atomic and set at most once.
unsafe impl Sync for NativeMutex {}

/// Condition variable backed by an inline `pthread_cond_t`.
///
/// Same placement rule as [`NativeMutex`]: no moves after the first wait or
/// signal.
pub struct NativeCondvar {
    inner: UnsafeCell<libc::pthread_cond_t>,
    anchor: AtomicPtr<libc::pthread_cond_t>,
    live: bool,
}

impl NativeCondvar {
    #[track_caller]
    fn raw(&self) -> *mut libc::pthread_cond_t {
        if !self.live {
            lifecycle_violation("condition variable");
        }
        anchored(&self.anchor, self.inner.get(), "condition variable")
    }
}

impl RawCondvar for NativeCondvar {
    type Mutex = NativeMutex;

    fn init() -> Result<Self> {
        let mut cond = Self {
            inner: UnsafeCell::new(libc::PTHREAD_COND_INITIALIZER),
            anchor: AtomicPtr::new(ptr::null_mut()),
            live: false,
        };
        // SAFETY: `inner` points to writable storage owned by `cond`.
        let ret = unsafe { libc::pthread_cond_init(cond.inner.get(), ptr::null()) };
        if ret != 0 {
            log::error!("pthread_cond_init failed with code {}", ret);
            return Err(ZiporaError::from_os_code("pthread_cond_init", ret));
        }
        cond.live = true;
        Ok(cond)
    }

    fn destroy(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;
        // SAFETY: `&mut self` rules out waiters; the condvar was initialized.
        let ret = unsafe { libc::pthread_cond_destroy(self.inner.get()) };
        if ret != 0 {
            log::error!("pthread_cond_destroy failed with code {}", ret);
        }
    }

    #[inline]
    unsafe fn wait(&self, mutex: &NativeMutex) {
        // SAFETY: both objects are initialized; the caller owns `mutex`.
        let ret = unsafe { libc::pthread_cond_wait(self.raw(), mutex.raw()) };
        debug_assert_eq!(ret, 0, "pthread_cond_wait failed");
    }

    #[inline]
    fn signal(&self) {
        // SAFETY: initialized per `raw`.
        let ret = unsafe { libc::pthread_cond_signal(self.raw()) };
        debug_assert_eq!(ret, 0, "pthread_cond_signal failed");
    }

    #[inline]
    fn broadcast(&self) {
        // SAFETY: initialized per `raw`.
        let ret = unsafe { libc::pthread_cond_broadcast(self.raw()) };
        debug_assert_eq!(ret, 0, "pthread_cond_broadcast failed");
    }

    fn is_initialized(&self) -> bool {
        self.live
    }
}

impl Drop for NativeCondvar {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for NativeCondvar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeCondvar").field("live", &self.live).finish()
    }
}

// SAFETY: NativeCondvar is Send because:
// 1. `inner` is a plain pthread object with no waiters when moved.
// 2. `live` is only written through `&mut self`.
unsafe impl Send for NativeCondvar {}

// SAFETY: NativeCondvar is Sync because:
// 1. wait/signal/broadcast are pthread calls designed for concurrent use.
// 2. `live` is only read through `&self`, never written.
// 3. `anchor` is atomic and set at most once.
unsafe impl Sync for NativeCondvar {}
