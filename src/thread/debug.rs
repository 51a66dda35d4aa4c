//! Debug primitives: each value holds an optional handle to a heap-allocated
//! `pthread` object.
//!
//! The handle is absent until `init` and again after `destroy`, and any use in
//! that state panics. Because the native object sits in its own allocation, a
//! sanitizer run reports a primitive that is never destroyed as a leak and a
//! dangling one as use-after-free. Dropping an initialized value logs a warning
//! and leaks the block so the leak stays visible.
//!
//! Mutexes are created with `PTHREAD_MUTEX_ERRORCHECK`, and every non-zero
//! return code panics. A recursive lock or an unlock by a non-owner fails loudly
//! instead of hanging.

use super::{lifecycle_violation, RawCondvar, RawMutex};
use crate::error::{Result, ZiporaError};
use std::alloc::{alloc, dealloc, Layout};
use std::io;
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};

#[cfg(test)]
thread_local! {
    /// Blocks allocated and not yet freed by the current thread
    static LIVE_BLOCKS: std::cell::Cell<isize> = const { std::cell::Cell::new(0) };
}

#[cfg(test)]
fn live_blocks() -> isize {
    LIVE_BLOCKS.with(|n| n.get())
}

/// Allocate an uninitialized block for one `T`
fn alloc_block<T>(what: &str) -> Result<NonNull<T>> {
    let layout = Layout::new::<T>();
    // SAFETY: pthread objects have non-zero size.
    let block = unsafe { alloc(layout) } as *mut T;
    let block = NonNull::new(block).ok_or_else(|| {
        log::error!("failed to allocate {} bytes for debug {}", layout.size(), what);
        ZiporaError::resource_exhausted(format!("debug {} allocation", what))
    })?;
    #[cfg(test)]
    LIVE_BLOCKS.with(|n| n.set(n.get() + 1));
    Ok(block)
}

/// # Safety
///
/// `block` must come from [`alloc_block::<T>`] and not be freed yet.
unsafe fn free_block<T>(block: NonNull<T>) {
    #[cfg(test)]
    LIVE_BLOCKS.with(|n| n.set(n.get() - 1));
    // SAFETY: same layout as the allocation, per the caller.
    unsafe { dealloc(block.as_ptr() as *mut u8, Layout::new::<T>()) }
}

/// Allocate a block and run `native` on it, freeing the block again when
/// `native` returns a non-zero code.
fn init_block<T, F>(what: &str, op: &str, native: F) -> Result<NonNull<T>>
where
    F: FnOnce(*mut T) -> libc::c_int,
{
    let block = alloc_block::<T>(what)?;
    let ret = native(block.as_ptr());
    if ret != 0 {
        // SAFETY: `block` came from `alloc_block` and was never published.
        unsafe { free_block(block) };
        log::error!("{} failed with code {}", op, ret);
        return Err(ZiporaError::from_os_code(op, ret));
    }
    Ok(block)
}

#[track_caller]
fn check(op: &str, ret: libc::c_int) {
    if ret != 0 {
        panic!("{} failed: {}", op, io::Error::from_raw_os_error(ret));
    }
}

/// Mutex stored behind an optional heap handle
pub struct DebugMutex {
    handle: Option<NonNull<libc::pthread_mutex_t>>,
}

impl DebugMutex {
    #[track_caller]
    pub(crate) fn raw(&self) -> *mut libc::pthread_mutex_t {
        match self.handle {
            Some(handle) => handle.as_ptr(),
            None => lifecycle_violation("debug mutex"),
        }
    }

    /// Initialize `block` as an error-checking mutex
    ///
    /// # Safety
    ///
    /// `block` must be valid for writes of one `pthread_mutex_t`.
    unsafe fn init_errorcheck(block: *mut libc::pthread_mutex_t) -> libc::c_int {
        let mut attr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
        // SAFETY: `attr` is local storage; it is destroyed before returning.
        unsafe {
            let ret = libc::pthread_mutexattr_init(attr.as_mut_ptr());
            if ret != 0 {
                return ret;
            }
            let mut ret =
                libc::pthread_mutexattr_settype(attr.as_mut_ptr(), libc::PTHREAD_MUTEX_ERRORCHECK);
            if ret == 0 {
                ret = libc::pthread_mutex_init(block, attr.as_ptr());
            }
            libc::pthread_mutexattr_destroy(attr.as_mut_ptr());
            ret
        }
    }

    fn init_with<F>(native: F) -> Result<Self>
    where
        F: FnOnce(*mut libc::pthread_mutex_t) -> libc::c_int,
    {
        let block = init_block("mutex", "pthread_mutex_init", native)?;
        Ok(Self {
            handle: Some(block),
        })
    }
}

impl RawMutex for DebugMutex {
    fn init() -> Result<Self> {
        // SAFETY: `init_block` passes a fresh allocation sized for the mutex.
        Self::init_with(|block| unsafe { Self::init_errorcheck(block) })
    }

    fn destroy(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        // SAFETY: the handle was live and `&mut self` rules out other users.
        unsafe {
            check("pthread_mutex_destroy", libc::pthread_mutex_destroy(handle.as_ptr()));
            free_block(handle);
        }
    }

    #[track_caller]
    fn lock(&self) {
        // SAFETY: `raw` only returns a live handle.
        check("pthread_mutex_lock", unsafe { libc::pthread_mutex_lock(self.raw()) });
    }

    #[track_caller]
    unsafe fn unlock(&self) {
        // SAFETY: `raw` only returns a live handle; ownership is checked by errorcheck.
        check("pthread_mutex_unlock", unsafe { libc::pthread_mutex_unlock(self.raw()) });
    }

    fn is_initialized(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for DebugMutex {
    fn drop(&mut self) {
        if let Some(handle) = self.handle {
            log::warn!(
                "debug mutex at {:p} dropped without destroy, leaking it",
                handle.as_ptr()
            );
        }
    }
}

impl std::fmt::Debug for DebugMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugMutex")
            .field("handle", &self.handle.map(|h| h.as_ptr()))
            .finish()
    }
}

// SAFETY: DebugMutex is Send because:
// 1. The handle is uniquely owned; the heap block has no thread affinity.
unsafe impl Send for DebugMutex {}

// SAFETY: DebugMutex is Sync because:
// 1. `&self` operations only read the handle and call thread-safe pthread functions.
// 2. The handle is only replaced through `&mut self`.
unsafe impl Sync for DebugMutex {}

/// Condition variable stored behind an optional heap handle
pub struct DebugCondvar {
    handle: Option<NonNull<libc::pthread_cond_t>>,
}

impl DebugCondvar {
    #[track_caller]
    fn raw(&self) -> *mut libc::pthread_cond_t {
        match self.handle {
            Some(handle) => handle.as_ptr(),
            None => lifecycle_violation("debug condition variable"),
        }
    }

    fn init_with<F>(native: F) -> Result<Self>
    where
        F: FnOnce(*mut libc::pthread_cond_t) -> libc::c_int,
    {
        let block = init_block("condition variable", "pthread_cond_init", native)?;
        Ok(Self {
            handle: Some(block),
        })
    }
}

impl RawCondvar for DebugCondvar {
    type Mutex = DebugMutex;

    fn init() -> Result<Self> {
        // SAFETY: `init_block` passes a fresh allocation sized for the condvar.
        Self::init_with(|block| unsafe { libc::pthread_cond_init(block, ptr::null()) })
    }

    fn destroy(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        // SAFETY: the handle was live and `&mut self` rules out waiters.
        unsafe {
            check("pthread_cond_destroy", libc::pthread_cond_destroy(handle.as_ptr()));
            free_block(handle);
        }
    }

    #[track_caller]
    unsafe fn wait(&self, mutex: &DebugMutex) {
        // SAFETY: both handles are live; errorcheck rejects a mutex we do not own.
        let ret = unsafe { libc::pthread_cond_wait(self.raw(), mutex.raw()) };
        check("pthread_cond_wait", ret);
    }

    #[track_caller]
    fn signal(&self) {
        // SAFETY: `raw` only returns a live handle.
        check("pthread_cond_signal", unsafe { libc::pthread_cond_signal(self.raw()) });
    }

    #[track_caller]
    fn broadcast(&self) {
        // SAFETY: `raw` only returns a live handle.
        check("pthread_cond_broadcast", unsafe { libc::pthread_cond_broadcast(self.raw()) });
    }

    fn is_initialized(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for DebugCondvar {
    fn drop(&mut self) {
        if let Some(handle) = self.handle {
            log::warn!(
                "debug condvar at {:p} dropped without destroy, leaking it",
                handle.as_ptr()
            );
        }
    }
}

impl std::fmt::Debug for DebugCondvar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugCondvar")
            .field("handle", &self.handle.map(|h| h.as_ptr()))
            .finish()
    }
}

// SAFETY: DebugCondvar is Send because:
// 1. The handle is uniquely owned; the heap block has no thread affinity.
unsafe impl Send for DebugCondvar {}

// SAFETY: DebugCondvar is Sync because:
// 1. wait/signal/broadcast only read the handle and call thread-safe pthread functions.
// 2. The handle is only replaced through `&mut self`.
unsafe impl Sync for DebugCondvar {}
