//! RAII guard over a [`RawMutex`]

use super::RawMutex;
use std::marker::PhantomData;

/// Unlocks its mutex when dropped.
///
/// Not `Send`: a native mutex must be released by the thread that locked it.
pub struct MutexGuard<'a, M: RawMutex> {
    mutex: &'a M,
    _not_send: PhantomData<*const ()>,
}

impl<'a, M: RawMutex> MutexGuard<'a, M> {
    /// # Safety
    ///
    /// The calling thread must own `mutex`.
    pub(crate) unsafe fn new(mutex: &'a M) -> Self {
        Self {
            mutex,
            _not_send: PhantomData,
        }
    }

    /// The locked mutex
    pub fn mutex(&self) -> &'a M {
        self.mutex
    }
}

impl<M: RawMutex> Drop for MutexGuard<'_, M> {
    fn drop(&mut self) {
        // SAFETY: the guard exists only while this thread owns the mutex.
        unsafe { self.mutex.unlock() }
    }
}

impl<M: RawMutex> std::fmt::Debug for MutexGuard<'_, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutexGuard").finish_non_exhaustive()
    }
}
