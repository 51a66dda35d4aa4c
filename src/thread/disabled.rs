//! No-op primitives for builds without concurrency support.
//!
//! There is never a second thread, so every operation completes immediately.
//! The types are `!Sync` to keep that assumption honest.

use super::{RawCondvar, RawMutex};
use crate::error::Result;
use std::cell::Cell;
use std::marker::PhantomData;

/// Mutex that never blocks
#[derive(Debug, Default)]
pub struct DisabledMutex {
    _single_thread: PhantomData<Cell<()>>,
}

impl RawMutex for DisabledMutex {
    fn init() -> Result<Self> {
        Ok(Self::default())
    }

    fn destroy(&mut self) {}

    #[inline(always)]
    fn lock(&self) {}

    #[inline(always)]
    unsafe fn unlock(&self) {}

    fn is_initialized(&self) -> bool {
        true
    }
}

/// Condition variable whose waits return at once
#[derive(Debug, Default)]
pub struct DisabledCondvar {
    _single_thread: PhantomData<Cell<()>>,
}

impl RawCondvar for DisabledCondvar {
    type Mutex = DisabledMutex;

    fn init() -> Result<Self> {
        Ok(Self::default())
    }

    fn destroy(&mut self) {}

    #[inline(always)]
    unsafe fn wait(&self, _mutex: &DisabledMutex) {}

    #[inline(always)]
    fn signal(&self) {}

    #[inline(always)]
    fn broadcast(&self) {}

    fn is_initialized(&self) -> bool {
        true
    }
}
