use std::any::type_name;
use std::fmt;
use std::num::NonZero;
use std::sync::{Condvar, Mutex};

/// A counting semaphore used to cap how many transforms an engine
/// processes simultaneously.
///
/// This is a deliberately explicit primitive: admission limiting is part of
/// the engine's measurable behavior, so it must be observable and testable
/// rather than buried inside a concurrency library.
///
/// # Example
///
/// ```
/// use new_zealand::nz;
/// use pixelpipe::Semaphore;
///
/// let semaphore = Semaphore::new(nz!(2));
///
/// let first = semaphore.acquire();
/// let second = semaphore.acquire();
/// assert!(semaphore.try_acquire().is_none());
///
/// drop(first);
/// assert!(semaphore.try_acquire().is_some());
/// # drop(second);
/// ```
pub struct Semaphore {
    available: Mutex<usize>,
    released: Condvar,
}

impl Semaphore {
    /// Creates a semaphore with the given number of permits.
    #[must_use]
    pub fn new(permits: NonZero<usize>) -> Self {
        Self {
            available: Mutex::new(permits.get()),
            released: Condvar::new(),
        }
    }

    /// Acquires a permit, blocking until one is available.
    ///
    /// The permit is returned to the semaphore when the guard is dropped.
    #[must_use]
    pub fn acquire(&self) -> SemaphorePermit<'_> {
        let mut available = self
            .available
            .lock()
            .expect("permit accounting never panics, so the mutex cannot be poisoned");

        while *available == 0 {
            available = self
                .released
                .wait(available)
                .expect("permit accounting never panics, so the mutex cannot be poisoned");
        }

        *available = available
            .checked_sub(1)
            .expect("guarded by the loop above - we only proceed when a permit is available");

        SemaphorePermit { owner: self }
    }

    /// Acquires a permit if one is immediately available.
    #[must_use]
    pub fn try_acquire(&self) -> Option<SemaphorePermit<'_>> {
        let mut available = self
            .available
            .lock()
            .expect("permit accounting never panics, so the mutex cannot be poisoned");

        *available = available.checked_sub(1)?;

        Some(SemaphorePermit { owner: self })
    }

    /// The number of permits currently available.
    ///
    /// Inherently racy under concurrent use - meaningful only in tests and
    /// diagnostics.
    #[must_use]
    pub fn available(&self) -> usize {
        *self
            .available
            .lock()
            .expect("permit accounting never panics, so the mutex cannot be poisoned")
    }

    fn release(&self) {
        let mut available = self
            .available
            .lock()
            .expect("permit accounting never panics, so the mutex cannot be poisoned");

        *available = available
            .checked_add(1)
            .expect("releasing more permits than were ever acquired is impossible");

        self.released.notify_one();
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("available", &self.available())
            .finish_non_exhaustive()
    }
}

/// Holds one permit of a [`Semaphore`]. Dropping it returns the permit.
#[derive(Debug)]
pub struct SemaphorePermit<'a> {
    owner: &'a Semaphore,
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        self.owner.release();
    }
}
