#[cfg(feature = "parking-lot")]
pub use parking_lot::{Mutex, MutexGuard, RwLock};
#[cfg(not(feature = "parking-lot"))]
pub use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use crate::error::Error;

/// Locks `mutex`, mapping poisoning into [`Error::LockPoisoned`].
///
/// With `parking-lot` enabled this never fails.
pub(crate) fn lock<T, E>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, Error<E>> {
    #[cfg(feature = "parking-lot")]
    {
        Ok(mutex.lock())
    }
    #[cfg(not(feature = "parking-lot"))]
    {
        Ok(mutex.lock()?)
    }
}

/// Runs `f` under a shared read guard of `lock`.
pub(crate) fn with_read<T, R, E>(lock: &RwLock<T>, f: impl FnOnce(&T) -> R) -> Result<R, Error<E>> {
    #[cfg(feature = "parking-lot")]
    {
        Ok(f(&lock.read()))
    }
    #[cfg(not(feature = "parking-lot"))]
    {
        let guard = lock.read().map_err(|_| Error::LockPoisoned)?;
        Ok(f(&guard))
    }
}

/// Runs `f` under an exclusive write guard of `lock`.
pub(crate) fn with_write<T, R, E>(
    lock: &RwLock<T>,
    f: impl FnOnce(&mut T) -> R,
) -> Result<R, Error<E>> {
    #[cfg(feature = "parking-lot")]
    {
        Ok(f(&mut lock.write()))
    }
    #[cfg(not(feature = "parking-lot"))]
    {
        let mut guard = lock.write().map_err(|_| Error::LockPoisoned)?;
        Ok(f(&mut guard))
    }
}
