use core::fmt;

/// A result type whose error defaults to [`Error`] over the store error `E`.
pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// All errors `rangeid` can produce while issuing an ID.
///
/// The generic parameter `E` is the error type of the bound
/// [`OptimisticStore`]. Store failures are passed through untouched in
/// [`Error::Store`], so callers can tell a backend outage apart from the
/// allocation errors detected by the generator itself.
///
/// [`OptimisticStore`]: crate::OptimisticStore
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error<E> {
    /// The persisted counter for `scope` could not be parsed as an `i64`.
    ///
    /// Some writer left the record in a malformed state. The call is not
    /// retried and nothing is written back.
    CorruptPersistedValue {
        /// The scope whose record is corrupt.
        scope: String,
        /// The raw value read from the store.
        value: String,
    },

    /// Every conditional write lost the fencing race.
    ///
    /// Signals heavy contention or a stuck store. The cached window is left
    /// untouched, so the whole call may be retried later.
    RangeAllocationExhausted {
        /// The scope that could not be refilled.
        scope: String,
        /// Number of conditional writes attempted.
        attempts: u32,
    },

    /// Claiming the next range would overflow `i64`.
    CounterOverflow {
        /// The scope that ran out of room.
        scope: String,
        /// The persisted value the range would have started from.
        value: i64,
    },

    /// The store failed for a reason other than a fencing conflict.
    Store(E),

    /// A scope lock was **poisoned** by a thread panicking while holding it.
    ///
    /// With the `parking-lot` feature enabled, mutexes do not poison and this
    /// variant is not available.
    #[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
    #[cfg(not(feature = "parking-lot"))]
    LockPoisoned,
}

impl<E> Error<E> {
    /// Returns `true` for errors worth retrying later: lost fencing races.
    ///
    /// Corrupt records and overflow are permanent, and store failures are left
    /// to the caller to classify.
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::RangeAllocationExhausted { .. })
    }
}

impl<E: fmt::Display> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CorruptPersistedValue { scope, value } => write!(
                f,
                "persisted value {value:?} for scope `{scope}` is corrupt and could not be parsed as an i64"
            ),
            Self::RangeAllocationExhausted { scope, attempts } => write!(
                f,
                "failed to claim a range for scope `{scope}` after {attempts} attempts"
            ),
            Self::CounterOverflow { scope, value } => write!(
                f,
                "claiming a range after {value} for scope `{scope}` would overflow"
            ),
            Self::Store(e) => write!(f, "store error: {e}"),
            #[cfg(not(feature = "parking-lot"))]
            Self::LockPoisoned => f.write_str("scope lock poisoned"),
        }
    }
}

impl<E> core::error::Error for Error<E>
where
    E: core::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
#[cfg(not(feature = "parking-lot"))]
use crate::mutex::{MutexGuard, PoisonError};
#[cfg(not(feature = "parking-lot"))]
// Convert all poisoned lock errors to a simplified `LockPoisoned`
impl<T, E> From<PoisonError<MutexGuard<'_, T>>> for Error<E> {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}
