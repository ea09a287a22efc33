use crate::{config::GeneratorConfig, error::Error, store::OptimisticStore};

/// The window of IDs a generator currently holds for one scope.
///
/// The window is `(last_issued, upper_limit]`: `last_issued` is the most
/// recent ID handed out (or the persisted value the window was claimed from)
/// and `upper_limit` is the exclusive bound written back to the store.
///
/// The state only changes through two operations, both run under the scope's
/// lock:
/// - `refill_if_needed` claims a new window once the current one is used up.
/// - `take_next` issues the next ID from the window.
///
/// Together they keep `last_issued <= upper_limit` at all times.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ScopeState {
    last_issued: i64,
    upper_limit: i64,
}

impl ScopeState {
    /// The most recently issued ID, or the start of a freshly claimed window.
    pub const fn last_issued(&self) -> i64 {
        self.last_issued
    }

    /// The exclusive upper bound claimed in the store.
    pub const fn upper_limit(&self) -> i64 {
        self.upper_limit
    }

    /// Number of IDs left in the window.
    pub const fn remaining(&self) -> i64 {
        self.upper_limit - self.last_issued
    }

    /// Returns `true` when no IDs are left and the next request must refill.
    ///
    /// This includes the initial, never-claimed state.
    pub const fn is_exhausted(&self) -> bool {
        self.last_issued == self.upper_limit
    }

    /// Claims a new window from `store` if the current one is exhausted.
    ///
    /// Each attempt reads the persisted counter, computes the next upper
    /// bound and tries a fenced write. A lost race rereads and tries again, up
    /// to `max_write_attempts` times. The state is only updated once a write
    /// lands, so any error leaves it exactly as it was.
    pub(crate) fn refill_if_needed<S>(
        &mut self,
        scope: &str,
        store: &S,
        config: &GeneratorConfig,
    ) -> Result<(), Error<S::Err>>
    where
        S: OptimisticStore,
    {
        if !self.is_exhausted() {
            return Ok(());
        }

        let range_size = i64::from(config.range_size.get());
        for _attempt in 1..=config.max_write_attempts {
            let raw = store.read(scope).map_err(Error::Store)?;
            let Ok(last_issued) = raw.trim().parse::<i64>() else {
                #[cfg(feature = "tracing")]
                tracing::error!(scope, value = %raw, "persisted value is corrupt");
                return Err(Error::CorruptPersistedValue {
                    scope: scope.to_owned(),
                    value: raw,
                });
            };
            let upper_limit =
                last_issued
                    .checked_add(range_size)
                    .ok_or_else(|| Error::CounterOverflow {
                        scope: scope.to_owned(),
                        value: last_issued,
                    })?;

            if store
                .try_write(scope, &upper_limit.to_string())
                .map_err(Error::Store)?
            {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    scope,
                    last_issued,
                    upper_limit,
                    attempt = _attempt,
                    "claimed range"
                );
                self.last_issued = last_issued;
                self.upper_limit = upper_limit;
                return Ok(());
            }

            #[cfg(feature = "tracing")]
            tracing::debug!(scope, attempt = _attempt, "lost fencing race, rereading");
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(
            scope,
            attempts = config.max_write_attempts,
            "range allocation exhausted"
        );
        Err(Error::RangeAllocationExhausted {
            scope: scope.to_owned(),
            attempts: config.max_write_attempts,
        })
    }

    /// Issues the next ID from the window.
    ///
    /// Must only be called after a successful `refill_if_needed`.
    pub(crate) fn take_next(&mut self) -> i64 {
        debug_assert!(
            self.last_issued < self.upper_limit,
            "take_next on an exhausted window"
        );
        self.last_issued += 1;
        self.last_issued
    }
}
