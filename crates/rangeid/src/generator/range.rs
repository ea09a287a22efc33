#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    config::GeneratorConfig,
    error::Result,
    generator::{ScopeCache, ScopeState},
    mutex::lock,
    store::OptimisticStore,
};

/// A range-reserving ID generator for named scopes.
///
/// Every scope is an independent sequence. The generator claims a block of
/// `range_size` IDs from the shared counter in an [`OptimisticStore`] and
/// serves requests from that block locally, going back to the store only when
/// the block runs out.
///
/// ## Features
/// - ✅ Thread-safe (`Sync` whenever the store is)
/// - ✅ Strictly increasing, gap-free IDs per scope within one generator
/// - ✅ Globally unique IDs across generators sharing a store
/// - ❌ No global ordering across generators
/// - ❌ Unused IDs of a dropped generator are never reissued
///
/// ## Recommended When
/// - Several processes need compact integer keys from one namespace
/// - A round trip per ID is too expensive, but one per range is fine
///
/// ## See Also
/// - [`MemoryStore`]
/// - [`FileStore`]
///
/// [`MemoryStore`]: crate::MemoryStore
/// [`FileStore`]: crate::FileStore
#[derive(Debug)]
pub struct IdGenerator<S>
where
    S: OptimisticStore,
{
    store: S,
    config: GeneratorConfig,
    scopes: ScopeCache,
}

impl<S> IdGenerator<S>
where
    S: OptimisticStore,
{
    /// Creates a generator over `store` with the default
    /// [`GeneratorConfig`] (ranges of 100, 25 write attempts).
    ///
    /// # Example
    /// ```
    /// use rangeid::{IdGenerator, MemoryStore};
    ///
    /// let generator = IdGenerator::new(MemoryStore::new());
    /// assert_eq!(generator.next_id("orders").unwrap(), 2);
    /// ```
    pub fn new(store: S) -> Self {
        Self::with_config(store, GeneratorConfig::default())
    }

    /// Creates a generator over `store` with explicit tuning.
    ///
    /// # Parameters
    /// - `store`: the participant handle this generator owns. Do not share it
    ///   with another generator; clone or reopen it instead.
    /// - `config`: range size and retry bound, fixed for the generator's
    ///   lifetime.
    ///
    /// # Example
    /// ```
    /// use core::num::NonZeroU32;
    /// use rangeid::{GeneratorConfig, IdGenerator, MemoryStore};
    ///
    /// let config = GeneratorConfig::default().with_range_size(NonZeroU32::new(10).unwrap());
    /// let generator = IdGenerator::with_config(MemoryStore::new(), config);
    ///
    /// let ids: Vec<i64> = (0..12).map(|_| generator.next_id("orders").unwrap()).collect();
    /// assert_eq!(ids, (2..14).collect::<Vec<_>>());
    /// ```
    pub fn with_config(store: S, config: GeneratorConfig) -> Self {
        Self {
            store,
            config,
            scopes: ScopeCache::default(),
        }
    }

    /// The tuning this generator was built with.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// The store this generator claims ranges from.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the next ID for `scope`.
    ///
    /// Served from the cached window when possible. Once the window is used
    /// up, this blocks on the store to claim the next one, rereading and
    /// retrying on fencing conflicts.
    ///
    /// # Errors
    /// - [`Error::CorruptPersistedValue`] if the stored counter is not an
    ///   integer. Not retried.
    /// - [`Error::RangeAllocationExhausted`] if every write attempt lost the
    ///   fencing race. The call may be retried later.
    /// - [`Error::CounterOverflow`] if the next range would overflow `i64`.
    /// - [`Error::Store`] for backend failures.
    /// - `Error::LockPoisoned` if a thread panicked while holding a lock
    ///   (without `parking-lot`).
    ///
    /// A failed call leaves the scope's window untouched.
    ///
    /// # Example
    /// ```
    /// use rangeid::{Error, IdGenerator, MemoryStore};
    ///
    /// let store = MemoryStore::new();
    /// store.force("orders", "not a number");
    /// let generator = IdGenerator::new(store);
    ///
    /// match generator.next_id("orders") {
    ///     Err(Error::CorruptPersistedValue { value, .. }) => assert_eq!(value, "not a number"),
    ///     other => panic!("unexpected: {other:?}"),
    /// }
    /// ```
    ///
    /// [`Error::CorruptPersistedValue`]: crate::Error::CorruptPersistedValue
    /// [`Error::RangeAllocationExhausted`]: crate::Error::RangeAllocationExhausted
    /// [`Error::CounterOverflow`]: crate::Error::CounterOverflow
    /// [`Error::Store`]: crate::Error::Store
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn next_id(&self, scope: &str) -> Result<i64, S::Err> {
        let shared = self.scopes.get_or_insert(scope)?;
        let mut state = lock(&shared)?;
        state.refill_if_needed(scope, &self.store, &self.config)?;
        Ok(state.take_next())
    }

    /// Returns a snapshot of the cached window for `scope`, or `None` if the
    /// scope has not been requested yet.
    pub fn window(&self, scope: &str) -> Result<Option<ScopeState>, S::Err> {
        let Some(shared) = self.scopes.get(scope)? else {
            return Ok(None);
        };
        let state = *lock(&shared)?;
        Ok(Some(state))
    }

    /// Number of scopes this generator has served so far.
    pub fn scope_count(&self) -> Result<usize, S::Err> {
        self.scopes.len()
    }
}
