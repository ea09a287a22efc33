use std::{collections::HashMap, sync::Arc};

use crate::{
    error::Error,
    generator::ScopeState,
    mutex::{Mutex, RwLock, with_read, with_write},
};

#[cfg(feature = "cache-padded")]
pub(crate) type SharedScope = Arc<crossbeam_utils::CachePadded<Mutex<ScopeState>>>;
#[cfg(not(feature = "cache-padded"))]
pub(crate) type SharedScope = Arc<Mutex<ScopeState>>;

/// Scope name to per-scope state.
///
/// The map lock is only held long enough to clone an `Arc` out of it (read)
/// or to insert a missing entry (write). Once a caller holds a scope's
/// `Arc`, all further work goes through that scope's own mutex, so different
/// scopes never contend with each other.
#[derive(Debug, Default)]
pub(crate) struct ScopeCache {
    states: RwLock<HashMap<String, SharedScope>>,
}

impl ScopeCache {
    /// Returns the state for `scope`, creating it on first use.
    ///
    /// Racing first requests for the same scope all receive the same state:
    /// the entry is re-checked under the write lock before inserting.
    pub(crate) fn get_or_insert<E>(&self, scope: &str) -> Result<SharedScope, Error<E>> {
        if let Some(state) = with_read(&self.states, |states| states.get(scope).cloned())? {
            return Ok(state);
        }

        with_write(&self.states, |states| {
            Arc::clone(
                states
                    .entry(scope.to_owned())
                    .or_insert_with(|| Arc::new(new_state())),
            )
        })
    }

    pub(crate) fn get<E>(&self, scope: &str) -> Result<Option<SharedScope>, Error<E>> {
        with_read(&self.states, |states| states.get(scope).cloned())
    }

    pub(crate) fn len<E>(&self) -> Result<usize, Error<E>> {
        with_read(&self.states, HashMap::len)
    }
}

#[cfg(feature = "cache-padded")]
fn new_state() -> crossbeam_utils::CachePadded<Mutex<ScopeState>> {
    crossbeam_utils::CachePadded::new(Mutex::new(ScopeState::default()))
}

#[cfg(not(feature = "cache-padded"))]
fn new_state() -> Mutex<ScopeState> {
    Mutex::new(ScopeState::default())
}
