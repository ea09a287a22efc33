/// The value written the first time a scope is observed to be absent.
pub const SEED_VALUE: &str = "1";

/// A shared counter record with a fenced conditional write.
///
/// This is the only seam between the generator and whatever durable storage
/// holds the counters. Each implementation picks its own fencing token
/// (a version number, a generation, an entity tag) and keeps it internally:
/// [`read`] records the token and [`try_write`] checks it.
///
/// A store handle acts as **one participant**. Its tokens belong to the
/// generator that owns it, so two generators must never share the same handle.
/// The generator serializes `read`/`try_write` pairs per scope, which is what
/// makes the per-handle token sound.
///
/// # Example
///
/// ```
/// use rangeid::{MemoryStore, OptimisticStore};
///
/// let store = MemoryStore::new();
/// assert_eq!(store.read("orders").unwrap(), "1");
/// assert!(store.try_write("orders", "101").unwrap());
///
/// // A second participant sharing the same backend.
/// let other = store.clone();
/// assert_eq!(other.read("orders").unwrap(), "101");
/// ```
///
/// [`read`]: OptimisticStore::read
/// [`try_write`]: OptimisticStore::try_write
pub trait OptimisticStore {
    /// Backend failure type. Never used for an ordinary fencing conflict.
    type Err: core::error::Error + Send + Sync + 'static;

    /// Returns the current persisted decimal value for `scope`.
    ///
    /// If the scope has never been written, the implementation seeds it to
    /// [`SEED_VALUE`] with a create-if-absent primitive first. Losing a
    /// concurrent seed race is not an error; the read then returns whatever
    /// the winner stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not be reached or refused the
    /// request.
    fn read(&self, scope: &str) -> Result<String, Self::Err>;

    /// Replaces the value for `scope` with `value` if nothing else has been
    /// written since this handle's last [`read`] of that scope.
    ///
    /// Returns `Ok(true)` when the write landed and `Ok(false)` on a fencing
    /// conflict, including when the scope was never read through this handle.
    ///
    /// # Errors
    ///
    /// Returns an error for transport or backend failures.
    ///
    /// [`read`]: OptimisticStore::read
    fn try_write(&self, scope: &str, value: &str) -> Result<bool, Self::Err>;
}
