use core::num::NonZeroU32;

/// Default number of IDs claimed per refill.
pub const DEFAULT_RANGE_SIZE: NonZeroU32 = NonZeroU32::new(100).unwrap();

/// Default number of conditional writes attempted per refill.
pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 25;

/// Tuning knobs for an [`IdGenerator`], fixed at construction.
///
/// - `range_size`: how many IDs each refill claims from the store. Larger
///   ranges mean fewer round trips but more IDs leaked when a process exits.
/// - `max_write_attempts`: how many fencing conflicts a single refill
///   tolerates before giving up with
///   [`Error::RangeAllocationExhausted`].
///
/// # Example
/// ```
/// use core::num::NonZeroU32;
/// use rangeid::GeneratorConfig;
///
/// let config = GeneratorConfig::default()
///     .with_range_size(NonZeroU32::new(1000).unwrap())
///     .with_max_write_attempts(10);
///
/// assert_eq!(config.range_size.get(), 1000);
/// assert_eq!(config.max_write_attempts, 10);
/// ```
///
/// [`IdGenerator`]: crate::IdGenerator
/// [`Error::RangeAllocationExhausted`]: crate::Error::RangeAllocationExhausted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GeneratorConfig {
    /// Number of IDs claimed per refill.
    pub range_size: NonZeroU32,
    /// Conditional writes attempted per refill before giving up.
    pub max_write_attempts: u32,
}

impl GeneratorConfig {
    /// Returns a copy with `range_size` replaced.
    #[must_use]
    pub const fn with_range_size(mut self, range_size: NonZeroU32) -> Self {
        self.range_size = range_size;
        self
    }

    /// Returns a copy with `max_write_attempts` replaced.
    #[must_use]
    pub const fn with_max_write_attempts(mut self, max_write_attempts: u32) -> Self {
        self.max_write_attempts = max_write_attempts;
        self
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            range_size: DEFAULT_RANGE_SIZE,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        }
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: GeneratorConfig = serde_json::from_str(r#"{"range_size":500}"#).unwrap();
        assert_eq!(config.range_size.get(), 500);
        assert_eq!(config.max_write_attempts, DEFAULT_MAX_WRITE_ATTEMPTS);
    }

    #[test]
    fn zero_range_size_is_rejected() {
        let res = serde_json::from_str::<GeneratorConfig>(r#"{"range_size":0}"#);
        assert!(res.is_err());
    }
}
