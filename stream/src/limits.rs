//! Configurable limits for bounded decoding.

/// Limits enforced while decoding a block stream.
///
/// Every length prefix is checked against these before any buffer is
/// allocated, so a corrupt or hostile stream cannot request gigabytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLimits {
    /// Maximum number of rows in a single block.
    pub max_rows_per_block: usize,

    /// Maximum key length in bytes.
    pub max_key_len: usize,

    /// Maximum value length in bytes.
    pub max_value_len: usize,
}

impl Default for StreamLimits {
    fn default() -> Self {
        Self {
            max_rows_per_block: 1 << 20,
            max_key_len: 1 << 20,
            // Values are the bulk of a workload; allow large ones.
            max_value_len: 64 << 20,
        }
    }
}

impl StreamLimits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_rows_per_block: 64,
            max_key_len: 256,
            max_value_len: 4096,
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_rows_per_block: usize::MAX,
            max_key_len: usize::MAX,
            max_value_len: usize::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_cover_generator_defaults() {
        let limits = StreamLimits::default();
        assert!(limits.max_rows_per_block >= 1000);
        assert!(limits.max_key_len >= 32);
        assert!(limits.max_value_len >= 1024);
    }

    #[test]
    fn testing_limits_smaller() {
        let test_limits = StreamLimits::for_testing();
        let default_limits = StreamLimits::default();

        assert!(test_limits.max_rows_per_block < default_limits.max_rows_per_block);
        assert!(test_limits.max_key_len < default_limits.max_key_len);
        assert!(test_limits.max_value_len < default_limits.max_value_len);
    }

    #[test]
    fn unlimited_limits() {
        let limits = StreamLimits::unlimited();
        assert_eq!(limits.max_rows_per_block, usize::MAX);
        assert_eq!(limits.max_key_len, usize::MAX);
        assert_eq!(limits.max_value_len, usize::MAX);
    }

    #[test]
    fn limits_const_constructible() {
        const LIMITS: StreamLimits = StreamLimits::for_testing();
        assert_eq!(LIMITS.max_rows_per_block, 64);
    }
}
