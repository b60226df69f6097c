//! Pool configuration parameters.

/// Configuration for a [`Pool`](crate::Pool).
///
/// Controls the single-allocation limit, the total byte budget, and the
/// layout name stamped into persisted images. Immutable after creation;
/// a reopened pool takes its limits from the image header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Largest single object, in bytes.
    ///
    /// Default: 16 MiB. Colony creation rejects block capacities whose
    /// element table would exceed this.
    pub max_alloc_size: usize,

    /// Total bytes of live objects the pool may hold.
    ///
    /// Default: 64 MiB.
    pub capacity_bytes: usize,

    /// Layout name. Opening an image written under a different layout
    /// fails with `LayoutMismatch`.
    pub layout: String,
}

impl PoolConfig {
    /// Default maximum single allocation: 16 MiB.
    pub const DEFAULT_MAX_ALLOC_SIZE: usize = 16 * 1024 * 1024;

    /// Default pool capacity: 64 MiB.
    pub const DEFAULT_CAPACITY_BYTES: usize = 64 * 1024 * 1024;

    /// Default layout name.
    pub const DEFAULT_LAYOUT: &'static str = "colony";

    /// Create a config with default limits for the given layout.
    pub fn new(layout: impl Into<String>) -> Self {
        Self {
            max_alloc_size: Self::DEFAULT_MAX_ALLOC_SIZE,
            capacity_bytes: Self::DEFAULT_CAPACITY_BYTES,
            layout: layout.into(),
        }
    }

    /// Override the single-allocation limit.
    pub fn with_max_alloc_size(mut self, bytes: usize) -> Self {
        self.max_alloc_size = bytes;
        self
    }

    /// Override the total capacity.
    pub fn with_capacity_bytes(mut self, bytes: usize) -> Self {
        self.capacity_bytes = bytes;
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LAYOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits() {
        let config = PoolConfig::default();
        assert_eq!(config.max_alloc_size, 16 * 1024 * 1024);
        assert_eq!(config.capacity_bytes, 64 * 1024 * 1024);
        assert_eq!(config.layout, "colony");
    }

    #[test]
    fn builders_override() {
        let config = PoolConfig::new("test")
            .with_max_alloc_size(128)
            .with_capacity_bytes(4096);
        assert_eq!(config.max_alloc_size, 128);
        assert_eq!(config.capacity_bytes, 4096);
        assert_eq!(config.layout, "test");
    }
}
