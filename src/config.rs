//! Stage configuration and its builder.

use std::time::Duration;

use crate::context::normalize_metadata_keys;
use crate::error::ConfigError;

/// Immutable configuration produced by [`BatchConfigBuilder::build`].
#[derive(Clone, Debug)]
pub struct BatchConfig {
    pub(crate) send_batch_size: usize,
    pub(crate) send_batch_max_size: usize,
    pub(crate) timeout: Duration,
    pub(crate) metadata_keys: Vec<String>,
    pub(crate) metadata_cardinality_limit: usize,
}

impl BatchConfig {
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder::new()
    }

    pub fn send_batch_size(&self) -> usize {
        self.send_batch_size
    }

    pub fn send_batch_max_size(&self) -> usize {
        self.send_batch_max_size
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn metadata_keys(&self) -> &[String] {
        &self.metadata_keys
    }

    pub fn metadata_cardinality_limit(&self) -> usize {
        self.metadata_cardinality_limit
    }

    /// A worker's timer exists whenever `timeout > 0`, independent of
    /// `send_batch_size` - see DESIGN.md's "timer armed whenever timeout >
    /// 0" resolution of the spec's REDESIGN FLAG.
    pub fn timer_enabled(&self) -> bool {
        self.timeout > Duration::ZERO
    }
}

/// Builder for [`BatchConfig`].
#[must_use = "builders do nothing unless you call .build()"]
#[derive(Clone, Debug)]
pub struct BatchConfigBuilder {
    send_batch_size: usize,
    send_batch_max_size: usize,
    timeout: Duration,
    metadata_keys: Vec<String>,
    metadata_cardinality_limit: usize,
}

impl BatchConfigBuilder {
    pub fn new() -> Self {
        Self {
            send_batch_size: 8192,
            send_batch_max_size: 0,
            timeout: Duration::from_secs(10),
            metadata_keys: Vec::new(),
            metadata_cardinality_limit: 0,
        }
    }

    /// Soft threshold - a batch releases as soon as its item count reaches
    /// this value. `0` disables the threshold gate (every arrival that
    /// leaves the buffer non-empty is released immediately).
    pub fn send_batch_size(mut self, size: usize) -> Self {
        self.send_batch_size = size;
        self
    }

    /// Hard cap on a single released payload's item count. `0` disables
    /// the cap.
    pub fn send_batch_max_size(mut self, max_size: usize) -> Self {
        self.send_batch_max_size = max_size;
        self
    }

    /// Quiescence duration after which a non-empty buffer is released.
    /// `0` disables time-triggered release.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Context-metadata keys used for tenant sharding. Normalized
    /// (lowercased, sorted, deduplicated) at `build()`.
    pub fn metadata_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Maximum number of distinct tenants the router may allocate. `0`
    /// means unlimited.
    pub fn metadata_cardinality_limit(mut self, limit: usize) -> Self {
        self.metadata_cardinality_limit = limit;
        self
    }

    pub fn build(self) -> Result<BatchConfig, ConfigError> {
        if self.metadata_keys.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::EmptyMetadataKey);
        }
        if self.send_batch_max_size != 0 && self.send_batch_max_size < self.send_batch_size {
            return Err(ConfigError::MaxSizeBelowBatchSize {
                size: self.send_batch_size,
                max: self.send_batch_max_size,
            });
        }

        Ok(BatchConfig {
            send_batch_size: self.send_batch_size,
            send_batch_max_size: self.send_batch_max_size,
            timeout: self.timeout,
            metadata_keys: normalize_metadata_keys(&self.metadata_keys),
            metadata_cardinality_limit: self.metadata_cardinality_limit,
        })
    }
}

impl Default for BatchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_max_size_below_batch_size() {
        let result = BatchConfig::builder().send_batch_size(100).send_batch_max_size(50).build();
        assert!(matches!(result, Err(ConfigError::MaxSizeBelowBatchSize { size: 100, max: 50 })));
    }

    #[test]
    fn zero_max_size_is_allowed_regardless_of_batch_size() {
        let result = BatchConfig::builder().send_batch_size(100).send_batch_max_size(0).build();
        assert!(result.is_ok());
    }

    #[test]
    fn metadata_keys_normalized_on_build() {
        let config = BatchConfig::builder()
            .metadata_keys(["X-Tenant", "x-tenant", "Env"])
            .build()
            .unwrap();
        assert_eq!(config.metadata_keys(), &["env".to_string(), "x-tenant".to_string()]);
    }

    #[test]
    fn rejects_empty_metadata_key() {
        let result = BatchConfig::builder().metadata_keys([""]).build();
        assert!(matches!(result, Err(ConfigError::EmptyMetadataKey)));
    }

    #[test]
    fn timer_enabled_tracks_timeout_only() {
        let with_timeout = BatchConfig::builder()
            .send_batch_size(0)
            .timeout(Duration::from_secs(1))
            .build()
            .unwrap();
        assert!(with_timeout.timer_enabled());

        let without_timeout = BatchConfig::builder()
            .send_batch_size(100)
            .timeout(Duration::ZERO)
            .build()
            .unwrap();
        assert!(!without_timeout.timer_enabled());
    }
}
