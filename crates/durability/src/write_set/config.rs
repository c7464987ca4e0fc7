//! Write set configuration.

use std::time::Duration;

/// Write set configuration parameters.
#[derive(Debug, Clone)]
pub struct WriteSetConfig {
    /// Elapsed-time budget for the whole transfer (default: 10s).
    ///
    /// Also bounds materialization when it is enabled.
    pub max_write_time: Duration,

    /// Copy the source into memory at construction (default: false).
    pub materialize: bool,

    /// Largest batch a write set accepts, in bytes (default: 64MB).
    pub max_batch_bytes: u64,
}

impl Default for WriteSetConfig {
    fn default() -> Self {
        WriteSetConfig {
            max_write_time: Duration::from_secs(10),
            materialize: false,
            max_batch_bytes: 64 * 1024 * 1024, // 64MB
        }
    }
}

impl WriteSetConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the transfer budget (builder pattern).
    pub fn with_max_write_time(mut self, max_write_time: Duration) -> Self {
        self.max_write_time = max_write_time;
        self
    }

    /// Enable or disable materialization (builder pattern).
    pub fn with_materialize(mut self, materialize: bool) -> Self {
        self.materialize = materialize;
        self
    }

    /// Set the batch size cap (builder pattern).
    pub fn with_max_batch_bytes(mut self, bytes: u64) -> Self {
        self.max_batch_bytes = bytes;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), WriteSetConfigError> {
        if self.max_write_time.is_zero() {
            return Err(WriteSetConfigError::ZeroWriteTime);
        }
        if self.max_batch_bytes == 0 {
            return Err(WriteSetConfigError::ZeroBatchCap);
        }
        Ok(())
    }

    /// Create a configuration for testing (short deadline, small batches).
    pub fn for_testing() -> Self {
        WriteSetConfig {
            max_write_time: Duration::from_millis(200),
            materialize: false,
            max_batch_bytes: 1024 * 1024, // 1MB
        }
    }
}

/// Write set configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteSetConfigError {
    /// Transfer budget is zero.
    #[error("Max write time must be greater than zero")]
    ZeroWriteTime,

    /// Batch cap is zero.
    #[error("Max batch bytes must be greater than zero")]
    ZeroBatchCap,
}
