//! Sensor adapter error types and handling

use thiserror::Error;

/// Errors a hardware adapter may report for one acquisition cycle
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    /// Adapter lost its link to the device
    #[error("connection lost to sensor {sensor_id}")]
    ConnectionLost { sensor_id: u8 },
    /// No data arrived within the acquisition window
    #[error("sensor timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u32 },
    /// Device returned a frame that could not be decoded
    #[error("invalid reading: {details}")]
    InvalidReading { details: String },
    /// Adapter was configured with an unusable parameter
    #[error("configuration error: invalid {parameter} = {value}")]
    ConfigurationError { parameter: String, value: String },
}

/// Result type for sensor operations
pub type SensorResult<T> = Result<T, SensorError>;

/// Recovery strategy for an adapter after a failed cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecoveryStrategy {
    /// Wait and then retry
    RetryWithDelay { delay_ms: u32 },
    /// Reset the adapter and retry
    ResetAndRetry,
    /// Drop this cycle and continue
    Skip,
    /// Give up on the adapter
    Fail,
}

impl SensorError {
    /// Get the recommended recovery strategy for this error
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            SensorError::ConnectionLost { .. } => RecoveryStrategy::ResetAndRetry,
            SensorError::Timeout { .. } => RecoveryStrategy::RetryWithDelay { delay_ms: 100 },
            SensorError::InvalidReading { .. } => RecoveryStrategy::Skip,
            SensorError::ConfigurationError { .. } => RecoveryStrategy::Fail,
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.recovery_strategy(), RecoveryStrategy::Fail)
    }
}
