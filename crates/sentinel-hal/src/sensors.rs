//! Analog and system-load readings feeding the classifier.
//!
//! Acquisition, filtering and calibration happen behind this trait.

use sentinel_types::SentinelError;

/// Source of calibrated sensor readings.
///
/// Every reading may fail transiently; the classifier skips the cycle when
/// one does.
pub trait SensorProvider: Send + Sync {
    /// Die temperature in degrees Celsius.
    fn temperature(&self) -> Result<f32, SentinelError>;

    /// 3.3 V rail in volts.
    fn voltage_3v3(&self) -> Result<f32, SentinelError>;

    /// 5 V rail in volts.
    fn voltage_5v(&self) -> Result<f32, SentinelError>;

    /// Internal reference voltage in volts.
    fn internal_vref(&self) -> Result<f32, SentinelError> {
        Ok(1.2)
    }

    /// Total current draw in amperes.
    fn current(&self) -> Result<f32, SentinelError>;

    /// CPU utilisation in percent, `0..=100`.
    fn cpu_usage(&self) -> Result<f32, SentinelError>;

    /// Memory utilisation in percent, `0..=100`.
    fn mem_usage(&self) -> Result<f32, SentinelError>;
}
