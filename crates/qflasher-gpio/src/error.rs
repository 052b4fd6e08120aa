//! Error types for GPIO modem reset

use thiserror::Error;

/// GPIO reset errors
#[derive(Debug, Error)]
pub enum GpioError {
    /// Failed to request the reset line
    #[error("Failed to request GPIO line {line} on '{chip}': {source}")]
    LineRequestFailed {
        /// Chip device path
        chip: String,
        /// Line offset
        line: u32,
        /// Underlying gpiocdev error
        #[source]
        source: gpiocdev::Error,
    },

    /// Failed to drive the reset line
    #[error("Failed to set GPIO line value: {0}")]
    SetValueFailed(#[source] gpiocdev::Error),

    /// Chip given neither as a path nor as a chip number
    #[error("Invalid GPIO chip '{0}'. Use /dev/gpiochipN or N")]
    InvalidChip(String),
}

/// Result type for GPIO reset operations
pub type Result<T> = std::result::Result<T, GpioError>;
