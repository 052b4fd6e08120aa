//! qflasher-gpio - Modem reset through a Linux GPIO line
//!
//! Boards that wire the modem reset pin to a SoC GPIO can power-cycle a
//! modem stuck in a bad state. The line is requested through the GPIO
//! character device (gpiocdev), pulled low for one second and released.
//!
//! # Example
//!
//! ```no_run
//! qflasher_gpio::reset_modem("/dev/gpiochip0", 17)?;
//! # Ok::<(), qflasher_gpio::GpioError>(())
//! ```

#![warn(missing_docs)]

mod error;

pub use error::{GpioError, Result};

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

/// How long the reset line is held low
pub const RESET_PULSE: Duration = Duration::from_secs(1);

const CONSUMER: &str = "qflasher";

/// Resolve a chip argument to a device path
///
/// Accepts a path such as `/dev/gpiochip0` or a bare chip number.
pub fn chip_path(chip: &str) -> Result<PathBuf> {
    if chip.starts_with('/') {
        return Ok(PathBuf::from(chip));
    }
    chip.parse::<u32>()
        .map(|n| PathBuf::from(format!("/dev/gpiochip{}", n)))
        .map_err(|_| GpioError::InvalidChip(chip.to_string()))
}

/// Pulse the modem reset line: low for [`RESET_PULSE`], then high
pub fn reset_modem(chip: &str, line: Offset) -> Result<()> {
    let path = chip_path(chip)?;

    let mut req_config = Config::default();
    req_config.with_line(line).as_output(Value::Active);

    let request = Request::from_config(req_config)
        .on_chip(&path)
        .with_consumer(CONSUMER)
        .request()
        .map_err(|source| GpioError::LineRequestFailed {
            chip: path.display().to_string(),
            line,
            source,
        })?;

    log::info!("Resetting modem via {} line {}", path.display(), line);
    request
        .set_value(line, Value::Inactive)
        .map_err(GpioError::SetValueFailed)?;
    thread::sleep(RESET_PULSE);
    request
        .set_value(line, Value::Active)
        .map_err(GpioError::SetValueFailed)?;

    log::debug!("Reset line {} released", line);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chip_path() {
        assert_eq!(
            chip_path("/dev/gpiochip2").unwrap(),
            PathBuf::from("/dev/gpiochip2")
        );
        assert_eq!(chip_path("0").unwrap(), PathBuf::from("/dev/gpiochip0"));
        assert!(matches!(
            chip_path("gpiochip0"),
            Err(GpioError::InvalidChip(_))
        ));
    }
}
