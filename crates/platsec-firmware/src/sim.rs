//! In-process simulated firmware for tests and CI.
//!
//! [`SimFirmware`] answers every query from fixed values, or fails like a
//! host without UEFI when a value is absent.
//!
//! # Example
//!
//! ```rust
//! use platsec_firmware::{Firmware, SimFirmware};
//!
//! let fw = SimFirmware::new(true, false);
//! assert!(fw.secure_boot_enabled().unwrap());
//!
//! let legacy = SimFirmware::unavailable();
//! assert!(legacy.secure_boot_enabled().is_err());
//! ```

use crate::firmware::{Firmware, FirmwareError};

/// A simulated firmware.  `None` means the variable cannot be read.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimFirmware {
    secure_boot: Option<bool>,
    setup_mode: Option<bool>,
}

impl SimFirmware {
    pub fn new(secure_boot: bool, setup_mode: bool) -> Self {
        Self {
            secure_boot: Some(secure_boot),
            setup_mode: Some(setup_mode),
        }
    }

    /// A host where neither variable exists.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// A host that reports `SecureBoot` but whose `SetupMode` cannot be read.
    pub fn without_setup_mode(secure_boot: bool) -> Self {
        Self {
            secure_boot: Some(secure_boot),
            setup_mode: None,
        }
    }
}

impl Firmware for SimFirmware {
    fn secure_boot_enabled(&self) -> Result<bool, FirmwareError> {
        self.secure_boot
            .ok_or_else(|| FirmwareError::NotAvailable("SecureBoot".to_string()))
    }

    fn setup_mode_active(&self) -> Result<bool, FirmwareError> {
        self.setup_mode
            .ok_or_else(|| FirmwareError::NotAvailable("SetupMode".to_string()))
    }
}
