//! Generic [`Firmware`] trait for secure-boot related platform state.

use thiserror::Error;

/// Errors raised while querying firmware state.
#[derive(Error, Debug)]
pub enum FirmwareError {
    /// The variable (or the whole variable store) does not exist, e.g. on a
    /// legacy-BIOS or virtualised host.
    #[error("EFI variable {0} is not available")]
    NotAvailable(String),

    #[error("EFI variable {name} is malformed: {details}")]
    Malformed { name: String, details: String },

    #[error("failed to read EFI variable {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Read-only view of the firmware's secure-boot state.
pub trait Firmware: Send + Sync {
    /// Whether the firmware reports secure boot as enabled.
    ///
    /// # Errors
    ///
    /// Returns a [`FirmwareError`] when the state cannot be determined.
    fn secure_boot_enabled(&self) -> Result<bool, FirmwareError>;

    /// Whether the platform is in setup mode (no platform key enrolled,
    /// signature enforcement off).
    ///
    /// # Errors
    ///
    /// Returns a [`FirmwareError`] when the state cannot be determined.
    fn setup_mode_active(&self) -> Result<bool, FirmwareError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal in-process firmware used only for tests.
    struct AlwaysFailing;

    impl Firmware for AlwaysFailing {
        fn secure_boot_enabled(&self) -> Result<bool, FirmwareError> {
            Err(FirmwareError::NotAvailable("SecureBoot".to_string()))
        }

        fn setup_mode_active(&self) -> Result<bool, FirmwareError> {
            Err(FirmwareError::Malformed {
                name: "SetupMode".to_string(),
                details: "empty".to_string(),
            })
        }
    }

    #[test]
    fn trait_object_is_usable() {
        let fw: Box<dyn Firmware> = Box::new(AlwaysFailing);
        assert!(fw.secure_boot_enabled().is_err());
        assert!(fw.setup_mode_active().is_err());
    }

    #[test]
    fn error_display_names_variable() {
        let err = FirmwareError::NotAvailable("SecureBoot".to_string());
        assert!(err.to_string().contains("SecureBoot"));

        let err = FirmwareError::Io {
            name: "SetupMode".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().contains("SetupMode"));
    }
}
