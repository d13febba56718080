//! [`EfiVars`] – UEFI variables read through efivarfs.
//!
//! Each variable is a file named `<Name>-<vendor GUID>` under the efivarfs
//! mount.  The file starts with a 4-byte little-endian attribute word,
//! followed by the variable data.  `SecureBoot` and `SetupMode` are one-byte
//! booleans under the EFI global-variable GUID.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::firmware::{Firmware, FirmwareError};

/// Where efivarfs is mounted on Linux.
pub const DEFAULT_EFIVARS_PATH: &str = "/sys/firmware/efi/efivars";

/// Vendor GUID of the variables defined by the UEFI specification.
pub const EFI_GLOBAL_VARIABLE_GUID: &str = "8be4df61-93ca-11d2-aa0d-00e098032b8c";

const ATTRIBUTES_LEN: usize = 4;

/// [`Firmware`] backed by an efivarfs directory.
///
/// # Example
///
/// ```no_run
/// use platsec_firmware::{EfiVars, Firmware};
///
/// let fw = EfiVars::default();
/// let enabled = fw.secure_boot_enabled().unwrap_or(false);
/// ```
#[derive(Debug, Clone)]
pub struct EfiVars {
    root: PathBuf,
}

impl EfiVars {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing variable `name` under `guid`.
    pub fn variable_path(&self, name: &str, guid: &str) -> PathBuf {
        self.root.join(format!("{name}-{guid}"))
    }

    /// Read a variable, returning its attribute word and data.
    ///
    /// # Errors
    ///
    /// * [`FirmwareError::NotAvailable`] if the variable file does not exist.
    /// * [`FirmwareError::Io`] for any other read failure.
    /// * [`FirmwareError::Malformed`] if the file is shorter than the
    ///   attribute word.
    pub fn read_variable(&self, name: &str, guid: &str) -> Result<(u32, Vec<u8>), FirmwareError> {
        let path = self.variable_path(name, guid);
        let raw = fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => FirmwareError::NotAvailable(name.to_string()),
            _ => FirmwareError::Io {
                name: name.to_string(),
                source: e,
            },
        })?;

        if raw.len() < ATTRIBUTES_LEN {
            return Err(FirmwareError::Malformed {
                name: name.to_string(),
                details: format!("{} bytes, expected at least {ATTRIBUTES_LEN}", raw.len()),
            });
        }
        let (attributes, data) = raw.split_at(ATTRIBUTES_LEN);
        let attributes = u32::from_le_bytes([attributes[0], attributes[1], attributes[2], attributes[3]]);
        debug!(variable = name, attributes, len = data.len(), "read EFI variable");
        Ok((attributes, data.to_vec()))
    }

    /// Read a one-byte boolean global variable.
    fn read_flag(&self, name: &str) -> Result<bool, FirmwareError> {
        let (_, data) = self.read_variable(name, EFI_GLOBAL_VARIABLE_GUID)?;
        match data.first() {
            Some(value) => Ok(*value == 1),
            None => Err(FirmwareError::Malformed {
                name: name.to_string(),
                details: "no data after attributes".to_string(),
            }),
        }
    }
}

impl Default for EfiVars {
    fn default() -> Self {
        Self::new(DEFAULT_EFIVARS_PATH)
    }
}

impl Firmware for EfiVars {
    fn secure_boot_enabled(&self) -> Result<bool, FirmwareError> {
        self.read_flag("SecureBoot")
    }

    fn setup_mode_active(&self) -> Result<bool, FirmwareError> {
        self.read_flag("SetupMode")
    }
}
