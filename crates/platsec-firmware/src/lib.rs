//! `platsec-firmware` – platform firmware queries.
//!
//! The rest of platsec only ever talks to the [`Firmware`] trait, so the
//! backing implementation can be swapped without touching the controllers.
//!
//! # Modules
//!
//! - [`firmware`] – the [`Firmware`] trait and [`FirmwareError`].
//! - [`efivars`] – [`EfiVars`]: reads UEFI variables through efivarfs.
//! - [`sim`] – [`SimFirmware`]: fixed answers for tests and hosts without
//!   UEFI.

pub mod efivars;
pub mod firmware;
pub mod sim;

pub use efivars::{DEFAULT_EFIVARS_PATH, EFI_GLOBAL_VARIABLE_GUID, EfiVars};
pub use firmware::{Firmware, FirmwareError};
pub use sim::SimFirmware;
