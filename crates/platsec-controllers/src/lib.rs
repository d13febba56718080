//! `platsec-controllers` – controllers that publish host facts.
//!
//! # Modules
//!
//! - [`security_state`] –
//!   [`SecurityStateController`][security_state::SecurityStateController]:
//!   computes the secure-boot posture and the PCR signing key fingerprint
//!   once, publishes them as `runtime/securitystate`, and stops.
//! - [`signing_key`] – PEM loading and the colon-separated SHA-256
//!   [`fingerprint`][signing_key::fingerprint] format.

pub mod security_state;
pub mod signing_key;

pub use security_state::{CONTROLLER_NAME, SecurityStateController, secure_boot_posture};
pub use signing_key::{DEFAULT_SIGNING_KEY_PATH, SigningCertificate, fingerprint};
