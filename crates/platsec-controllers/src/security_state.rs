//! [`SecurityStateController`] – publishes the host's security state once.
//!
//! The controller has no inputs and exclusively owns
//! [`SecurityStateSpec`].  It runs through a fixed sequence and then stops
//! for good:
//!
//! 1. wait for the first scheduling event (or shutdown → return, no writes),
//! 2. derive the secure-boot posture from firmware and publish it,
//! 3. load the PCR signing key; when there is none, stop here,
//! 4. publish the key fingerprint.
//!
//! Both writes go through the modify primitive against the same singleton
//! resource, so readers see the posture first and the fingerprint added
//! later, never a partial value.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use platsec_firmware::Firmware;
use platsec_runtime::{Controller, ControllerContext, Input, Output};
use platsec_types::{NAMESPACE_RUNTIME, PlatError, SECURITY_STATE_ID, SecurityStateSpec};
use tracing::{debug, info};

use crate::signing_key::{self, DEFAULT_SIGNING_KEY_PATH};

pub const CONTROLLER_NAME: &str = "runtime.SecurityStateController";

/// Secure boot counts only when enabled and not bypassed by setup mode.
/// Any firmware query failure yields `false`.
pub fn secure_boot_posture(firmware: &dyn Firmware) -> bool {
    let enabled = match firmware.secure_boot_enabled() {
        Ok(enabled) => enabled,
        Err(e) => {
            debug!(error = %e, "secure boot state unavailable");
            return false;
        }
    };
    if !enabled {
        return false;
    }
    match firmware.setup_mode_active() {
        Ok(setup_mode) => !setup_mode,
        Err(e) => {
            debug!(error = %e, "setup mode state unavailable");
            false
        }
    }
}

/// One-shot producer of the `runtime/securitystate` resource.
pub struct SecurityStateController {
    firmware: Box<dyn Firmware>,
    signing_key_path: PathBuf,
    /// Set once the controller is past its wait point.
    done: AtomicBool,
}

impl SecurityStateController {
    pub fn new(firmware: Box<dyn Firmware>) -> Self {
        Self {
            firmware,
            signing_key_path: PathBuf::from(DEFAULT_SIGNING_KEY_PATH),
            done: AtomicBool::new(false),
        }
    }

    pub fn with_signing_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.signing_key_path = path.into();
        self
    }

    pub fn signing_key_path(&self) -> &Path {
        &self.signing_key_path
    }
}

#[async_trait]
impl Controller for SecurityStateController {
    fn name(&self) -> &str {
        CONTROLLER_NAME
    }

    fn inputs(&self) -> Vec<Input> {
        vec![]
    }

    fn outputs(&self) -> Vec<Output> {
        vec![Output::exclusive::<SecurityStateSpec>()]
    }

    async fn run(&self, ctx: &mut ControllerContext) -> Result<(), PlatError> {
        if self.done.load(Ordering::SeqCst) {
            debug!("security state already published");
            return Ok(());
        }

        let Some(event) = ctx.next_event().await else {
            info!("shutdown before first event, nothing published");
            return Ok(());
        };
        debug!(event = %event.id, reason = ?event.reason, "computing security state");
        self.done.store(true, Ordering::SeqCst);

        let secure_boot = secure_boot_posture(self.firmware.as_ref());
        ctx.modify::<SecurityStateSpec, _>(NAMESPACE_RUNTIME, SECURITY_STATE_ID, |state| {
            state.secure_boot = secure_boot;
            Ok(())
        })?;
        info!(secure_boot, "published secure boot state");

        let Some(certificate) = signing_key::load(&self.signing_key_path)? else {
            return Ok(());
        };
        let fingerprint = certificate.fingerprint();
        ctx.modify::<SecurityStateSpec, _>(NAMESPACE_RUNTIME, SECURITY_STATE_ID, |state| {
            state.pcr_signing_key_fingerprint = fingerprint.clone();
            Ok(())
        })?;
        info!(%fingerprint, path = %self.signing_key_path.display(), "published PCR signing key fingerprint");

        Ok(())
    }
}
