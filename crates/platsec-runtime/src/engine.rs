//! [`ControllerEngine`] – hosts controllers and drives them with events.
//!
//! Registration enforces output ownership: a resource type declared as
//! [`OutputKind::Exclusive`] by one controller cannot be declared by any
//! other.  [`ControllerEngine::run`] then:
//!
//! 1. spawns every controller on its own Tokio task,
//! 2. hands each one an [`EventReason::Initial`] event,
//! 3. forwards committed store changes as [`EventReason::InputChanged`] to
//!    controllers whose inputs match (one pending event per controller;
//!    further changes are coalesced into it),
//! 4. returns once every controller has returned.
//!
//! A controller that returns `Ok(())` is done for good.  A failing controller
//! is logged and reported, never retried.

use std::collections::HashMap;
use std::sync::Arc;

use platsec_types::{PlatError, ResourceKey};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::controller::{Controller, ControllerContext, EventReason, Input, OutputKind, ReconcileEvent};
use crate::state::ResourceStore;

/// Outcome of a finished [`ControllerEngine::run`].
#[derive(Debug, Default)]
pub struct EngineReport {
    /// Controllers that returned `Ok(())`.
    pub completed: Vec<String>,
    /// Controllers that returned an error or panicked.
    pub failed: Vec<(String, PlatError)>,
}

impl EngineReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Route {
    inputs: Vec<Input>,
    events: mpsc::Sender<ReconcileEvent>,
}

/// Registry and scheduler for [`Controller`]s sharing one [`ResourceStore`].
#[derive(Default)]
pub struct ControllerEngine {
    store: ResourceStore,
    controllers: Vec<Arc<dyn Controller>>,
    /// resource type → (owning controller, declared kind)
    owners: HashMap<String, (String, OutputKind)>,
}

impl ControllerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an engine on top of an existing store.
    pub fn with_store(store: ResourceStore) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    /// Handle to the shared store, for readers.
    pub fn store(&self) -> ResourceStore {
        self.store.clone()
    }

    /// Register a controller.
    ///
    /// # Errors
    ///
    /// * [`PlatError::DuplicateController`] if the name is already taken.
    /// * [`PlatError::OutputConflict`] if one of its outputs is already
    ///   owned exclusively, or it claims exclusively a type already declared
    ///   by someone else.
    pub fn register(&mut self, controller: Arc<dyn Controller>) -> Result<(), PlatError> {
        let name = controller.name().to_string();
        if self.controllers.iter().any(|c| c.name() == name) {
            return Err(PlatError::DuplicateController(name));
        }

        let outputs = controller.outputs();
        for output in &outputs {
            if let Some((owner, kind)) = self.owners.get(&output.resource_type)
                && (*kind == OutputKind::Exclusive || output.kind == OutputKind::Exclusive)
            {
                return Err(PlatError::OutputConflict {
                    resource_type: output.resource_type.clone(),
                    owner: owner.clone(),
                });
            }
        }
        for output in outputs {
            self.owners
                .entry(output.resource_type)
                .or_insert_with(|| (name.clone(), output.kind));
        }

        info!(controller = %name, "controller registered");
        self.controllers.push(controller);
        Ok(())
    }

    /// Names of the registered controllers, in registration order.
    pub fn controller_names(&self) -> Vec<String> {
        self.controllers.iter().map(|c| c.name().to_string()).collect()
    }

    /// Run every registered controller until all of them have returned.
    ///
    /// Setting `shutdown` to `true` is forwarded to the controllers through
    /// [`ControllerContext::next_event`]; controllers that are past their wait
    /// point run to completion.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> EngineReport {
        let mut changes = self.store.subscribe();
        let mut routes = Vec::with_capacity(self.controllers.len());
        let mut tasks = JoinSet::new();

        for controller in self.controllers {
            let name = controller.name().to_string();
            let (tx, rx) = mpsc::channel(1);
            // Fresh one-slot queue: the initial event always fits.
            let _ = tx.try_send(ReconcileEvent::new(EventReason::Initial));
            routes.push(Route {
                inputs: controller.inputs(),
                events: tx,
            });

            let mut ctx = ControllerContext::new(
                name.clone(),
                controller.outputs(),
                self.store.clone(),
                rx,
                shutdown.clone(),
            );
            let span = info_span!("controller", name = %name);
            // Inner task so a panic surfaces as a JoinError we can attribute.
            let handle = tokio::spawn(async move { controller.run(&mut ctx).await }.instrument(span));
            tasks.spawn(async move { (name, handle.await) });
        }

        let mut report = EngineReport::default();
        let mut watching = true;
        loop {
            tokio::select! {
                joined = tasks.join_next() => {
                    let Some(joined) = joined else { break };
                    match joined {
                        Ok((name, Ok(Ok(())))) => {
                            info!(controller = %name, "controller finished");
                            report.completed.push(name);
                        }
                        Ok((name, Ok(Err(e)))) => {
                            error!(controller = %name, error = %e, "controller failed");
                            report.failed.push((name, e));
                        }
                        Ok((name, Err(join_error))) => {
                            error!(controller = %name, error = %join_error, "controller task aborted");
                            report.failed.push((
                                name.clone(),
                                PlatError::ControllerFailed {
                                    controller: name,
                                    details: join_error.to_string(),
                                },
                            ));
                        }
                        Err(join_error) => {
                            error!(error = %join_error, "controller supervisor task aborted");
                        }
                    }
                }
                change = changes.recv(), if watching => match change {
                    Ok(event) => dispatch(&routes, &event.resource.metadata.key()),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(lagged_by = n, "engine lagged behind resource changes");
                    }
                    Err(broadcast::error::RecvError::Closed) => watching = false,
                },
            }
        }

        report
    }
}

/// Wake every controller with an input matching `key`.
fn dispatch(routes: &[Route], key: &ResourceKey) {
    for route in routes.iter().filter(|r| r.inputs.iter().any(|i| i.matches(key))) {
        match route
            .events
            .try_send(ReconcileEvent::new(EventReason::InputChanged(key.clone())))
        {
            Ok(()) => debug!(resource = %key, "input change delivered"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(resource = %key, "input change coalesced into pending event");
            }
            // The controller has already returned.
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
