//! The [`Controller`] contract and the per-controller [`ControllerContext`].
//!
//! A controller declares what it reads ([`Input`]) and what it writes
//! ([`Output`]) and is driven by [`ReconcileEvent`]s delivered through its
//! context.  Every write goes through [`ControllerContext::modify`], which
//! refuses resource types the controller did not declare as outputs.
//!
//! Returning `Ok(())` from [`Controller::run`] is final: the
//! [`ControllerEngine`][crate::engine::ControllerEngine] never invokes the
//! controller again.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use platsec_types::{PlatError, Resource, ResourceKey, ResourceSpec};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::state::ResourceStore;

// ─────────────────────────────────────────────────────────────────────────────
// Declarations
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Changes wake the controller; it tolerates the input disappearing.
    Weak,
    /// Changes wake the controller; the input is required.
    Strong,
}

/// A resource type a controller reads and wants to be woken up for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub namespace: String,
    pub resource_type: String,
    pub kind: InputKind,
}

impl Input {
    pub fn weak<T: ResourceSpec>(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            resource_type: T::TYPE.to_string(),
            kind: InputKind::Weak,
        }
    }

    pub fn strong<T: ResourceSpec>(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            resource_type: T::TYPE.to_string(),
            kind: InputKind::Strong,
        }
    }

    /// Whether a change to `key` concerns this input.
    pub fn matches(&self, key: &ResourceKey) -> bool {
        self.namespace == key.namespace && self.resource_type == key.resource_type
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// No other controller may write this resource type.
    Exclusive,
    /// Several controllers may write this resource type.
    Shared,
}

/// A resource type a controller writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub resource_type: String,
    pub kind: OutputKind,
}

impl Output {
    pub fn exclusive<T: ResourceSpec>() -> Self {
        Self {
            resource_type: T::TYPE.to_string(),
            kind: OutputKind::Exclusive,
        }
    }

    pub fn shared<T: ResourceSpec>() -> Self {
        Self {
            resource_type: T::TYPE.to_string(),
            kind: OutputKind::Shared,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Why a controller is being woken up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventReason {
    /// The engine is running and ready to accept writes.
    Initial,
    /// A resource matching one of the controller's inputs was committed.
    InputChanged(ResourceKey),
}

/// A scheduling signal delivered to a controller.
#[derive(Debug, Clone)]
pub struct ReconcileEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub reason: EventReason,
}

impl ReconcileEvent {
    pub fn new(reason: EventReason) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            reason,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Controller trait
// ─────────────────────────────────────────────────────────────────────────────

/// Every reconciler hosted by the engine implements this trait.
///
/// # Contract
///
/// * `inputs` / `outputs` are read once at registration.
/// * `run` is called exactly once.  A controller that wants to react to
///   input changes loops on [`ControllerContext::next_event`]; a one-shot
///   controller waits for a single event and returns.
#[async_trait]
pub trait Controller: Send + Sync {
    /// Unique name, e.g. `"runtime.SecurityStateController"`.
    fn name(&self) -> &str;

    fn inputs(&self) -> Vec<Input>;

    fn outputs(&self) -> Vec<Output>;

    async fn run(&self, ctx: &mut ControllerContext) -> Result<(), PlatError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Context
// ─────────────────────────────────────────────────────────────────────────────

/// The runtime handle a controller sees while running.
pub struct ControllerContext {
    name: String,
    outputs: Vec<Output>,
    store: ResourceStore,
    events: mpsc::Receiver<ReconcileEvent>,
    shutdown: watch::Receiver<bool>,
}

impl ControllerContext {
    /// Build a context.  The engine does this for every registered
    /// controller; tests can build one directly to drive a controller by hand.
    pub fn new(
        name: impl Into<String>,
        outputs: Vec<Output>,
        store: ResourceStore,
        events: mpsc::Receiver<ReconcileEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            name: name.into(),
            outputs,
            store,
            events,
            shutdown,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the next scheduling event.
    ///
    /// Returns `None` when shutdown has been requested or the engine has
    /// dropped the event channel.  Shutdown wins when both are ready.
    pub async fn next_event(&mut self) -> Option<ReconcileEvent> {
        let shutdown = &mut self.shutdown;
        let events = &mut self.events;
        tokio::select! {
            biased;
            _ = wait_for_shutdown(shutdown) => None,
            event = events.recv() => event,
        }
    }

    /// Resolves once shutdown has been requested.  Never resolves if the
    /// engine dropped its shutdown sender without requesting one.
    pub async fn cancelled(&mut self) {
        wait_for_shutdown(&mut self.shutdown).await
    }

    /// Whether shutdown has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Read access to the shared store.
    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    /// Modify-or-create a resource this controller owns.
    ///
    /// # Errors
    ///
    /// Returns [`PlatError::NotOwner`] when `T::TYPE` is not among the
    /// controller's declared outputs; otherwise whatever
    /// [`ResourceStore::modify`] returns.
    pub fn modify<T, F>(&self, namespace: &str, id: &str, mutate: F) -> Result<Resource, PlatError>
    where
        T: ResourceSpec,
        F: FnOnce(&mut T) -> Result<(), PlatError>,
    {
        if !self.outputs.iter().any(|o| o.resource_type == T::TYPE) {
            return Err(PlatError::NotOwner {
                controller: self.name.clone(),
                resource_type: T::TYPE.to_string(),
            });
        }
        self.store.modify::<T, F>(&self.name, namespace, id, mutate)
    }
}

/// Resolves once shutdown is requested.  If the sending side is gone nobody
/// can request shutdown any more, so this never resolves.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let sender_gone = shutdown.wait_for(|stop| *stop).await.is_err();
    if sender_gone {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platsec_types::{NAMESPACE_RUNTIME, SECURITY_STATE_ID, SecurityStateSpec};
    use std::time::Duration;

    fn context(outputs: Vec<Output>) -> (ControllerContext, mpsc::Sender<ReconcileEvent>, watch::Sender<bool>) {
        let (tx, rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = watch::channel(false);
        let ctx = ControllerContext::new("test", outputs, ResourceStore::default(), rx, stop_rx);
        (ctx, tx, stop_tx)
    }

    #[tokio::test]
    async fn next_event_yields_delivered_event() {
        let (mut ctx, tx, _stop) = context(vec![]);
        tx.send(ReconcileEvent::new(EventReason::Initial)).await.unwrap();

        let event = ctx.next_event().await.expect("event must be delivered");
        assert_eq!(event.reason, EventReason::Initial);
    }

    #[tokio::test]
    async fn shutdown_wins_over_pending_event() {
        let (mut ctx, tx, stop) = context(vec![]);
        tx.send(ReconcileEvent::new(EventReason::Initial)).await.unwrap();
        stop.send(true).unwrap();

        assert!(ctx.is_cancelled());
        assert!(ctx.next_event().await.is_none());
    }

    #[tokio::test]
    async fn closed_event_channel_yields_none() {
        let (mut ctx, tx, _stop) = context(vec![]);
        drop(tx);
        assert!(ctx.next_event().await.is_none());
    }

    #[tokio::test]
    async fn cancelled_resolves_on_shutdown() {
        let (mut ctx, _tx, stop) = context(vec![]);
        assert!(!ctx.is_cancelled());

        let pending = tokio::time::timeout(Duration::from_millis(50), ctx.cancelled()).await;
        assert!(pending.is_err(), "cancelled must wait for shutdown");

        stop.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), ctx.cancelled())
            .await
            .expect("cancelled must resolve after shutdown");
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn dropped_shutdown_sender_does_not_cancel() {
        let (mut ctx, _tx, stop) = context(vec![]);
        drop(stop);

        let result = tokio::time::timeout(Duration::from_millis(50), ctx.next_event()).await;
        assert!(result.is_err(), "next_event must keep waiting for an event");
    }

    #[test]
    fn modify_rejects_undeclared_output() {
        let (ctx, _tx, _stop) = context(vec![]);
        let result = ctx.modify::<SecurityStateSpec, _>(NAMESPACE_RUNTIME, SECURITY_STATE_ID, |_| Ok(()));
        assert!(matches!(result, Err(PlatError::NotOwner { .. })));
        assert!(ctx.store().is_empty());
    }

    #[test]
    fn modify_records_controller_as_owner() {
        let (ctx, _tx, _stop) = context(vec![Output::exclusive::<SecurityStateSpec>()]);
        let committed = ctx
            .modify::<SecurityStateSpec, _>(NAMESPACE_RUNTIME, SECURITY_STATE_ID, |s| {
                s.secure_boot = true;
                Ok(())
            })
            .unwrap();
        assert_eq!(committed.metadata.owner, "test");
    }

    #[test]
    fn input_matches_namespace_and_type() {
        let input = Input::weak::<SecurityStateSpec>(NAMESPACE_RUNTIME);
        assert!(input.matches(&ResourceKey::of::<SecurityStateSpec>(NAMESPACE_RUNTIME, "x")));
        assert!(!input.matches(&ResourceKey::of::<SecurityStateSpec>("config", "x")));
    }
}
