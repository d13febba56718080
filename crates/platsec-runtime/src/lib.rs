//! `platsec-runtime` – the resource graph.
//!
//! A small in-process runtime that stores resources and schedules the
//! controllers that produce them.
//!
//! # Modules
//!
//! - [`state`] – [`ResourceStore`][state::ResourceStore]: versioned resource
//!   map with an atomic modify-or-create primitive and a change feed.
//! - [`controller`] – the [`Controller`][controller::Controller] trait, its
//!   input/output declarations, and the
//!   [`ControllerContext`][controller::ControllerContext] a running controller
//!   talks to.
//! - [`engine`] – [`ControllerEngine`][engine::ControllerEngine]: enforces
//!   exclusive output ownership, delivers scheduling events, and collects the
//!   outcome of every controller.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console/JSON
//!   logging with optional OTLP span export.

pub mod controller;
pub mod engine;
pub mod state;
pub mod telemetry;

pub use controller::{
    Controller, ControllerContext, EventReason, Input, InputKind, Output, OutputKind,
    ReconcileEvent,
};
pub use engine::{ControllerEngine, EngineReport};
pub use state::{ResourceEvent, ResourceEventKind, ResourceStore};
pub use telemetry::{TracerProviderGuard, init_tracing};
