//! Client-side coordination core for the Varys desktop app.
//!
//! Two subsystems consumed by the view layer, owning no rendering of their
//! own: [`TaskRunner`] drives the lifecycle of at most one long-running
//! pipeline task while folding live backend events into UI-facing state, and
//! [`DiagnosticsController`] reconciles startup dependency health into a
//! single readiness verdict and drives the remediation workflow. Everything
//! external (the pipeline backend, the event transport, dialogs, clipboard,
//! config persistence) sits behind the ports in [`ports`].

pub mod bus;
pub mod diagnostics;
pub mod model;
pub mod ports;
pub mod preflight;
pub mod runner;

pub use bus::{EventBus, TaskEvent};
pub use diagnostics::DiagnosticsController;
pub use model::{
    mask_secret, DiagnosticItem, ItemKind, ItemStatus, StartupDiagnostics, TaskSnapshot, TaskStatus,
};
pub use ports::{DiagnosticsBackend, RemediationBackend, TaskBackend};
pub use preflight::{submit_with_preflight, PreflightOutcome};
pub use runner::TaskRunner;
