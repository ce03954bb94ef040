//! Declarative lifecycle controller for remotely managed virtual networks.
//!
//! Reconciles a desired-state description of a network and its DHCP-agent
//! scheduling against the state held by a remote control plane: submit
//! create, poll until built, apply minimal-diff updates, reconcile the
//! agent association out-of-band, delete idempotently. The transport and
//! the policy engine are consumed through traits; see `client` and
//! `policy`.

pub mod client;
pub mod controller;
pub mod error;
pub mod policy;
pub mod projector;
pub mod reconciler;
pub mod scheduler;
pub mod schema;
pub mod test_util;

pub use client::{ControlPlane, Payload, Snapshot};
pub use controller::{is_built, NetworkController, Phase};
pub use error::{
    classify_remote_error, ControllerError, Disposition, RemoteCallError, RemoteOp,
};
pub use policy::{AllowAll, DenyRole, Forbidden, PolicyEnforcer, RequestContext};
pub use reconciler::{AgentReconciler, ReconcileReport};
pub use schema::ResourceDescriptor;
