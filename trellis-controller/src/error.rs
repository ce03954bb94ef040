//! Error types and remote status classification.
//!
//! Every remote failure the controller sees flows through
//! [`classify_remote_error`]. Call sites never switch on status codes
//! themselves, so the ignore/propagate policy stays in one place.

use thiserror::Error;

use crate::policy::Forbidden;

/// Typed error raised by the remote control plane client.
///
/// Carries the remote status code verbatim for classification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("remote call failed with status {status}: {message}")]
pub struct RemoteCallError {
    pub status: u16,
    pub message: String,
}

impl RemoteCallError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 404: the resource or association does not exist.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    /// 409: the association already exists, or is already gone.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(409, message)
    }
}

/// Remote operation kinds, used to key error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    Create,
    Show,
    Update,
    Delete,
    ListAgents,
    AddAgent,
    RemoveAgent,
}

/// What to do with a remote error at a given call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Treat as success: the remote side is already in the requested state.
    Ignore,
    /// Propagate to the caller with the original status attached.
    Fatal,
}

/// Single decision point for ignore-vs-propagate on remote errors.
///
/// - delete: 404 means the network is already gone
/// - add agent: 409 means the network is already scheduled on the agent
/// - remove agent: 404 means the network or agent is gone, 409 means the
///   network is not scheduled on the agent
///
/// Any other combination is fatal. Unknown codes are never swallowed.
pub fn classify_remote_error(op: RemoteOp, err: &RemoteCallError) -> Disposition {
    match (op, err.status) {
        (RemoteOp::Delete, 404) => Disposition::Ignore,
        (RemoteOp::AddAgent, 409) => Disposition::Ignore,
        (RemoteOp::RemoveAgent, 404 | 409) => Disposition::Ignore,
        _ => Disposition::Fatal,
    }
}

/// Errors surfaced by controller operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The remote control plane rejected a create/update/delete submission.
    #[error("submission rejected: {0}")]
    Submission(RemoteCallError),

    /// Unclassified remote failure from a show/list/associate call.
    #[error("remote call failed: {0}")]
    Remote(RemoteCallError),

    /// Polling deadline expired before the resource became ready.
    #[error("timed out waiting for {resource} to become ready")]
    Timeout { resource: String },

    /// Denied by the configured policy enforcer.
    #[error(transparent)]
    Forbidden(#[from] Forbidden),

    /// The operation requires a created resource, but no handle is set.
    #[error("no remote resource handle set")]
    NoHandle,
}

impl ControllerError {
    /// Remote status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ControllerError::Submission(e) | ControllerError::Remote(e) => Some(e.status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ControllerError>;
