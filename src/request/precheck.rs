//! Per-kind admission checks run before a request is dispatched.

use super::{Reply, ReplyResult, Request, RequestKind, validate_key};
use crate::router::RouterOptions;

/// Reply message for commands the router never forwards.
pub const COMMAND_NOT_SUPPORTED: &str = "Command not supported";

/// Reply message for commands turned off by configuration.
pub const COMMAND_DISABLED: &str = "Command disabled";

/// What a request must satisfy before it can be dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecheckPolicy {
    /// The key must be well formed.
    ValidateKey,
    /// Always admitted.
    Pass,
    /// Answered as an unrecognized command. Older servers never implemented
    /// `shutdown`, and clients probe for it.
    Unrecognized,
    /// Refused with [`COMMAND_NOT_SUPPORTED`].
    NotSupported,
    /// Refused with [`COMMAND_DISABLED`] unless flush commands are enabled.
    FlushGate,
}

impl PrecheckPolicy {
    pub fn for_kind(kind: RequestKind) -> Self {
        match kind {
            RequestKind::Get
            | RequestKind::Gets
            | RequestKind::Set
            | RequestKind::Add
            | RequestKind::Replace
            | RequestKind::Append
            | RequestKind::Prepend
            | RequestKind::Cas
            | RequestKind::Delete
            | RequestKind::Incr
            | RequestKind::Decr
            | RequestKind::Touch => PrecheckPolicy::ValidateKey,
            RequestKind::Stats | RequestKind::Version => PrecheckPolicy::Pass,
            RequestKind::Shutdown => PrecheckPolicy::Unrecognized,
            RequestKind::FlushRe => PrecheckPolicy::NotSupported,
            RequestKind::FlushAll => PrecheckPolicy::FlushGate,
        }
    }
}

/// Admit `request`, or return the reply it must be rejected with.
pub fn precheck(request: &Request, options: &RouterOptions) -> Result<(), Reply> {
    match PrecheckPolicy::for_kind(request.kind()) {
        PrecheckPolicy::ValidateKey => validate_key(request.key())
            .map_err(|e| Reply::with_message(ReplyResult::LocalError, e.to_string())),
        PrecheckPolicy::Pass => Ok(()),
        PrecheckPolicy::Unrecognized => Err(Reply::new(ReplyResult::BadCommand)),
        PrecheckPolicy::NotSupported => Err(Reply::with_message(
            ReplyResult::LocalError,
            COMMAND_NOT_SUPPORTED,
        )),
        PrecheckPolicy::FlushGate if options.enable_flush_cmd => Ok(()),
        PrecheckPolicy::FlushGate => Err(Reply::with_message(
            ReplyResult::LocalError,
            COMMAND_DISABLED,
        )),
    }
}
