//! Inbound requests and their lifecycle.
//!
//! The wire layer turns bytes into a [`Request`], wraps it in a
//! [`RequestContext`] together with the callback that serializes the reply,
//! and calls [`RequestContext::start_processing`]. Accepted requests are
//! handed to the shard's [`Dispatcher`] as a [`RequestHandle`]; whoever ends
//! up holding the handle calls [`RequestContext::send_reply`] exactly once
//! (later calls are ignored).

mod context;
mod key;
mod precheck;
mod reply;

pub use context::{ReplyCallback, RequestContext, RequestHandle, RequestState};
pub use key::{KeyError, MAX_KEY_LEN, validate_key};
pub use precheck::{
    COMMAND_DISABLED, COMMAND_NOT_SUPPORTED, PrecheckPolicy, precheck,
};
pub use reply::{RESULT_NAME_PREFIX, Reply, ReplyResult};

use crate::stats::StatName;
use bytes::Bytes;

/// Kind of memcache command carried by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Get,
    Gets,
    Set,
    Add,
    Replace,
    Append,
    Prepend,
    Cas,
    Delete,
    Incr,
    Decr,
    Touch,
    Stats,
    Version,
    Shutdown,
    FlushRe,
    FlushAll,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Get => "get",
            RequestKind::Gets => "gets",
            RequestKind::Set => "set",
            RequestKind::Add => "add",
            RequestKind::Replace => "replace",
            RequestKind::Append => "append",
            RequestKind::Prepend => "prepend",
            RequestKind::Cas => "cas",
            RequestKind::Delete => "delete",
            RequestKind::Incr => "incr",
            RequestKind::Decr => "decr",
            RequestKind::Touch => "touch",
            RequestKind::Stats => "stats",
            RequestKind::Version => "version",
            RequestKind::Shutdown => "shutdown",
            RequestKind::FlushRe => "flush_regex",
            RequestKind::FlushAll => "flush_all",
        }
    }

    /// Rate and count counters bumped when a request of this kind arrives.
    pub(crate) fn command_stats(self) -> (StatName, StatName) {
        match self {
            RequestKind::Get | RequestKind::Gets => (StatName::CmdGet, StatName::CmdGetCount),
            RequestKind::Set
            | RequestKind::Add
            | RequestKind::Replace
            | RequestKind::Append
            | RequestKind::Prepend
            | RequestKind::Cas => (StatName::CmdSet, StatName::CmdSetCount),
            RequestKind::Delete => (StatName::CmdDelete, StatName::CmdDeleteCount),
            RequestKind::Incr | RequestKind::Decr => {
                (StatName::CmdArithmetic, StatName::CmdArithmeticCount)
            }
            RequestKind::Touch
            | RequestKind::Stats
            | RequestKind::Version
            | RequestKind::Shutdown
            | RequestKind::FlushRe
            | RequestKind::FlushAll => (StatName::CmdOther, StatName::CmdOtherCount),
        }
    }
}

/// How urgently a request should be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    Critical,
    /// Asynchronous traffic such as replicated deletes.
    Async,
}

/// A parsed request.
///
/// For `stats` the key holds the group argument; `flush_regex` carries the
/// pattern in the key.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    kind: RequestKind,
    key: Bytes,
    value: Bytes,
}

impl Request {
    pub fn new(kind: RequestKind, key: impl Into<Bytes>) -> Self {
        Self {
            kind,
            key: key.into(),
            value: Bytes::new(),
        }
    }

    pub fn get(key: impl Into<Bytes>) -> Self {
        Self::new(RequestKind::Get, key)
    }

    pub fn set(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self::new(RequestKind::Set, key).with_value(value)
    }

    pub fn delete(key: impl Into<Bytes>) -> Self {
        Self::new(RequestKind::Delete, key)
    }

    pub fn stats(group: impl Into<Bytes>) -> Self {
        Self::new(RequestKind::Stats, group)
    }

    pub fn with_value(mut self, value: impl Into<Bytes>) -> Self {
        self.value = value.into();
        self
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }
}

/// The routing layer, as seen from a request context.
///
/// `dispatch` takes ownership of a handle to the accepted request. The
/// implementation replies through the handle, possibly from a later
/// continuation after `dispatch` has returned.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, request: RequestHandle);
}
