//! Per-request state machine.
//!
//! A context moves `Created -> Validated -> Dispatched -> Replied` and is
//! then destroyed; requests refused by precheck or by a shutting-down shard
//! go `Created -> Rejected` instead. At most one reply is ever delivered.
//! Destruction always runs on the main context, never on the stack of the
//! completion that released the last handle.

use super::{Priority, Reply, ReplyResult, Request, RequestKind, precheck};
use crate::metrics::{REQUEST_CONTEXTS, REQUESTS_DURING_SHUTDOWN, REQUESTS_REJECTED};
use crate::shard::{RouteConfig, Shard};
use crate::stats::StatName;
use parking_lot::Mutex;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use tracing::{error, trace, warn};

/// Delivers a reply to the client. Called at most once.
pub type ReplyCallback = Box<dyn FnOnce(Reply) + Send + 'static>;

/// Lifecycle state of a request context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestState {
    Created = 0,
    Validated = 1,
    Dispatched = 2,
    Replied = 3,
    Rejected = 4,
    Destroyed = 5,
}

impl RequestState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => RequestState::Created,
            1 => RequestState::Validated,
            2 => RequestState::Dispatched,
            3 => RequestState::Replied,
            4 => RequestState::Rejected,
            _ => RequestState::Destroyed,
        }
    }
}

/// State shared between the wire layer, the routing layer and the stats
/// side effects of one request.
pub struct RequestContext {
    shard: Arc<Shard>,
    kind: RequestKind,
    /// Released once the reply is sent.
    request: Mutex<Option<Request>>,
    callback: Mutex<Option<ReplyCallback>>,
    replied: AtomicBool,
    recording: bool,
    priority: Priority,
    /// Set when the request is dispatched.
    config: Option<Arc<RouteConfig>>,
    state: AtomicU8,
}

impl RequestContext {
    /// Create a context for a live request. `callback` receives the reply.
    pub fn new<F>(shard: Arc<Shard>, request: Request, priority: Priority, callback: F) -> Box<Self>
    where
        F: FnOnce(Reply) + Send + 'static,
    {
        shard.stats().incr(StatName::ProxyReqsProcessing, 1);
        Self::build(shard, request, priority, Some(Box::new(callback)), false)
    }

    /// Create a context for shadow traffic. Replies are swallowed and no
    /// outcome counters move.
    pub fn recording(shard: Arc<Shard>, request: Request) -> Box<Self> {
        Self::build(shard, request, Priority::Async, None, true)
    }

    fn build(
        shard: Arc<Shard>,
        request: Request,
        priority: Priority,
        callback: Option<ReplyCallback>,
        recording: bool,
    ) -> Box<Self> {
        REQUEST_CONTEXTS.increment();
        Box::new(Self {
            shard,
            kind: request.kind(),
            request: Mutex::new(Some(request)),
            callback: Mutex::new(callback),
            replied: AtomicBool::new(false),
            recording,
            priority,
            config: None,
            state: AtomicU8::new(RequestState::Created as u8),
        })
    }

    /// Run precheck and, if admitted, hand the request to the routing layer.
    ///
    /// The context is consumed; the routing layer receives a
    /// [`RequestHandle`] and the context is destroyed on the main context
    /// once the last handle is gone.
    pub fn start_processing(mut self: Box<Self>) {
        if !self.recording {
            let (rate, count) = self.kind.command_stats();
            let stats = self.shard.stats();
            stats.incr(rate, 1);
            stats.incr(count, 1);
            stats.incr(StatName::RequestSent, 1);
            stats.incr(StatName::RequestSentCount, 1);
        }

        let admitted = match self.request.lock().as_ref() {
            Some(request) => precheck(request, self.shard.options()),
            None => Err(Reply::new(ReplyResult::LocalError)),
        };
        if let Err(reply) = admitted {
            REQUESTS_REJECTED.increment();
            self.set_state(RequestState::Rejected);
            let handle = RequestHandle::new(self);
            handle.send_reply(reply);
            return;
        }
        self.set_state(RequestState::Validated);

        if self.shard.is_shutting_down() {
            error!(
                shard = self.shard.id(),
                kind = self.kind.as_str(),
                "Request received while shard is shutting down"
            );
            REQUESTS_DURING_SHUTDOWN.increment();
            self.set_state(RequestState::Rejected);
            let handle = RequestHandle::new(self);
            handle.send_reply(Reply::new(ReplyResult::Unknown));
            return;
        }

        self.config = Some(self.shard.config());
        self.set_state(RequestState::Dispatched);
        let dispatcher = self.shard.dispatcher().clone();
        dispatcher.dispatch(RequestHandle::new(self));
    }

    /// Deliver `reply` to the client.
    ///
    /// Only the first call on a live context has any effect. Recording
    /// contexts ignore every call.
    pub fn send_reply(&self, reply: impl Into<Reply>) {
        if self.recording {
            return;
        }
        if self.replied.swap(true, Ordering::AcqRel) {
            trace!(kind = self.kind.as_str(), "Ignoring duplicate reply");
            return;
        }

        let reply = reply.into();
        let is_error = reply.is_error();

        if let Some(callback) = self.callback.lock().take() {
            callback(reply);
        }
        drop(self.request.lock().take());

        let stats = self.shard.stats();
        stats.incr(StatName::RequestReplied, 1);
        stats.incr(StatName::RequestRepliedCount, 1);
        if is_error {
            stats.incr(StatName::RequestError, 1);
            stats.incr(StatName::RequestErrorCount, 1);
        } else {
            stats.incr(StatName::RequestSuccess, 1);
            stats.incr(StatName::RequestSuccessCount, 1);
        }

        let _ = self.state.compare_exchange(
            RequestState::Dispatched as u8,
            RequestState::Replied as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn has_replied(&self) -> bool {
        self.replied.load(Ordering::Acquire)
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// The request payload, until the reply has been sent.
    pub fn request(&self) -> Option<Request> {
        self.request.lock().clone()
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Routing configuration captured at dispatch.
    pub fn config(&self) -> Option<&Arc<RouteConfig>> {
        self.config.as_ref()
    }

    pub fn shard(&self) -> &Arc<Shard> {
        &self.shard
    }

    pub fn state(&self) -> RequestState {
        RequestState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: RequestState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        let state = self.state();
        if !self.recording {
            if !self.has_replied() {
                warn!(
                    kind = self.kind.as_str(),
                    ?state,
                    "Request context destroyed without a reply"
                );
            }
            self.shard.stats().decr(StatName::ProxyReqsProcessing, 1);
        }
        self.set_state(RequestState::Destroyed);
        REQUEST_CONTEXTS.decrement();
    }
}

/// Shared handle to a request in flight.
///
/// Clones refer to the same context. When the last clone is dropped the
/// context is posted to the main context and destroyed there.
#[derive(Clone)]
pub struct RequestHandle {
    inner: Arc<DeferredDrop>,
}

impl RequestHandle {
    fn new(ctx: Box<RequestContext>) -> Self {
        Self {
            inner: Arc::new(DeferredDrop { ctx: Some(ctx) }),
        }
    }
}

impl Deref for RequestHandle {
    type Target = RequestContext;

    fn deref(&self) -> &RequestContext {
        self.inner
            .ctx
            .as_deref()
            .expect("request context released while a handle is live")
    }
}

/// Owns the context until the last handle is gone. `ctx` is only `None`
/// while the wrapper itself is being dropped.
struct DeferredDrop {
    ctx: Option<Box<RequestContext>>,
}

impl Drop for DeferredDrop {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            let main = ctx.shard.main_context().clone();
            main.post(move || drop(ctx));
        }
    }
}
