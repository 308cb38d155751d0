//! Single-threaded cooperative event loop
//!
//! The [`Reactor`] owns a set of pollable endpoints and periodic
//! timers. [`Reactor::run`] waits for the next readiness event or
//! deadline, then dispatches the matching handlers one at a time, each
//! run to completion before the next poll. Handlers therefore never
//! observe each other mid-flight and shared state needs no locking
//! inside a daemon, at the cost that one slow handler delays the rest
//! of the cycle.
//!
//! Handlers get a [`LoopCx`] carrying the fired token and a
//! [`LoopControl`] handle. Stops and removals requested through the
//! control are deferred to the next poll boundary; callbacks already
//! dispatched in the current cycle still complete.

use crate::endpoint::Endpoint;
use crate::error::{FabricError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Identifies one registered source or timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(u64);

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What woke the handler up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The endpoint has queued payloads.
    Readable,
    /// A periodic deadline elapsed.
    Timer,
}

/// Per-dispatch context handed to handlers.
pub struct LoopCx {
    token: Token,
    kind: EventKind,
    control: LoopControl,
}

impl LoopCx {
    /// Token of the source or timer that fired.
    pub fn token(&self) -> Token {
        self.token
    }

    /// Whether this dispatch is for readiness or a timer.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Request a stop at the next poll boundary.
    pub fn stop(&self) {
        self.control.stop();
    }

    /// Request removal of a source or timer at the next poll boundary.
    pub fn remove(&self, token: Token) {
        self.control.remove(token);
    }

    /// Clone the control handle for use outside the handler.
    pub fn control(&self) -> LoopControl {
        self.control.clone()
    }
}

/// Callback attached to a source or timer.
///
/// Closures of type `FnMut(&mut LoopCx)` implement this automatically;
/// implement the trait directly when the handler needs to await or to
/// fail the loop.
#[async_trait]
pub trait EventHandler: Send {
    /// Handle one dispatch. An error aborts [`Reactor::run`]; daemons
    /// treat that as fatal and exit for their supervisor to restart.
    async fn handle(&mut self, cx: &mut LoopCx) -> Result<()>;
}

#[async_trait]
impl<F> EventHandler for F
where
    F: FnMut(&mut LoopCx) + Send,
{
    async fn handle(&mut self, cx: &mut LoopCx) -> Result<()> {
        (self)(cx);
        Ok(())
    }
}

struct ControlInner {
    stopped: AtomicBool,
    notify: Notify,
    removals: Mutex<Vec<Token>>,
}

/// Cloneable handle for stopping the loop and removing registrations
/// from handlers or other tasks.
#[derive(Clone)]
pub struct LoopControl {
    inner: Arc<ControlInner>,
}

impl LoopControl {
    fn new() -> Self {
        Self {
            inner: Arc::new(ControlInner {
                stopped: AtomicBool::new(false),
                notify: Notify::new(),
                removals: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Stop the loop at the current or next poll boundary. Idempotent.
    pub fn stop(&self) {
        if !self.inner.stopped.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    /// True once a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Queue a source or timer for removal at the next poll boundary.
    /// Unknown tokens are ignored when the removal is applied.
    pub fn remove(&self, token: Token) {
        self.inner.removals.lock().push(token);
        self.inner.notify.notify_waiters();
    }

    fn take_removals(&self) -> Vec<Token> {
        std::mem::take(&mut *self.inner.removals.lock())
    }

    fn has_removals(&self) -> bool {
        !self.inner.removals.lock().is_empty()
    }

    /// Resolves when the loop should wake for a stop or pending removal.
    async fn poked(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_stopped() || self.has_removals() {
                return;
            }
            notified.await;
        }
    }
}

struct SourceEntry {
    endpoint: Arc<Endpoint>,
    handler: Box<dyn EventHandler>,
}

struct TimerEntry {
    period: Duration,
    deadline: Instant,
    handler: Box<dyn EventHandler>,
}

enum Wake {
    Poked,
    Source(Token),
    Timer,
}

/// The cooperative event loop.
pub struct Reactor {
    sources: HashMap<Token, SourceEntry>,
    timers: HashMap<Token, TimerEntry>,
    control: LoopControl,
    next_token: u64,
}

impl Reactor {
    /// Create an empty loop.
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
            timers: HashMap::new(),
            control: LoopControl::new(),
            next_token: 1,
        }
    }

    /// Handle for stopping the loop from outside `run`.
    pub fn control(&self) -> LoopControl {
        self.control.clone()
    }

    /// Number of registered endpoint sources.
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Number of registered timers.
    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    fn alloc(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    /// Register an endpoint for readiness dispatch.
    ///
    /// The endpoint must have a receiving role; publish endpoints are
    /// rejected. An endpoint belongs to at most one loop at a time.
    pub fn add_endpoint(
        &mut self,
        endpoint: Arc<Endpoint>,
        handler: impl EventHandler + 'static,
    ) -> Result<Token> {
        if !endpoint.role().pollable() {
            return Err(FabricError::InvalidOperation {
                role: endpoint.role(),
                op: "poll",
            });
        }
        endpoint.mark_registered()?;
        let token = self.alloc();
        debug!(%token, address = endpoint.address(), role = %endpoint.role(), "Source registered");
        self.sources.insert(
            token,
            SourceEntry {
                endpoint,
                handler: Box::new(handler),
            },
        );
        Ok(token)
    }

    /// Register a periodic timer. The first fire is one period from
    /// now. Missed ticks coalesce into a single dispatch.
    pub fn add_timer(
        &mut self,
        period: Duration,
        handler: impl EventHandler + 'static,
    ) -> Result<Token> {
        if period.is_zero() {
            return Err(FabricError::Config(
                "timer period must be non-zero".to_string(),
            ));
        }
        let token = self.alloc();
        debug!(%token, period_ms = period.as_millis() as u64, "Timer registered");
        self.timers.insert(
            token,
            TimerEntry {
                period,
                deadline: Instant::now() + period,
                handler: Box::new(handler),
            },
        );
        Ok(token)
    }

    /// Remove a source or timer immediately. Removing a source releases
    /// the endpoint for registration elsewhere.
    pub fn remove(&mut self, token: Token) -> Result<()> {
        if let Some(entry) = self.sources.remove(&token) {
            entry.endpoint.clear_registered();
            debug!(%token, "Source removed");
            Ok(())
        } else if self.timers.remove(&token).is_some() {
            debug!(%token, "Timer removed");
            Ok(())
        } else {
            Err(FabricError::UnknownToken(token))
        }
    }

    /// Remove every source and timer, releasing all endpoints.
    pub fn detach_all(&mut self) {
        for (_, entry) in self.sources.drain() {
            entry.endpoint.clear_registered();
        }
        self.timers.clear();
    }

    /// Tear the loop down. Fails while endpoint sources are still
    /// registered; remove them first so ownership stays explicit.
    pub fn close(&mut self) -> Result<()> {
        let count = self.sources.len();
        if count > 0 {
            return Err(FabricError::SourcesRegistered { count });
        }
        self.timers.clear();
        Ok(())
    }

    /// Run until stopped or a handler fails.
    ///
    /// Each poll cycle dispatches every source that is ready at the
    /// start of the cycle exactly once, then every timer whose deadline
    /// has passed in deadline order. Handlers run serially and to
    /// completion.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            sources = self.sources.len(),
            timers = self.timers.len(),
            "Event loop running"
        );
        loop {
            self.apply_removals();
            if self.control.is_stopped() {
                break;
            }

            match self.next_wake().await {
                Wake::Poked => continue,
                Wake::Source(first) => self.dispatch_ready(first).await?,
                Wake::Timer => self.dispatch_due().await?,
            }
        }
        self.apply_removals();
        info!("Event loop stopped");
        Ok(())
    }

    /// Sleep until a stop, a readiness event, or the earliest deadline.
    async fn next_wake(&mut self) -> Wake {
        let control = self.control.clone();
        let watches: Vec<(Token, Arc<Endpoint>)> = self
            .sources
            .iter()
            .map(|(token, entry)| (*token, Arc::clone(&entry.endpoint)))
            .collect();
        let next_deadline = self.timers.values().map(|t| t.deadline).min();

        let source_wait = async move {
            if watches.is_empty() {
                futures::future::pending::<Token>().await
            } else {
                let futs: Vec<Pin<Box<dyn Future<Output = Token> + Send>>> = watches
                    .into_iter()
                    .map(|(token, endpoint)| {
                        Box::pin(async move {
                            endpoint.recv_ready().await;
                            token
                        }) as Pin<Box<dyn Future<Output = Token> + Send>>
                    })
                    .collect();
                let (token, _, _) = futures::future::select_all(futs).await;
                token
            }
        };
        let timer_wait = async move {
            match next_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => futures::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = control.poked() => Wake::Poked,
            token = source_wait => Wake::Source(token),
            _ = timer_wait => Wake::Timer,
        }
    }

    /// Dispatch every source with queued payloads, starting from the
    /// one that woke us.
    async fn dispatch_ready(&mut self, first: Token) -> Result<()> {
        let mut batch = vec![first];
        for (token, entry) in &self.sources {
            if *token != first && entry.endpoint.has_pending() {
                batch.push(*token);
            }
        }
        for token in batch {
            let Some(entry) = self.sources.get_mut(&token) else {
                continue;
            };
            let mut cx = LoopCx {
                token,
                kind: EventKind::Readable,
                control: self.control.clone(),
            };
            entry.handler.handle(&mut cx).await?;
        }
        Ok(())
    }

    /// Dispatch every timer whose deadline has passed, earliest first.
    async fn dispatch_due(&mut self) -> Result<()> {
        let now = Instant::now();
        let mut due: Vec<(Token, Instant)> = self
            .timers
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(token, entry)| (*token, entry.deadline))
            .collect();
        due.sort_by_key(|&(_, deadline)| deadline);

        for (token, _) in due {
            let Some(entry) = self.timers.get_mut(&token) else {
                continue;
            };
            while entry.deadline <= now {
                entry.deadline += entry.period;
            }
            let mut cx = LoopCx {
                token,
                kind: EventKind::Timer,
                control: self.control.clone(),
            };
            entry.handler.handle(&mut cx).await?;
        }
        Ok(())
    }

    fn apply_removals(&mut self) {
        for token in self.control.take_removals() {
            if let Some(entry) = self.sources.remove(&token) {
                entry.endpoint.clear_registered();
                debug!(%token, "Source removed");
            } else if self.timers.remove(&token).is_some() {
                debug!(%token, "Timer removed");
            }
        }
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        if !self.sources.is_empty() {
            warn!(
                sources = self.sources.len(),
                "Event loop dropped with endpoints still registered"
            );
        }
        self.detach_all();
    }
}

// ==========================================================================
// Tests
// ==========================================================================
