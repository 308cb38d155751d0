//! Messaging endpoints over TCP and Unix-domain transports
//!
//! An [`Endpoint`] is one side of a scalability-pattern socket: publish,
//! subscribe, request, or reply. Addresses pick the transport and
//! whether the endpoint binds or connects:
//!
//! ```text
//! @tcp://0.0.0.0:43010        bind a TCP listener
//! >tcp://127.0.0.1:43010      connect to a TCP listener
//! @ipc:///var/run/loran/ext   bind a Unix socket, unlinked on close
//! >ipc:///var/run/loran/ext   connect to a Unix socket
//! ```
//!
//! Every peer connection is pumped by a background task; the endpoint
//! itself stays synchronous. `send` enqueues without blocking,
//! `try_receive` pops whatever a pump already queued, and `recv_ready`
//! is the async readiness hook the event loop polls on. Connect-mode
//! endpoints retry forever with backoff, so daemons can start in any
//! order.

use crate::error::{FabricError, Result};
use crate::metrics::Metrics;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use loran_core::{Frame, FrameSink, PluginError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, info, warn};

/// First retry delay for connect-mode endpoints.
const CONNECT_RETRY_MIN: Duration = Duration::from_millis(50);

/// Retry delay ceiling for connect-mode endpoints.
const CONNECT_RETRY_MAX: Duration = Duration::from_secs(1);

/// Pause after a failed accept before listening again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Scalability-pattern role of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Fan frames out to every connected subscriber.
    Pub,
    /// Receive frames from a publisher.
    Sub,
    /// Send a request, then receive exactly one reply.
    Req,
    /// Receive a request, then send exactly one reply.
    Rep,
}

impl Role {
    /// True when the role may send.
    pub fn can_send(self) -> bool {
        matches!(self, Role::Pub | Role::Req | Role::Rep)
    }

    /// True when the role may receive.
    pub fn can_receive(self) -> bool {
        matches!(self, Role::Sub | Role::Req | Role::Rep)
    }

    /// True when the endpoint can be registered with an event loop.
    /// Publish endpoints never produce inbound frames, so polling one
    /// is a programming error.
    pub fn pollable(self) -> bool {
        self.can_receive()
    }

    /// Lowercase role name.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Pub => "pub",
            Role::Sub => "sub",
            Role::Req => "req",
            Role::Rep => "rep",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = FabricError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pub" => Ok(Role::Pub),
            "sub" => Ok(Role::Sub),
            "req" => Ok(Role::Req),
            "rep" => Ok(Role::Rep),
            other => Err(FabricError::InvalidRole(other.to_string())),
        }
    }
}

/// Whether an address binds a listener or connects out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `@` prefix: listen for peers.
    Bind,
    /// `>` prefix: dial a listener, retrying until it appears.
    Connect,
}

/// Transport half of an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `tcp://host:port`
    Tcp(String, u16),
    /// `ipc://path` (Unix-domain socket)
    Ipc(PathBuf),
}

/// A parsed endpoint address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Bind or connect.
    pub mode: Mode,
    /// Transport and location.
    pub target: Target,
}

fn invalid(addr: &str, reason: &'static str) -> FabricError {
    FabricError::InvalidAddress {
        addr: addr.to_string(),
        reason,
    }
}

impl FromStr for Address {
    type Err = FabricError;

    fn from_str(s: &str) -> Result<Self> {
        let (mode, rest) = if let Some(rest) = s.strip_prefix('@') {
            (Mode::Bind, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (Mode::Connect, rest)
        } else {
            return Err(invalid(s, "must start with '@' (bind) or '>' (connect)"));
        };

        if let Some(spec) = rest.strip_prefix("tcp://") {
            let (host, port) = spec
                .rsplit_once(':')
                .ok_or_else(|| invalid(s, "tcp address needs host:port"))?;
            if host.is_empty() {
                return Err(invalid(s, "tcp address needs a host"));
            }
            let port: u16 = port
                .parse()
                .map_err(|_| invalid(s, "tcp port must be 0-65535"))?;
            Ok(Address {
                mode,
                target: Target::Tcp(host.to_string(), port),
            })
        } else if let Some(path) = rest.strip_prefix("ipc://") {
            if path.is_empty() {
                return Err(invalid(s, "ipc address needs a path"));
            }
            Ok(Address {
                mode,
                target: Target::Ipc(PathBuf::from(path)),
            })
        } else {
            Err(invalid(s, "scheme must be tcp:// or ipc://"))
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.mode {
            Mode::Bind => '@',
            Mode::Connect => '>',
        };
        match &self.target {
            Target::Tcp(host, port) => write!(f, "{prefix}tcp://{host}:{port}"),
            Target::Ipc(path) => write!(f, "{prefix}ipc://{}", path.display()),
        }
    }
}

/// One connected peer: the pump task owns the socket, we keep the
/// outbound queue handle.
struct Peer {
    id: u64,
    tx: mpsc::UnboundedSender<Bytes>,
}

/// State shared between an endpoint and its pump tasks.
///
/// Pump tasks hold `Arc<Shared>` only, never `Arc<Endpoint>`, so
/// dropping the last endpoint handle runs `close` and winds them down.
struct Shared {
    peers: Mutex<Vec<Peer>>,
    incoming: Mutex<VecDeque<(u64, Bytes)>>,
    readable: Notify,
    peer_event: Notify,
    close_notify: Notify,
    closed: AtomicBool,
    awaiting_reply: AtomicBool,
    reply_to: Mutex<Option<u64>>,
    next_peer_id: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            peers: Mutex::new(Vec::new()),
            incoming: Mutex::new(VecDeque::new()),
            readable: Notify::new(),
            peer_event: Notify::new(),
            close_notify: Notify::new(),
            closed: AtomicBool::new(false),
            awaiting_reply: AtomicBool::new(false),
            reply_to: Mutex::new(None),
            next_peer_id: AtomicU64::new(1),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Resolves once the endpoint has been closed.
async fn closed_wait(shared: &Shared) {
    loop {
        let notified = shared.close_notify.notified();
        if shared.is_closed() {
            return;
        }
        notified.await;
    }
}

/// A pub/sub/req/rep endpoint over TCP or IPC.
///
/// Obtained from [`Endpoint::open`]; shared as `Arc<Endpoint>` between
/// the event loop, pipelines, and application code.
pub struct Endpoint {
    label: String,
    role: Role,
    local: Option<SocketAddr>,
    ipc_path: Option<PathBuf>,
    registered: AtomicBool,
    shared: Arc<Shared>,
}

impl Endpoint {
    /// Open an endpoint.
    ///
    /// Bind addresses are claimed immediately and surface transport
    /// errors here. Connect addresses spawn a dialer that retries with
    /// backoff until the listener appears, so `open` itself never waits
    /// for the peer.
    pub async fn open(address: &str, role: Role) -> Result<Arc<Self>> {
        let parsed: Address = address.parse()?;
        let shared = Arc::new(Shared::new());
        let mut local = None;
        let mut ipc_path = None;

        match (&parsed.mode, &parsed.target) {
            (Mode::Bind, Target::Tcp(host, port)) => {
                let listener = TcpListener::bind((host.as_str(), *port)).await?;
                local = Some(listener.local_addr()?);
                tokio::spawn(accept_loop_tcp(listener, Arc::clone(&shared)));
            }
            #[cfg(unix)]
            (Mode::Bind, Target::Ipc(path)) => {
                // A previous run may have left the socket file behind.
                if path.exists() {
                    let _ = std::fs::remove_file(path);
                }
                let listener = UnixListener::bind(path)?;
                ipc_path = Some(path.clone());
                tokio::spawn(accept_loop_ipc(listener, Arc::clone(&shared)));
            }
            #[cfg(not(unix))]
            (Mode::Bind, Target::Ipc(_)) => {
                return Err(invalid(address, "ipc requires a unix platform"));
            }
            (Mode::Connect, target) => {
                tokio::spawn(connect_loop(target.clone(), Arc::clone(&shared)));
            }
        }

        info!(address = %parsed, role = %role, "Endpoint open");
        Ok(Arc::new(Self {
            label: address.to_string(),
            role,
            local,
            ipc_path,
            registered: AtomicBool::new(false),
            shared,
        }))
    }

    /// Endpoint role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The address string this endpoint was opened with.
    pub fn address(&self) -> &str {
        &self.label
    }

    /// Actual bound socket address, for TCP bind endpoints. Useful when
    /// binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local
    }

    /// True once `close` has run.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// True when at least one received payload is queued.
    pub fn has_pending(&self) -> bool {
        !self.shared.incoming.lock().is_empty()
    }

    /// Enqueue a payload for delivery. Never blocks.
    ///
    /// - `pub`: fans out to every connected subscriber; with none
    ///   connected the payload is dropped.
    /// - `req`: sends to the peer and arms the reply gate; a second
    ///   send before the reply arrives is rejected.
    /// - `rep`: sends the reply to the peer whose request was last
    ///   received; without a pending request the send is rejected.
    pub fn send(&self, payload: Bytes) -> Result<()> {
        if self.shared.is_closed() {
            return Err(FabricError::Closed);
        }
        if !self.role.can_send() {
            return Err(FabricError::InvalidOperation {
                role: self.role,
                op: "send",
            });
        }

        match self.role {
            Role::Pub => {
                let mut peers = self.shared.peers.lock();
                peers.retain(|p| !p.tx.is_closed());
                for peer in peers.iter() {
                    let _ = peer.tx.send(payload.clone());
                }
            }
            Role::Req => {
                if self.shared.awaiting_reply.load(Ordering::Acquire) {
                    return Err(FabricError::InvalidOperation {
                        role: self.role,
                        op: "second send before reply",
                    });
                }
                let peers = self.shared.peers.lock();
                let peer = peers.first().ok_or(FabricError::NotConnected)?;
                peer.tx
                    .send(payload)
                    .map_err(|_| FabricError::NotConnected)?;
                self.shared.awaiting_reply.store(true, Ordering::Release);
            }
            Role::Rep => {
                let target = self.shared.reply_to.lock().take().ok_or(
                    FabricError::InvalidOperation {
                        role: self.role,
                        op: "reply without pending request",
                    },
                )?;
                let peers = self.shared.peers.lock();
                match peers.iter().find(|p| p.id == target) {
                    Some(peer) => {
                        let _ = peer.tx.send(payload);
                    }
                    // Requester disconnected before the reply was ready.
                    None => debug!(peer = target, "Reply dropped, peer gone"),
                }
            }
            Role::Sub => {
                return Err(FabricError::InvalidOperation {
                    role: self.role,
                    op: "send",
                });
            }
        }

        if let Some(metrics) = Metrics::get() {
            metrics.payloads_sent.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Pop the next queued payload, if any. Never blocks.
    pub fn try_receive(&self) -> Result<Option<Bytes>> {
        if self.shared.is_closed() {
            return Err(FabricError::Closed);
        }
        if !self.role.can_receive() {
            return Err(FabricError::InvalidOperation {
                role: self.role,
                op: "receive",
            });
        }
        if self.role == Role::Req && !self.shared.awaiting_reply.load(Ordering::Acquire) {
            return Err(FabricError::InvalidOperation {
                role: self.role,
                op: "receive before send",
            });
        }

        match self.shared.incoming.lock().pop_front() {
            Some((peer, payload)) => {
                match self.role {
                    Role::Rep => *self.shared.reply_to.lock() = Some(peer),
                    Role::Req => self.shared.awaiting_reply.store(false, Ordering::Release),
                    _ => {}
                }
                if let Some(metrics) = Metrics::get() {
                    metrics.payloads_received.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Some(payload))
            }
            None => Ok(None),
        }
    }

    /// Resolve when a payload is queued or the endpoint is closed.
    ///
    /// This is the readiness hook the event loop selects over. It does
    /// not consume anything; follow up with [`Endpoint::try_receive`].
    pub async fn recv_ready(&self) {
        loop {
            let notified = self.shared.readable.notified();
            if self.shared.is_closed() || self.has_pending() {
                return;
            }
            notified.await;
        }
    }

    /// Resolve when at least one peer is connected.
    pub async fn wait_connected(&self) {
        loop {
            let notified = self.shared.peer_event.notified();
            if self.shared.is_closed() || !self.shared.peers.lock().is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Close the endpoint: stop pump tasks, drop peers, and unlink the
    /// socket file of a bound IPC address. Idempotent.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.close_notify.notify_waiters();
        self.shared.readable.notify_waiters();
        self.shared.peer_event.notify_waiters();
        self.shared.peers.lock().clear();
        if let Some(path) = &self.ipc_path {
            let _ = std::fs::remove_file(path);
        }
        debug!(endpoint = %self.label, "Endpoint closed");
    }

    /// Claim this endpoint for an event loop. Fails if already claimed.
    pub(crate) fn mark_registered(&self) -> Result<()> {
        if self.registered.swap(true, Ordering::AcqRel) {
            return Err(FabricError::AlreadyRegistered);
        }
        Ok(())
    }

    /// Release the event-loop claim.
    pub(crate) fn clear_registered(&self) {
        self.registered.store(false, Ordering::Release);
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("address", &self.label)
            .field("role", &self.role)
            .field("closed", &self.shared.is_closed())
            .finish()
    }
}

#[async_trait::async_trait]
impl FrameSink for Endpoint {
    fn name(&self) -> &str {
        &self.label
    }

    async fn emit(&self, frames: &[Frame]) -> std::result::Result<(), PluginError> {
        for frame in frames {
            self.send(frame.payload.clone())
                .map_err(|e| PluginError::Send(e.to_string()))?;
        }
        Ok(())
    }

    async fn health(&self) -> bool {
        !self.shared.is_closed()
    }

    async fn shutdown(&self) -> std::result::Result<(), PluginError> {
        self.close();
        Ok(())
    }
}

async fn accept_loop_tcp(listener: TcpListener, shared: Arc<Shared>) {
    loop {
        tokio::select! {
            _ = closed_wait(&shared) => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    debug!(peer = %peer_addr, "Accepted connection");
                    tokio::spawn(peer_pump(stream, Arc::clone(&shared)));
                }
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            },
        }
    }
}

#[cfg(unix)]
async fn accept_loop_ipc(listener: UnixListener, shared: Arc<Shared>) {
    loop {
        tokio::select! {
            _ = closed_wait(&shared) => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    debug!("Accepted ipc connection");
                    tokio::spawn(peer_pump(stream, Arc::clone(&shared)));
                }
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            },
        }
    }
}

async fn connect_loop(target: Target, shared: Arc<Shared>) {
    let mut delay = CONNECT_RETRY_MIN;
    loop {
        if shared.is_closed() {
            return;
        }
        match &target {
            Target::Tcp(host, port) => {
                match TcpStream::connect((host.as_str(), *port)).await {
                    Ok(stream) => {
                        delay = CONNECT_RETRY_MIN;
                        peer_pump(stream, Arc::clone(&shared)).await;
                    }
                    Err(e) => debug!(error = %e, "Connect failed, will retry"),
                }
            }
            #[cfg(unix)]
            Target::Ipc(path) => match UnixStream::connect(path).await {
                Ok(stream) => {
                    delay = CONNECT_RETRY_MIN;
                    peer_pump(stream, Arc::clone(&shared)).await;
                }
                Err(e) => debug!(error = %e, "Connect failed, will retry"),
            },
            #[cfg(not(unix))]
            Target::Ipc(_) => return,
        }
        backoff_sleep(&shared, &mut delay).await;
    }
}

async fn backoff_sleep(shared: &Shared, delay: &mut Duration) {
    tokio::select! {
        _ = closed_wait(shared) => {}
        _ = tokio::time::sleep(*delay) => {}
    }
    *delay = (*delay * 2).min(CONNECT_RETRY_MAX);
}

/// Pump one peer connection until it drops or the endpoint closes.
///
/// Wire format is length-delimited: a u32 frame length followed by the
/// payload, handled by [`LengthDelimitedCodec`] on both directions.
async fn peer_pump<S>(stream: S, shared: Arc<Shared>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let id = shared.next_peer_id.fetch_add(1, Ordering::Relaxed);
    let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
    shared.peers.lock().push(Peer { id, tx });
    shared.peer_event.notify_waiters();
    if let Some(metrics) = Metrics::get() {
        metrics.peer_connects.fetch_add(1, Ordering::Relaxed);
    }
    debug!(peer = id, "Peer attached");

    let framed = Framed::new(stream, LengthDelimitedCodec::new());
    let (mut writer, mut reader) = framed.split();
    loop {
        tokio::select! {
            _ = closed_wait(&shared) => break,
            outbound = rx.recv() => match outbound {
                Some(payload) => {
                    if let Err(e) = writer.send(payload).await {
                        debug!(peer = id, error = %e, "Peer write failed");
                        break;
                    }
                }
                None => break,
            },
            inbound = reader.next() => match inbound {
                Some(Ok(chunk)) => {
                    shared.incoming.lock().push_back((id, chunk.freeze()));
                    shared.readable.notify_waiters();
                }
                Some(Err(e)) => {
                    debug!(peer = id, error = %e, "Peer read failed");
                    break;
                }
                None => break,
            },
        }
    }

    shared.peers.lock().retain(|p| p.id != id);
    if let Some(metrics) = Metrics::get() {
        metrics.peer_disconnects.fetch_add(1, Ordering::Relaxed);
    }
    debug!(peer = id, "Peer detached");
}

// ==========================================================================
// Tests
// ==========================================================================
