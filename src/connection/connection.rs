use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::codec::{FrameReader, FrameWriter};
use crate::config::Config;
use crate::connection::uri::WsUri;
use crate::connection::{ConnectionState, Role};
use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::message::Message;
use crate::protocol::assembler::MessageAssembler;
use crate::protocol::handshake::{ServerHandshake, client_handshake, server_handshake};
use crate::protocol::{Frame, OpCode};

/// Close status sent when the local side ends the session.
const CLOSE_NORMAL: u16 = 1000;
/// Close status for malformed frames.
const CLOSE_PROTOCOL_ERROR: u16 = 1002;
/// Close status for frames or messages over the configured limits.
const CLOSE_TOO_BIG: u16 = 1009;

type BoxedWriter = FrameWriter<Box<dyn AsyncWrite + Send + Unpin>>;

/// Process-unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receives what a connection's read loop produces.
///
/// Callbacks run directly on the connection's read task, one at a time, so
/// they must not block. To close the connection from a callback, spawn
/// [`Connection::close`] on a clone of the handle.
pub trait Handler: Send + Sync + 'static {
    /// The read loop started. Runs before any other callback for `conn`.
    fn on_open(&self, conn: &Connection) {
        let _ = conn;
    }

    /// A complete Text or Binary message arrived.
    fn on_message(&self, conn: &Connection, message: Message) {
        let _ = (conn, message);
    }

    /// The connection reached `Closed`. Called exactly once.
    fn on_closed(&self, conn: &Connection) {
        let _ = conn;
    }
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn on_open(&self, conn: &Connection) {
        (**self).on_open(conn);
    }

    fn on_message(&self, conn: &Connection, message: Message) {
        (**self).on_message(conn, message);
    }

    fn on_closed(&self, conn: &Connection) {
        (**self).on_closed(conn);
    }
}

/// Handler notifications as values, for channel-style consumption.
#[derive(Debug, Clone)]
pub enum Event {
    Message(Connection, Message),
    Closed(Connection),
}

impl Handler for mpsc::UnboundedSender<Event> {
    fn on_message(&self, conn: &Connection, message: Message) {
        let _ = self.send(Event::Message(conn.clone(), message));
    }

    fn on_closed(&self, conn: &Connection) {
        let _ = self.send(Event::Closed(conn.clone()));
    }
}

/// Result of [`Connection::accept`].
#[derive(Debug)]
pub enum Accepted<T> {
    /// The upgrade succeeded and the read loop is running.
    Connection(Connection),
    /// The peer sent an ordinary HTTP request.
    Plain(PlainRequest<T>),
}

/// A non-upgrade HTTP request still holding its transport.
pub struct PlainRequest<T> {
    request: HttpRequest,
    reader: BufReader<ReadHalf<T>>,
    writer: WriteHalf<T>,
}

impl<T> std::fmt::Debug for PlainRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainRequest")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

impl<T: AsyncRead + AsyncWrite> PlainRequest<T> {
    #[must_use]
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// Write `response` and shut the transport down.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the transport fails.
    pub async fn respond(mut self, response: &HttpResponse) -> Result<()> {
        response.write_to(&mut self.writer).await?;
        self.writer.shutdown().await?;
        Ok(())
    }

    /// Give back the request and the rejoined transport. Bytes the peer sent
    /// after the request head and that were already buffered are dropped.
    #[must_use]
    pub fn into_parts(self) -> (HttpRequest, T)
    where
        T: Unpin,
    {
        (self.request, self.reader.into_inner().unsplit(self.writer))
    }
}

struct Inner {
    id: ConnectionId,
    role: Role,
    request: HttpRequest,
    state: AtomicU8,
    close_sent: AtomicBool,
    /// Write lock: held for the whole encode, write and flush of a frame.
    /// `None` once the read loop has released the transport.
    writer: Mutex<Option<BoxedWriter>>,
    /// Bound on the Close write in `close()` and the final shutdown.
    close_timeout: Duration,
    /// Stops the read loop.
    cancel: CancellationToken,
    /// Cancelled by the read loop after the transport is released and
    /// `on_closed` has run.
    done: CancellationToken,
}

/// An open WebSocket session.
///
/// Cloning is cheap and every clone refers to the same session. The read loop
/// holds one clone until it exits.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("role", &self.inner.role)
            .field("state", &self.state())
            .finish()
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Connection {}

enum Exit {
    Cancelled,
    PeerClosed(Option<u16>),
    Eof,
    Failed(Error),
}

impl Connection {
    /// Run the server handshake on `transport` and open a session.
    ///
    /// Non-upgrade requests come back as [`Accepted::Plain`] with nothing
    /// written. On a rejected upgrade a 400 has been sent, the transport is
    /// shut down and the error returned.
    ///
    /// # Errors
    ///
    /// - `Error::HandshakeRejected` / `Error::HandshakeTimeout` /
    ///   `Error::HandshakeTooLarge` from the handshake
    /// - transport errors
    pub async fn accept<T, H>(transport: T, config: &Config, handler: H) -> Result<Accepted<T>>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
        H: Handler,
    {
        let (read, mut write) = tokio::io::split(transport);
        let mut reader = BufReader::new(read);
        match server_handshake(&mut reader, &mut write, config).await {
            Ok(ServerHandshake::Upgraded(request)) => Ok(Accepted::Connection(Self::start(
                reader,
                Box::new(write),
                Role::Server,
                request,
                config,
                Arc::new(handler),
            ))),
            Ok(ServerHandshake::Plain(request)) => Ok(Accepted::Plain(PlainRequest {
                request,
                reader,
                writer: write,
            })),
            Err(e) => {
                let _ = write.shutdown().await;
                Err(e)
            }
        }
    }

    /// Run the client handshake for `path` on `host` over `transport`.
    ///
    /// On failure the transport is shut down and no session exists.
    ///
    /// # Errors
    ///
    /// - `Error::HandshakeRejected` if the server refuses or answers wrongly
    /// - `Error::HandshakeTimeout` past `config.timeouts.handshake`
    /// - `Error::InvalidUri` / `Error::InvalidHeaderValue` for a bad host or path
    pub async fn client<T, H>(
        transport: T,
        host: &str,
        path: &str,
        config: &Config,
        handler: H,
    ) -> Result<Self>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
        H: Handler,
    {
        let (read, mut write) = tokio::io::split(transport);
        let mut reader = BufReader::new(read);
        match client_handshake(&mut reader, &mut write, host, path, config).await {
            Ok(request) => Ok(Self::start(
                reader,
                Box::new(write),
                Role::Client,
                request,
                config,
                Arc::new(handler),
            )),
            Err(e) => {
                let _ = write.shutdown().await;
                Err(e)
            }
        }
    }

    /// Connect over TCP to `uri` (`ws://host[:port][/path]`) and run the client
    /// handshake. `default_port` applies when the URI names none.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidUri` if `uri` does not parse
    /// - `Error::Io` if the TCP connection fails
    /// - handshake errors as for [`Connection::client`]
    pub async fn connect<H: Handler>(
        uri: &str,
        default_port: u16,
        config: &Config,
        handler: H,
    ) -> Result<Self> {
        let target = WsUri::parse(uri, default_port)?;
        let stream = tokio::time::timeout(
            config.timeouts.handshake,
            TcpStream::connect((target.host.as_str(), target.port)),
        )
        .await??;
        stream.set_nodelay(true)?;
        Self::client(stream, &target.host_header(), &target.path, config, handler).await
    }

    fn start<R>(
        reader: BufReader<R>,
        writer: Box<dyn AsyncWrite + Send + Unpin>,
        role: Role,
        request: HttpRequest,
        config: &Config,
        handler: Arc<dyn Handler>,
    ) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let conn = Self {
            inner: Arc::new(Inner {
                id: ConnectionId::next(),
                role,
                request,
                state: AtomicU8::new(ConnectionState::Connecting.as_u8()),
                close_sent: AtomicBool::new(false),
                writer: Mutex::new(Some(FrameWriter::new(writer, role))),
                close_timeout: config.timeouts.close,
                cancel: CancellationToken::new(),
                done: CancellationToken::new(),
            }),
        };
        conn.set_state(ConnectionState::Open);
        debug!(conn_id = %conn.id(), role = %role, path = %conn.inner.request.target, "connection open");

        let frames = FrameReader::new(reader, config.limits.clone());
        let assembler = MessageAssembler::new(config.limits.clone());
        tokio::spawn(conn.clone().read_loop(frames, assembler, handler));
        conn
    }

    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.inner.role
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// The HTTP request that established this session: the one received for
    /// servers, the one sent for clients.
    #[must_use]
    pub fn request(&self) -> &HttpRequest {
        &self.inner.request
    }

    fn set_state(&self, state: ConnectionState) {
        self.inner.state.fetch_max(state.as_u8(), Ordering::AcqRel);
    }

    /// Move from `from` to `to`; false if the state was anything else.
    fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.inner
            .state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Send one message as a single frame.
    ///
    /// # Errors
    ///
    /// - `Error::NotOpen` unless the connection is `Open`
    /// - `Error::Io` if the write fails; the connection is then stopped
    pub async fn send(&self, message: Message) -> Result<()> {
        let frame = Frame::new(true, message.kind().opcode(), message.into_data());
        self.write(frame, true).await
    }

    /// Send a Text message.
    ///
    /// # Errors
    ///
    /// As for [`Connection::send`].
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(Message::text(text)).await
    }

    /// Send a Binary message.
    ///
    /// # Errors
    ///
    /// As for [`Connection::send`].
    pub async fn send_binary(&self, data: impl Into<bytes::Bytes>) -> Result<()> {
        self.send(Message::binary(data)).await
    }

    /// Send a Ping. The peer's Pong is only traced.
    ///
    /// # Errors
    ///
    /// - `Error::ControlFrameTooLarge` if `payload` exceeds 125 bytes
    /// - as for [`Connection::send`] otherwise
    pub async fn ping(&self, payload: impl Into<bytes::Bytes>) -> Result<()> {
        let frame = Frame::ping(payload);
        frame.validate()?;
        self.write(frame, true).await
    }

    /// Write a frame under the write lock.
    ///
    /// With `require_open`, the state is checked after the lock is taken so
    /// nothing is sent behind a Close frame. Both waiting for the lock and the
    /// write itself give up with `Error::NotOpen` once the read loop is
    /// cancelled, so a stalled peer never keeps the lock from `finish`.
    async fn write(&self, frame: Frame, require_open: bool) -> Result<()> {
        let cancel = &self.inner.cancel;
        let mut guard = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::NotOpen),
            guard = self.inner.writer.lock() => guard,
        };
        if require_open && !self.state().can_send() {
            return Err(Error::NotOpen);
        }
        let Some(writer) = guard.as_mut() else {
            return Err(Error::NotOpen);
        };
        let written = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(conn_id = %self.id(), "write abandoned, connection stopping");
                return Err(Error::NotOpen);
            }
            written = writer.write_frame(frame) => written,
        };
        if let Err(e) = written {
            drop(guard);
            warn!(conn_id = %self.id(), error = %e, "write failed, stopping connection");
            cancel.cancel();
            return Err(e);
        }
        Ok(())
    }

    /// Send a Close frame unless one was already sent.
    async fn send_close(&self, code: Option<u16>) -> Result<()> {
        if self.inner.close_sent.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.write(Frame::close(code), false).await
    }

    /// Close the session.
    ///
    /// Sends a Close frame if the connection is open, stops the read loop and
    /// waits until the transport is released and `on_closed` has run.
    /// Calling it again, concurrently or after the fact, only waits.
    ///
    /// The Close frame is best-effort: if it cannot be written within
    /// `Timeouts::close` (say a send to a peer that stopped reading holds the
    /// write lock), the connection is torn down without it.
    pub async fn close(&self) {
        if self.transition(ConnectionState::Open, ConnectionState::Closing) {
            debug!(conn_id = %self.id(), "closing");
            let sent = tokio::time::timeout(
                self.inner.close_timeout,
                self.send_close(Some(CLOSE_NORMAL)),
            )
            .await;
            match sent {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(conn_id = %self.id(), error = %e, "close frame not sent"),
                Err(_) => debug!(conn_id = %self.id(), "close frame timed out"),
            }
        }
        self.inner.cancel.cancel();
        self.inner.done.cancelled().await;
    }

    /// Resolves once the connection is `Closed` and `on_closed` has run.
    pub async fn closed(&self) {
        self.inner.done.cancelled().await;
    }

    async fn read_loop<R>(
        self,
        mut frames: FrameReader<R>,
        mut assembler: MessageAssembler,
        handler: Arc<dyn Handler>,
    ) where
        R: AsyncRead + Unpin,
    {
        handler.on_open(&self);

        let cancel = self.inner.cancel.clone();
        let exit = loop {
            let frame = tokio::select! {
                biased;
                () = cancel.cancelled() => break Exit::Cancelled,
                result = frames.read_frame() => match result {
                    Ok(frame) => frame,
                    Err(Error::ConnectionClosed) => break Exit::Eof,
                    Err(e) => break Exit::Failed(e),
                },
            };

            match frame.opcode {
                OpCode::Close => {
                    let code = frame.close_code();
                    self.transition(ConnectionState::Open, ConnectionState::Closing);
                    let _ = self.send_close(code).await;
                    break Exit::PeerClosed(code);
                }
                OpCode::Ping => {
                    let pong = Frame::pong(frame.into_payload());
                    let written = tokio::select! {
                        biased;
                        () = cancel.cancelled() => break Exit::Cancelled,
                        written = self.write(pong, false) => written,
                    };
                    if let Err(e) = written {
                        break Exit::Failed(e);
                    }
                }
                OpCode::Pong => {
                    trace!(conn_id = %self.id(), len = frame.payload().len(), "pong received");
                }
                OpCode::Text | OpCode::Binary | OpCode::Continuation => match assembler.push(frame) {
                    Ok(Some(message)) => handler.on_message(&self, message),
                    Ok(None) => {}
                    Err(e) => break Exit::Failed(e),
                },
            }
        };

        match &exit {
            Exit::Cancelled => debug!(conn_id = %self.id(), "read loop cancelled"),
            Exit::PeerClosed(code) => debug!(conn_id = %self.id(), code = ?code, "peer closed"),
            Exit::Eof => debug!(conn_id = %self.id(), "peer went away"),
            Exit::Failed(e) => {
                warn!(conn_id = %self.id(), error = %e, "read loop failed");
                let code = match e {
                    Error::FrameTooLarge { .. }
                    | Error::MessageTooLarge { .. }
                    | Error::TooManyFragments { .. } => Some(CLOSE_TOO_BIG),
                    Error::Io(_) | Error::TruncatedStream => None,
                    _ => Some(CLOSE_PROTOCOL_ERROR),
                };
                if code.is_some() && self.state() == ConnectionState::Open {
                    self.set_state(ConnectionState::Closing);
                    let _ = self.send_close(code).await;
                }
            }
        }

        drop(frames);
        self.finish(handler.as_ref()).await;
    }

    /// Release the transport, mark the connection closed and notify.
    async fn finish(&self, handler: &dyn Handler) {
        // Every writer races `cancel`, which is set by now, so the lock is
        // released promptly.
        self.inner.cancel.cancel();
        let writer = self.inner.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if tokio::time::timeout(self.inner.close_timeout, writer.shutdown())
                .await
                .is_err()
            {
                debug!(conn_id = %self.id(), "shutdown timed out, dropping transport");
            }
        }
        self.set_state(ConnectionState::Closed);
        debug!(conn_id = %self.id(), "connection closed");
        handler.on_closed(self);
        self.inner.done.cancel();
    }
}
