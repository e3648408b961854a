//! Single-port protocol demultiplexer.
//!
//! One TCP listener feeds several protocol servers. Each accepted
//! connection is read just far enough for a [`Matcher`] to recognize its
//! protocol, then handed to that protocol's [`MuxListener`] as a
//! [`SniffedStream`] that replays the bytes already read.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::BytesMut;
use futures_util::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Semaphore, mpsc};

use crate::server::error::{MuxError, ServeError};
use crate::server::matcher::{Classification, Matcher, classify};
use crate::server::sniff::SniffedStream;

const SNIFF_CHUNK: usize = 64;

#[derive(Debug, Clone)]
pub struct MuxOptions {
    /// Upper bound on concurrently open demultiplexed connections.
    pub max_connections: usize,
    /// How long a connection may take to send an identifiable preamble.
    pub sniff_timeout: Duration,
    /// Bytes read before giving up on identification.
    pub max_sniff_bytes: usize,
    /// Connections queued per protocol listener before accept waits.
    pub backlog: usize,
}

impl Default for MuxOptions {
    fn default() -> Self {
        Self {
            max_connections: 1024,
            sniff_timeout: Duration::from_secs(5),
            max_sniff_bytes: 1024,
            backlog: 128,
        }
    }
}

struct Route {
    matcher: Box<dyn Matcher>,
    tx: mpsc::Sender<SniffedStream>,
}

/// Routes connections accepted on one listener by their first bytes.
pub struct Mux {
    listener: TcpListener,
    routes: Vec<Route>,
    options: MuxOptions,
}

impl Mux {
    pub fn new(listener: TcpListener, options: MuxOptions) -> Self {
        Self {
            listener,
            routes: Vec::new(),
            options,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Registers a protocol. Earlier registrations take priority.
    pub fn listen(&mut self, matcher: impl Matcher) -> MuxListener {
        let protocol = matcher.protocol();
        let (tx, rx) = mpsc::channel(self.options.backlog.max(1));
        self.routes.push(Route {
            matcher: Box::new(matcher),
            tx,
        });
        MuxListener { protocol, rx }
    }

    /// Runs the accept loop.
    ///
    /// Per-connection failures are logged and dropped. Returns only when
    /// accepting itself fails.
    pub async fn serve(self) -> Result<(), ServeError> {
        let limiter = Arc::new(Semaphore::new(self.options.max_connections.max(1)));
        let routes: Arc<[Route]> = self.routes.into();
        let options = Arc::new(self.options);

        loop {
            let permit = Arc::clone(&limiter)
                .acquire_owned()
                .await
                .map_err(|_| ServeError::LimiterClosed)?;

            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) if is_transient(&e) => {
                    tracing::warn!(error = %e, "transient accept error");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let routes = Arc::clone(&routes);
            let options = Arc::clone(&options);
            tokio::spawn(async move {
                match route(stream, &routes, &options).await {
                    Ok((index, prefix, stream)) => {
                        let route = &routes[index];
                        let protocol = route.matcher.protocol();
                        tracing::trace!(%peer, protocol, "connection routed");

                        let stream = SniffedStream::new(stream, prefix, Some(permit));
                        if route.tx.send(stream).await.is_err() {
                            let e = MuxError::ListenerClosed(protocol);
                            tracing::debug!(%peer, error = %e, "connection dropped");
                        }
                    }
                    Err(e) => tracing::debug!(%peer, error = %e, "connection dropped"),
                }
            });
        }
    }
}

async fn route(
    mut stream: TcpStream,
    routes: &[Route],
    options: &MuxOptions,
) -> Result<(usize, BytesMut, TcpStream), MuxError> {
    let mut prefix = BytesMut::with_capacity(SNIFF_CHUNK);
    let matchers: Vec<&dyn Matcher> = routes.iter().map(|r| r.matcher.as_ref()).collect();
    let sniffed = sniff(&mut stream, &mut prefix, &matchers, options.max_sniff_bytes);
    let index = tokio::time::timeout(options.sniff_timeout, sniffed)
        .await
        .map_err(|_| MuxError::Timeout)??;
    Ok((index, prefix, stream))
}

/// Reads from `stream` into `prefix` until `matchers` reach a decision.
///
/// Returns the index of the winning matcher. `prefix` holds every byte
/// read, including any beyond what the decision needed.
pub async fn sniff<S>(
    stream: &mut S,
    prefix: &mut BytesMut,
    matchers: &[&dyn Matcher],
    max_bytes: usize,
) -> Result<usize, MuxError>
where
    S: AsyncRead + Unpin,
{
    loop {
        match classify(matchers.iter().copied(), &prefix[..]) {
            Classification::Routed(index) => return Ok(index),
            Classification::Unmatched => return Err(MuxError::NoMatch),
            Classification::Undecided if prefix.len() >= max_bytes => {
                return Err(MuxError::NoMatch);
            }
            Classification::Undecided => {}
        }

        prefix.reserve(SNIFF_CHUNK);
        if stream.read_buf(prefix).await? == 0 {
            return Err(MuxError::ClosedEarly);
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

/// The receiving end for one protocol's connections.
///
/// Usable directly via [`MuxListener::accept`] or as a stream of
/// connections (e.g. for `tonic`'s `serve_with_incoming`).
#[derive(Debug)]
pub struct MuxListener {
    protocol: &'static str,
    rx: mpsc::Receiver<SniffedStream>,
}

impl MuxListener {
    pub fn protocol(&self) -> &'static str {
        self.protocol
    }

    /// Waits for the next connection routed to this protocol.
    ///
    /// Fails once the mux has stopped.
    pub async fn accept(&mut self) -> Result<SniffedStream, MuxError> {
        self.rx
            .recv()
            .await
            .ok_or(MuxError::ListenerClosed(self.protocol))
    }
}

impl Stream for MuxListener {
    type Item = io::Result<SniffedStream>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx).map(|next| next.map(Ok))
    }
}
