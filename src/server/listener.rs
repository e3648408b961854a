use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::app::AppContext;
use crate::server::aggregator::{FailureAggregator, Outcome};
use crate::server::health;
use crate::server::matcher::{Http1Fast, Http2Preface};
use crate::server::mux::Mux;
use crate::server::rpc;

/// The multiplexed gRPC + HTTP/1 server.
pub struct Server {
    listener: TcpListener,
    app: AppContext,
}

impl Server {
    pub fn new(listener: TcpListener, app: AppContext) -> Self {
        Self { listener, app }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Starts every protocol server and drains their exits.
    ///
    /// Never returns on its own. A failed loop is logged and the remaining
    /// ones keep serving.
    pub async fn serve(self) {
        self.serve_with(|_| {}).await
    }

    /// Like [`Server::serve`], additionally handing each loop exit to
    /// `handler`.
    pub async fn serve_with<F>(self, handler: F)
    where
        F: FnMut(&Outcome),
    {
        let port = self.local_addr().map(|addr| addr.port()).ok();

        // Registration order is match priority.
        let mut mux = Mux::new(self.listener, self.app.config.mux_options());
        let grpc = mux.listen(Http2Preface);
        let http = mux.listen(Http1Fast);

        let aggregator = FailureAggregator::new();
        aggregator.spawn("grpc", rpc::serve(grpc, self.app.store.clone()));
        aggregator.spawn("http", health::serve(http));

        tracing::info!(port, multiplexed = true, "server started: multiplexed http/1, http/2");

        aggregator.spawn("mux", mux.serve());
        aggregator.drain(handler).await
    }
}
