//! Network front end: one TCP port, two protocols.
//!
//! A single listener is demultiplexed by the first bytes of each
//! connection. gRPC clients open with the HTTP/2 preface; anything that
//! starts like an HTTP/1 request line goes to the liveness endpoint.
//!
//! ## Architecture
//!
//! ```text
//!                 +-------------+
//!   TCP :PORT --> |     Mux     |  <- sniffs, then replays the prefix
//!                 +-------------+
//!                  |           |
//!          HTTP/2  |           |  HTTP/1
//!                  v           v
//!          +-----------+   +-----------+
//!          |    Rpc    |   |  Health   |
//!          |  (tonic)  |   | (/health) |
//!          +-----------+   +-----------+
//!                  |           |
//!                  v           v
//!              +-------------------+
//!              | FailureAggregator |  <- logs every loop exit, forever
//!              +-------------------+
//! ```
//!
//! ## Terminology
//!
//! - **Mux**: accept loop that routes connections by protocol
//! - **Matcher**: decides a protocol from a byte prefix
//! - **Sniffed stream**: a routed connection that replays what was read
//! - **Failure aggregator**: single sink for the serve loops' exits

pub mod aggregator;
pub mod error;
pub mod health;
pub mod listener;
pub mod matcher;
pub mod mux;
pub mod rpc;
pub mod sniff;

pub use aggregator::{FailureAggregator, Outcome, Reporter};
pub use error::{MuxError, ServeError};
pub use listener::Server;
pub use matcher::{Http1Fast, Http2Preface, Matcher, Probe};
pub use mux::{Mux, MuxListener, MuxOptions};
pub use sniff::SniffedStream;
