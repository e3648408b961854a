//! Protocol matchers over a connection's first bytes.

/// Outcome of testing a byte prefix against one protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// The prefix identifies this protocol.
    Match,
    /// The prefix can never identify this protocol.
    NoMatch,
    /// Undecided; more bytes are needed.
    NeedMore,
}

/// Decides whether a connection speaks a given protocol from its preamble.
pub trait Matcher: Send + Sync + 'static {
    /// Short protocol name used in logs.
    fn protocol(&self) -> &'static str;

    fn probe(&self, prefix: &[u8]) -> Probe;
}

/// The HTTP/2 client connection preface (RFC 9113 §3.4), sent first by
/// every gRPC client.
pub const HTTP2_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// HTTP/1 request methods recognized by [`Http1Fast`].
const HTTP1_METHODS: [&[u8]; 9] = [
    b"GET ",
    b"POST ",
    b"PUT ",
    b"DELETE ",
    b"HEAD ",
    b"OPTIONS ",
    b"PATCH ",
    b"CONNECT ",
    b"TRACE ",
];

/// Matches the exact HTTP/2 connection preface.
#[derive(Debug, Clone, Copy, Default)]
pub struct Http2Preface;

impl Matcher for Http2Preface {
    fn protocol(&self) -> &'static str {
        "http2"
    }

    fn probe(&self, prefix: &[u8]) -> Probe {
        probe_literal(prefix, HTTP2_PREFACE)
    }
}

/// Matches an HTTP/1 request line by its method token alone.
///
/// Only the method is checked, not the version, so a decision is reached
/// after a handful of bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Http1Fast;

impl Matcher for Http1Fast {
    fn protocol(&self) -> &'static str {
        "http1"
    }

    fn probe(&self, prefix: &[u8]) -> Probe {
        let mut result = Probe::NoMatch;
        for method in HTTP1_METHODS {
            match probe_literal(prefix, method) {
                Probe::Match => return Probe::Match,
                Probe::NeedMore => result = Probe::NeedMore,
                Probe::NoMatch => {}
            }
        }
        result
    }
}

fn probe_literal(prefix: &[u8], literal: &[u8]) -> Probe {
    if prefix.len() >= literal.len() {
        if prefix.starts_with(literal) {
            Probe::Match
        } else {
            Probe::NoMatch
        }
    } else if literal.starts_with(prefix) {
        Probe::NeedMore
    } else {
        Probe::NoMatch
    }
}

/// Result of testing a prefix against an ordered set of matchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Index of the winning matcher.
    Routed(usize),
    /// Every matcher rejected the prefix.
    Unmatched,
    /// A matcher that outranks every possible winner still needs bytes.
    Undecided,
}

/// Tests `prefix` against `matchers` in priority order; the first match
/// wins.
///
/// A lower-priority matcher cannot win while a higher-priority one is
/// still undecided.
pub fn classify<'a>(
    matchers: impl IntoIterator<Item = &'a dyn Matcher>,
    prefix: &[u8],
) -> Classification {
    for (index, matcher) in matchers.into_iter().enumerate() {
        match matcher.probe(prefix) {
            Probe::Match => return Classification::Routed(index),
            Probe::NeedMore => return Classification::Undecided,
            Probe::NoMatch => {}
        }
    }
    Classification::Unmatched
}
