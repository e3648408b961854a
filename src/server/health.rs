//! Plain HTTP/1 liveness endpoint.
//!
//! Only `/health` is served. Every response closes the connection, so a
//! request head is all that is ever read.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::server::error::ServeError;
use crate::server::mux::MuxListener;

const HEALTH_PATH: &str = "/health";
const MAX_HEAD_BYTES: usize = 8 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Serves liveness probes on connections routed from the mux.
///
/// Runs until the mux stops.
pub async fn serve(mut listener: MuxListener) -> Result<(), ServeError> {
    while let Ok(stream) = listener.accept().await {
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream).await {
                tracing::debug!(error = %e, "health connection failed");
            }
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    BadRequest,
    NotFound,
    MethodNotAllowed,
}

impl Status {
    fn line(self) -> &'static str {
        match self {
            Status::Ok => "200 OK",
            Status::BadRequest => "400 Bad Request",
            Status::NotFound => "404 Not Found",
            Status::MethodNotAllowed => "405 Method Not Allowed",
        }
    }
}

/// Reads one request head and writes the response.
pub async fn handle_connection<S>(mut stream: S) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let head = match tokio::time::timeout(READ_TIMEOUT, read_head(&mut stream)).await {
        Ok(Ok(Some(head))) => head,
        Ok(Ok(None)) => return Ok(()),
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            tracing::debug!("health request timed out");
            return Ok(());
        }
    };

    let status = respond_to(&head);
    let mut response = format!(
        "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n",
        status.line()
    );
    if status == Status::MethodNotAllowed {
        response.push_str("Allow: GET, HEAD\r\n");
    }
    response.push_str("\r\n");

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

/// Reads up to the end of the request head.
///
/// Returns `None` if the peer closes first or the head is too large.
async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> std::io::Result<Option<Vec<u8>>> {
    let mut head = Vec::with_capacity(512);
    let mut chunk = [0u8; 512];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        head.extend_from_slice(&chunk[..n]);

        if head.windows(4).any(|w| w == b"\r\n\r\n") {
            return Ok(Some(head));
        }
        if head.len() > MAX_HEAD_BYTES {
            tracing::debug!(len = head.len(), "health request head too large");
            return Ok(None);
        }
    }
}

fn respond_to(head: &[u8]) -> Status {
    let Some(line) = head.split(|&b| b == b'\n').next() else {
        return Status::BadRequest;
    };
    let Ok(line) = std::str::from_utf8(line) else {
        return Status::BadRequest;
    };

    let mut parts = line.trim_end_matches('\r').split(' ');
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Status::BadRequest;
    };
    if !version.starts_with("HTTP/1.") {
        return Status::BadRequest;
    }

    let path = target.split('?').next().unwrap_or(target);
    if path != HEALTH_PATH {
        return Status::NotFound;
    }
    match method {
        "GET" | "HEAD" => Status::Ok,
        _ => Status::MethodNotAllowed,
    }
}
