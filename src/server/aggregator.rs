//! Collects the exits of long-running serve loops.

use std::future::Future;

use tokio::sync::mpsc;

use crate::server::error::ServeError;

/// How a serve loop ended.
#[derive(Debug)]
pub struct Outcome {
    /// Name of the loop that reported.
    pub source: &'static str,
    pub result: Result<(), ServeError>,
}

/// Funnels every serve loop's exit into one place.
///
/// The aggregator keeps a sender of its own, so [`FailureAggregator::drain`]
/// never observes a closed channel and runs for the life of the process.
#[derive(Debug)]
pub struct FailureAggregator {
    tx: mpsc::UnboundedSender<Outcome>,
    rx: mpsc::UnboundedReceiver<Outcome>,
}

impl Default for FailureAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl FailureAggregator {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn reporter(&self, source: &'static str) -> Reporter {
        Reporter {
            source,
            tx: self.tx.clone(),
        }
    }

    /// Spawns `fut` and reports its result, or its panic, when it ends.
    pub fn spawn<F>(&self, source: &'static str, fut: F)
    where
        F: Future<Output = Result<(), ServeError>> + Send + 'static,
    {
        let reporter = self.reporter(source);
        let handle = tokio::spawn(fut);
        tokio::spawn(async move {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(ServeError::Task(e.to_string())),
            };
            reporter.report(result);
        });
    }

    /// Logs each reported outcome and hands it to `handler`, forever.
    pub async fn drain<F>(mut self, mut handler: F)
    where
        F: FnMut(&Outcome),
    {
        while let Some(outcome) = self.rx.recv().await {
            match &outcome.result {
                Err(e) => tracing::error!(source = outcome.source, error = %e, "serve loop failed"),
                Ok(()) => tracing::warn!(source = outcome.source, "serve loop exited"),
            }
            handler(&outcome);
        }
    }
}

/// Sending half handed to one serve loop.
#[derive(Debug, Clone)]
pub struct Reporter {
    source: &'static str,
    tx: mpsc::UnboundedSender<Outcome>,
}

impl Reporter {
    pub fn report(&self, result: Result<(), ServeError>) {
        // The receiver lives as long as the aggregator's own sender.
        let _ = self.tx.send(Outcome {
            source: self.source,
            result,
        });
    }
}
