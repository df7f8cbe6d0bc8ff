//! In-memory exchange source for embedding the engine without a socket transport.

use std::io;

use may::sync::mpsc;

use super::host::{ExchangeSource, Incoming};
use super::request::Request;
use super::response::ResponseParts;
use crate::cancel::CancellationToken;

/// Create a connected sender/source pair.
#[must_use]
pub fn channel() -> (ExchangeSender, ChannelSource) {
    let (tx, rx) = mpsc::channel();
    (ExchangeSender { tx }, ChannelSource { rx })
}

/// Submits requests to a [`ChannelSource`]. Dropping every sender ends the
/// host's accept loop.
#[derive(Clone)]
pub struct ExchangeSender {
    tx: mpsc::Sender<Incoming>,
}

impl ExchangeSender {
    /// # Errors
    ///
    /// `BrokenPipe` when the source has been dropped.
    pub fn send(&self, request: Request) -> io::Result<PendingResponse> {
        self.send_with_cancellation(request, CancellationToken::new())
    }

    /// # Errors
    ///
    /// `BrokenPipe` when the source has been dropped.
    pub fn send_with_cancellation(
        &self,
        request: Request,
        cancellation: CancellationToken,
    ) -> io::Result<PendingResponse> {
        let (reply_tx, reply_rx) = mpsc::channel();
        let incoming = Incoming::new(request, cancellation.clone(), move |parts: ResponseParts| {
            let _ = reply_tx.send(parts);
        });
        self.tx
            .send(incoming)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "exchange source closed"))?;
        Ok(PendingResponse {
            rx: reply_rx,
            cancellation,
        })
    }
}

/// A submitted exchange awaiting its response.
pub struct PendingResponse {
    rx: mpsc::Receiver<ResponseParts>,
    cancellation: CancellationToken,
}

impl PendingResponse {
    /// Simulate the client going away.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Block (coroutine-aware) until the response arrives.
    ///
    /// # Errors
    ///
    /// `BrokenPipe` if the exchange was dropped without a response.
    pub fn wait(self) -> io::Result<ResponseParts> {
        self.rx
            .recv()
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "exchange dropped without response"))
    }
}

/// Receiving end, driven by [`super::Host::serve`].
pub struct ChannelSource {
    rx: mpsc::Receiver<Incoming>,
}

impl ExchangeSource for ChannelSource {
    fn next_exchange(&mut self) -> Option<Incoming> {
        self.rx.recv().ok()
    }
}
