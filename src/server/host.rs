use std::io;

use may::coroutine::{self, JoinHandle};
use tracing::{debug, error, info};

use super::context::ExchangeContext;
use super::request::Request;
use super::response::ResponseParts;
use super::service::AppService;
use crate::cancel::CancellationToken;

/// Delivers the final response state back to the transport.
pub trait Responder: Send {
    fn respond(self: Box<Self>, response: ResponseParts);
}

impl<F> Responder for F
where
    F: FnOnce(ResponseParts) + Send,
{
    fn respond(self: Box<Self>, response: ResponseParts) {
        (*self)(response);
    }
}

/// One exchange as handed over by the transport.
pub struct Incoming {
    pub request: Request,
    /// Tripped by the transport when the client goes away.
    pub cancellation: CancellationToken,
    pub responder: Box<dyn Responder>,
}

impl Incoming {
    pub fn new<R>(request: Request, cancellation: CancellationToken, responder: R) -> Self
    where
        R: Responder + 'static,
    {
        Self {
            request,
            cancellation,
            responder: Box::new(responder),
        }
    }
}

/// The opaque transport: yields exchanges until it is exhausted.
pub trait ExchangeSource: Send + 'static {
    /// Next exchange, suspending the calling coroutine while none is ready.
    /// `None` ends the accept loop.
    fn next_exchange(&mut self) -> Option<Incoming>;
}

/// Runs exchanges from a source through an [`AppService`], one coroutine each.
#[derive(Clone, Debug)]
pub struct Host {
    service: AppService,
    stack_size: usize,
}

impl Host {
    #[must_use]
    pub fn new(service: AppService, stack_size: usize) -> Self {
        Self {
            service,
            stack_size,
        }
    }

    #[must_use]
    pub fn service(&self) -> &AppService {
        &self.service
    }

    /// Start the accept loop on its own coroutine.
    ///
    /// # Errors
    ///
    /// Returns an error if the accept coroutine cannot be spawned.
    pub fn serve<S: ExchangeSource>(&self, mut source: S) -> io::Result<ServerHandle> {
        let host = self.clone();
        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The accept loop owns its source and a clone of the host; nothing borrowed
        // from this frame is captured.
        let handle = unsafe {
            coroutine::Builder::new()
                .name("brrtdispatch-accept".to_string())
                .stack_size(self.stack_size)
                .spawn(move || {
                    info!(stack_size = host.stack_size, "Accept loop started");
                    while let Some(incoming) = source.next_exchange() {
                        if let Err(e) = host.dispatch(incoming) {
                            error!(error = %e, "Failed to spawn exchange coroutine");
                        }
                    }
                    info!("Exchange source exhausted, accept loop stopped");
                })
        }?;
        Ok(ServerHandle { handle })
    }

    /// Process one exchange on a fresh coroutine.
    ///
    /// # Errors
    ///
    /// Returns an error if the coroutine cannot be spawned; the exchange is
    /// dropped without a response.
    pub fn dispatch(&self, incoming: Incoming) -> io::Result<()> {
        let service = self.service.clone();
        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The closure owns the exchange and a service clone; the responder is called
        // exactly once from inside it.
        unsafe {
            coroutine::Builder::new()
                .stack_size(self.stack_size)
                .spawn(move || {
                    let Incoming {
                        request,
                        cancellation,
                        responder,
                    } = incoming;
                    let mut ctx = ExchangeContext::new(request).with_cancellation(cancellation);
                    service.handle(&mut ctx);
                    debug!(request_id = %ctx.request_id(), "Responding");
                    responder.respond(ctx.into_response());
                })
        }?;
        Ok(())
    }
}

/// Handle to a running accept loop.
pub struct ServerHandle {
    handle: JoinHandle<()>,
}

impl ServerHandle {
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.handle.is_done()
    }

    /// Cancel the accept loop and wait for it to finish. In-flight exchanges
    /// run to completion on their own coroutines.
    pub fn stop(self) {
        // SAFETY: may::JoinHandle::coroutine().cancel() is marked unsafe by the may runtime.
        // The handle is live and shutdown is the intended outcome.
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
    }

    /// Wait for the source to be exhausted.
    ///
    /// # Errors
    ///
    /// Returns the panic payload if the accept loop panicked.
    pub fn join(self) -> std::thread::Result<()> {
        self.handle.join()
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("done", &self.is_done())
            .finish()
    }
}
