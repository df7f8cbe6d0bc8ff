//! Asynchronous action completion on a dedicated coroutine.

use std::fmt;

use may::coroutine;
use may::sync::mpsc;
use tracing::{debug, error};

use crate::cancel::CancellationToken;
use crate::error::{panic_message, DispatchError};
use crate::results::ActionReturn;

type Work = Box<dyn FnOnce() -> anyhow::Result<ActionReturn> + Send>;

/// Work whose completion the invoker waits for before executing the result.
///
/// The work runs on its own coroutine. Waiting suspends the calling coroutine
/// only; if the exchange is cancelled while waiting, the worker coroutine is
/// cancelled and the wait returns [`DispatchError::Cancelled`].
pub struct Deferred {
    work: Work,
}

enum Signal {
    Completed(anyhow::Result<ActionReturn>),
    /// Worker unwound without completing.
    Aborted,
    Cancelled,
}

/// Reports `Aborted` if the worker unwinds before `complete`.
struct CompletionGuard {
    tx: Option<mpsc::Sender<Signal>>,
}

impl CompletionGuard {
    fn complete(mut self, result: anyhow::Result<ActionReturn>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Signal::Completed(result));
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Signal::Aborted);
        }
    }
}

impl Deferred {
    pub fn new<F>(work: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<ActionReturn> + Send + 'static,
    {
        Self {
            work: Box::new(work),
        }
    }

    pub(crate) fn wait(
        self,
        action: &str,
        stack_size: usize,
        cancellation: &CancellationToken,
    ) -> Result<ActionReturn, DispatchError> {
        let (tx, rx) = mpsc::channel::<Signal>();
        let worker_tx = tx.clone();
        let work = self.work;

        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The closure owns everything it touches (boxed work and a channel sender),
        // so no reference outlives the spawning frame.
        let spawned = unsafe {
            coroutine::Builder::new()
                .name(format!("deferred:{action}"))
                .stack_size(stack_size)
                .spawn(move || {
                    let guard = CompletionGuard {
                        tx: Some(worker_tx),
                    };
                    let result = work();
                    guard.complete(result);
                })
        };
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                error!(
                    action = %action,
                    stack_size,
                    error = %e,
                    "Failed to spawn deferred action coroutine"
                );
                return Err(DispatchError::Io(e));
            }
        };

        cancellation.on_cancel(move || {
            let _ = tx.send(Signal::Cancelled);
        });

        match rx.recv() {
            Ok(Signal::Completed(result)) => {
                let _ = handle.join();
                result.map_err(|source| DispatchError::Handler {
                    action: action.to_string(),
                    source,
                })
            }
            Ok(Signal::Aborted) => {
                let message = match handle.join() {
                    Err(panic) => panic_message(panic.as_ref()),
                    Ok(()) => "deferred action aborted".to_string(),
                };
                Err(DispatchError::HandlerPanicked {
                    action: action.to_string(),
                    message,
                })
            }
            Ok(Signal::Cancelled) | Err(_) => {
                debug!(action = %action, "Cancelling deferred action");
                // SAFETY: may::JoinHandle::coroutine().cancel() is marked unsafe by the may
                // runtime. The handle is live and the result is no longer wanted; the
                // worker unwinds at its next yield point and its guard reports to a
                // receiver nobody reads.
                unsafe {
                    handle.coroutine().cancel();
                }
                Err(DispatchError::Cancelled)
            }
        }
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred")
    }
}
