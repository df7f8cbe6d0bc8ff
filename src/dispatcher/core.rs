use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use tracing::{debug, error, info};

use super::binding::ParameterBinder;
use super::descriptor::{ActionDescriptor, ActionOutcome};
use crate::error::{panic_message, DispatchError};
use crate::runtime_config::DEFAULT_STACK_SIZE;
use crate::server::ExchangeContext;

/// Resolves, binds, invokes and executes one action per call.
///
/// Stateless apart from the stack size used for deferred completions, so a
/// single instance is shared by every in-flight exchange.
#[derive(Debug, Clone, Copy)]
pub struct ActionInvoker {
    stack_size: usize,
}

impl Default for ActionInvoker {
    fn default() -> Self {
        Self::new(DEFAULT_STACK_SIZE)
    }
}

impl ActionInvoker {
    #[must_use]
    pub fn new(stack_size: usize) -> Self {
        Self { stack_size }
    }

    #[must_use]
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// Produce the final response state for `action`.
    ///
    /// Construction failures are answered here with a generic 500; handler
    /// errors, panics and cancellation are returned to the pipeline.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Handler`], [`DispatchError::HandlerPanicked`],
    /// [`DispatchError::Cancelled`], or a failure writing the result.
    pub fn invoke(&self, action: &ActionDescriptor, ctx: &mut ExchangeContext) -> Result<(), DispatchError> {
        let request_id = ctx.request_id();
        if ctx.cancellation().is_cancelled() {
            debug!(request_id = %request_id, action = %action.name(), "Exchange cancelled before invocation");
            return Err(DispatchError::Cancelled);
        }

        let instance = match action.activate(ctx.services()) {
            Ok(instance) => instance,
            Err(e) => {
                error!(
                    request_id = %request_id,
                    action = %action.name(),
                    controller = action.controller(),
                    error = %e,
                    "Failed to construct controller"
                );
                return ctx.response.internal_error();
            }
        };

        let arguments = ParameterBinder::bind(action.parameters(), ctx);
        debug!(
            request_id = %request_id,
            action = %action.name(),
            arguments = ?arguments,
            "Parameters bound"
        );

        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| action.call(instance, arguments)))
            .map_err(|panic| {
                let message = panic_message(panic.as_ref());
                error!(
                    request_id = %request_id,
                    action = %action.name(),
                    panic_message = %message,
                    "Action panicked"
                );
                DispatchError::HandlerPanicked {
                    action: action.name().to_string(),
                    message,
                }
            })?;

        let returned = match outcome {
            ActionOutcome::Ready(result) => result.map_err(|source| DispatchError::Handler {
                action: action.name().to_string(),
                source,
            }),
            ActionOutcome::Deferred(deferred) => {
                debug!(
                    request_id = %request_id,
                    action = %action.name(),
                    "Waiting for deferred action"
                );
                deferred.wait(action.name(), self.stack_size, ctx.cancellation())
            }
        };

        let returned = match returned {
            Ok(returned) => returned,
            Err(DispatchError::Cancelled) => {
                debug!(request_id = %request_id, action = %action.name(), "Action cancelled");
                return Err(DispatchError::Cancelled);
            }
            Err(e) => {
                error!(
                    request_id = %request_id,
                    action = %action.name(),
                    execution_time_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "Action failed"
                );
                return Err(e);
            }
        };

        info!(
            request_id = %request_id,
            action = %action.name(),
            result = returned.kind(),
            execution_time_ms = start.elapsed().as_millis() as u64,
            "Action complete"
        );
        returned.execute(ctx)
    }
}
