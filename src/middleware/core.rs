use std::time::{Duration, Instant};

use crate::error::DispatchError;
use crate::pipeline::RequestDelegate;
use crate::server::ExchangeContext;

/// Outcome of [`Middleware::before`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Call the next stage.
    Continue,
    /// The middleware produced the response; inner stages are skipped.
    Respond,
}

/// A pipeline stage.
///
/// Simple stages implement `before`/`after`; stages that need to wrap the
/// call itself (spans, error interception) override `handle`.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: &mut ExchangeContext, next: &RequestDelegate) -> Result<(), DispatchError> {
        if self.before(ctx)? == Flow::Respond {
            self.after(ctx, Duration::ZERO);
            return Ok(());
        }
        let start = Instant::now();
        let result = next(ctx);
        self.after(ctx, start.elapsed());
        result
    }

    fn before(&self, _ctx: &mut ExchangeContext) -> Result<Flow, DispatchError> {
        Ok(Flow::Continue)
    }

    fn after(&self, _ctx: &mut ExchangeContext, _latency: Duration) {}
}
