use std::time::Instant;

use tracing::{debug, field, info, info_span, warn};

use super::Middleware;
use crate::error::DispatchError;
use crate::ids::REQUEST_ID_HEADER;
use crate::pipeline::RequestDelegate;
use crate::server::ExchangeContext;

/// Opens a `request` span per exchange, echoes the request id and records
/// the final status and latency.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn handle(&self, ctx: &mut ExchangeContext, next: &RequestDelegate) -> Result<(), DispatchError> {
        let request_id = ctx.request_id();
        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %ctx.request.method(),
            path = %ctx.request.path(),
            status = field::Empty,
            latency_ms = field::Empty,
        );
        let _entered = span.enter();

        if !ctx.response.has_started() {
            ctx.response
                .insert_header(REQUEST_ID_HEADER, &request_id.to_string())?;
        }
        debug!(query_params = ctx.request.query().len(), "Request received");

        let start = Instant::now();
        let result = next(ctx);
        let latency_ms = start.elapsed().as_millis() as u64;
        let status = ctx.response.status().as_u16();
        span.record("status", status);
        span.record("latency_ms", latency_ms);

        match &result {
            Ok(()) => info!(status, latency_ms, "Request completed"),
            Err(DispatchError::Cancelled) => debug!(latency_ms, "Request cancelled"),
            Err(e) => warn!(status, latency_ms, error = %e, "Request failed"),
        }
        result
    }
}
