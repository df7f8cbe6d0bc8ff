use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, warn};

use super::context::ExchangeContext;
use crate::error::{panic_message, DispatchError};
use crate::pipeline::Pipeline;
use crate::router::RouteTable;
use crate::services::{EmptyScope, ServiceProvider, ServiceRegistry};

/// The single entry point handed to the transport.
///
/// Cheap to clone; every clone shares the same immutable pipeline and route
/// table. `handle` always leaves a status on the response: anything escaping
/// the pipeline becomes a generic 500 unless the body has already started.
#[derive(Clone)]
pub struct AppService {
    pipeline: Pipeline,
    routes: Arc<RouteTable>,
    services: Arc<dyn ServiceProvider>,
}

impl AppService {
    #[must_use]
    pub fn new(pipeline: Pipeline, routes: Arc<RouteTable>, services: Arc<dyn ServiceProvider>) -> Self {
        Self {
            pipeline,
            routes,
            services,
        }
    }

    /// A service with no registered dependencies.
    #[must_use]
    pub fn without_services(pipeline: Pipeline, routes: Arc<RouteTable>) -> Self {
        Self::new(pipeline, routes, Arc::new(ServiceRegistry::empty()))
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Run one exchange: create the service scope, run the pipeline, contain
    /// errors and panics, dispose the scope.
    pub fn handle(&self, ctx: &mut ExchangeContext) {
        let start = Instant::now();
        let scope = self.services.create_scope();
        ctx.set_services(Arc::clone(&scope));

        let outcome = catch_unwind(AssertUnwindSafe(|| self.pipeline.run(ctx)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(DispatchError::Cancelled)) => {
                debug!(request_id = %ctx.request_id(), "Exchange cancelled");
                self.fail(ctx);
            }
            Ok(Err(e)) => {
                error!(
                    request_id = %ctx.request_id(),
                    method = %ctx.request.method(),
                    path = %ctx.request.path(),
                    error = %e,
                    "Unhandled pipeline error"
                );
                self.fail(ctx);
            }
            Err(panic) => {
                error!(
                    request_id = %ctx.request_id(),
                    method = %ctx.request.method(),
                    path = %ctx.request.path(),
                    panic_message = %panic_message(panic.as_ref()),
                    "Pipeline panicked"
                );
                self.fail(ctx);
            }
        }

        ctx.set_services(Arc::new(EmptyScope));
        scope.dispose();
        debug!(
            request_id = %ctx.request_id(),
            status = ctx.response.status().as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Exchange handled"
        );
    }

    fn fail(&self, ctx: &mut ExchangeContext) {
        if ctx.response.has_started() {
            warn!(
                request_id = %ctx.request_id(),
                status = ctx.response.status().as_u16(),
                "Response already started, keeping partial response"
            );
            return;
        }
        if let Err(e) = ctx.response.internal_error() {
            error!(request_id = %ctx.request_id(), error = %e, "Failed to write error response");
        }
    }
}

impl std::fmt::Debug for AppService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppService")
            .field("pipeline", &self.pipeline)
            .field("routes", &self.routes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineBuilder;
    use crate::server::Request;
    use http::{Method, StatusCode};

    fn service(builder: &PipelineBuilder) -> AppService {
        AppService::without_services(builder.build(), Arc::new(RouteTable::new()))
    }

    #[test]
    fn pipeline_error_becomes_generic_500() {
        let mut builder = PipelineBuilder::new();
        builder.use_fn(|ctx, _next| {
            ctx.response.insert_header("x-secret", "leak")?;
            Err(DispatchError::Io(std::io::Error::other("disk full")))
        });
        let mut ctx = ExchangeContext::new(Request::new(Method::GET, "/"));
        service(&builder).handle(&mut ctx);
        let parts = ctx.into_response();
        assert_eq!(parts.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(parts.header("x-secret").is_none());
        assert_eq!(parts.json().unwrap()["error"], "Internal Server Error");
    }

    #[test]
    fn panic_is_contained() {
        let mut builder = PipelineBuilder::new();
        builder.use_fn(|_ctx, _next| panic!("boom"));
        let mut ctx = ExchangeContext::new(Request::new(Method::GET, "/"));
        service(&builder).handle(&mut ctx);
        assert_eq!(ctx.response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn started_response_is_kept() {
        let mut builder = PipelineBuilder::new();
        builder.use_fn(|ctx, _next| {
            ctx.response.write(b"partial");
            Err(DispatchError::Cancelled)
        });
        let mut ctx = ExchangeContext::new(Request::new(Method::GET, "/"));
        service(&builder).handle(&mut ctx);
        assert_eq!(ctx.response.status(), StatusCode::OK);
        assert_eq!(ctx.response.body(), b"partial");
    }
}
