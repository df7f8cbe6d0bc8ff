use std::error::Error as _;
use std::fmt::Write as _;

use http::StatusCode;
use tracing::{error, warn};

use super::Middleware;
use crate::error::DispatchError;
use crate::pipeline::RequestDelegate;
use crate::runtime_config::Environment;
use crate::server::ExchangeContext;

/// Renders a developer-facing error page for failures escaping inner stages.
///
/// Only active in [`Environment::Development`]; in production the error is
/// passed through untouched so the transport boundary answers with a generic
/// 500. Cancellations are never rendered.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsMiddleware {
    environment: Environment,
}

impl DiagnosticsMiddleware {
    #[must_use]
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }
}

impl Middleware for DiagnosticsMiddleware {
    fn handle(&self, ctx: &mut ExchangeContext, next: &RequestDelegate) -> Result<(), DispatchError> {
        let err = match next(ctx) {
            Ok(()) => return Ok(()),
            Err(DispatchError::Cancelled) => return Err(DispatchError::Cancelled),
            Err(err) => err,
        };
        if !self.environment.is_development() {
            return Err(err);
        }
        if ctx.response.has_started() {
            warn!(
                request_id = %ctx.request_id(),
                error = %err,
                "Response already started, cannot render diagnostics"
            );
            return Err(err);
        }

        error!(
            request_id = %ctx.request_id(),
            error = %err,
            "Unhandled error rendered as diagnostics page"
        );
        let page = render_page(ctx, &err);
        ctx.response.reset_for_error()?;
        ctx.response.set_status(StatusCode::INTERNAL_SERVER_ERROR)?;
        ctx.response
            .insert_header("content-type", "text/plain; charset=utf-8")?;
        ctx.response.write(page.as_bytes());
        Ok(())
    }
}

fn render_page(ctx: &ExchangeContext, err: &DispatchError) -> String {
    let mut page = String::new();
    let _ = writeln!(page, "500 Internal Server Error");
    let _ = writeln!(page);
    let _ = writeln!(page, "{} {}", ctx.request.method(), ctx.request.path());
    let _ = writeln!(page, "request id: {}", ctx.request_id());
    if !ctx.route_data().is_empty() {
        let _ = writeln!(page, "route values:");
        for (name, value) in ctx.route_data().iter() {
            let _ = writeln!(page, "  {name} = {value}");
        }
    }
    let _ = writeln!(page);
    let _ = writeln!(page, "error: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = writeln!(page, "caused by: {cause}");
        source = cause.source();
    }
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineBuilder;
    use crate::server::Request;
    use http::Method;

    fn failing(env: Environment) -> (Result<(), DispatchError>, ExchangeContext) {
        let mut builder = PipelineBuilder::new();
        builder.use_middleware(DiagnosticsMiddleware::new(env));
        builder.use_fn(|_ctx, _next| {
            Err(DispatchError::Handler {
                action: "Widgets.get".into(),
                source: anyhow::anyhow!("db offline").context("loading widget"),
            })
        });
        let mut ctx = ExchangeContext::new(Request::new(Method::GET, "/widgets/1"));
        let result = builder.build().run(&mut ctx);
        (result, ctx)
    }

    #[test]
    fn development_renders_error_chain() {
        let (result, ctx) = failing(Environment::Development);
        assert!(result.is_ok());
        assert_eq!(ctx.response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = String::from_utf8(ctx.response.body().to_vec()).unwrap();
        assert!(body.contains("GET /widgets/1"));
        assert!(body.contains("loading widget"));
    }

    #[test]
    fn production_propagates() {
        let (result, ctx) = failing(Environment::Production);
        assert!(matches!(result, Err(DispatchError::Handler { .. })));
        assert!(!ctx.response.has_started());
    }
}
