use std::sync::Arc;

use tracing::debug;

use super::Middleware;
use crate::dispatcher::ActionInvoker;
use crate::error::DispatchError;
use crate::pipeline::RequestDelegate;
use crate::router::{Destination, RouteTable};
use crate::server::ExchangeContext;

/// The routing stage: match the request against the table and run the
/// destination, or fall through to the next stage when nothing matches.
#[derive(Clone)]
pub struct RoutingMiddleware {
    table: Arc<RouteTable>,
    invoker: Arc<ActionInvoker>,
}

impl RoutingMiddleware {
    #[must_use]
    pub fn new(table: Arc<RouteTable>, invoker: Arc<ActionInvoker>) -> Self {
        Self { table, invoker }
    }

    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.table
    }
}

impl Middleware for RoutingMiddleware {
    fn handle(&self, ctx: &mut ExchangeContext, next: &RequestDelegate) -> Result<(), DispatchError> {
        let Some(route_match) = self.table.try_match(ctx.request.method(), ctx.request.path()) else {
            debug!(
                request_id = %ctx.request_id(),
                method = %ctx.request.method(),
                path = %ctx.request.path(),
                "No route matched"
            );
            return next(ctx);
        };

        let destination = route_match.destination;
        ctx.set_route_data(route_match.route_data);
        match destination {
            Destination::Handler { name, handler } => {
                debug!(
                    request_id = %ctx.request_id(),
                    handler_name = %name,
                    "Dispatching to handler"
                );
                handler(ctx)
            }
            Destination::Action(action) => self.invoker.invoke(action, ctx),
        }
    }
}

impl std::fmt::Debug for RoutingMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingMiddleware")
            .field("routes", &self.table.len())
            .field("has_fallback", &self.table.fallback().is_some())
            .finish()
    }
}
