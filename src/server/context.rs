use std::fmt;
use std::sync::Arc;

use super::properties::Properties;
use super::request::Request;
use super::response::{Response, ResponseParts};
use crate::cancel::CancellationToken;
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::router::RouteData;
use crate::services::{EmptyScope, Resolver, ServiceScope};

/// Properties key under which the routing step publishes matched route values.
pub const ROUTE_VALUES_KEY: &str = "brrtdispatch.route_values";

/// Per-request state carried through the pipeline.
///
/// Owned by exactly one exchange; middleware receive `&mut` access in turn.
/// The service scope is installed by [`crate::server::AppService`] before the
/// pipeline runs and disposed after it completes.
pub struct ExchangeContext {
    pub request: Request,
    pub response: Response,
    pub properties: Properties,
    route_data: RouteData,
    services: Arc<dyn ServiceScope>,
    cancellation: CancellationToken,
    request_id: RequestId,
}

impl ExchangeContext {
    /// Wrap `request`. The request id is taken from `x-request-id` when it
    /// parses, otherwise a fresh one is generated.
    #[must_use]
    pub fn new(request: Request) -> Self {
        let request_id = RequestId::from_header_or_new(request.header(REQUEST_ID_HEADER));
        Self {
            request,
            response: Response::new(),
            properties: Properties::new(),
            route_data: RouteData::new(),
            services: Arc::new(EmptyScope),
            cancellation: CancellationToken::new(),
            request_id,
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn route_data(&self) -> &RouteData {
        &self.route_data
    }

    /// Replace the route values and mirror them into the properties bag.
    pub fn set_route_data(&mut self, route_data: RouteData) {
        self.properties.insert(ROUTE_VALUES_KEY, route_data.clone());
        self.route_data = route_data;
    }

    /// Route value for `name` (case-insensitive).
    #[must_use]
    pub fn route_value(&self, name: &str) -> Option<&str> {
        self.route_data.get(name)
    }

    /// Resolver for the current exchange's service scope.
    #[must_use]
    pub fn services(&self) -> &dyn Resolver {
        self.services.resolver()
    }

    pub fn set_services(&mut self, scope: Arc<dyn ServiceScope>) -> Arc<dyn ServiceScope> {
        std::mem::replace(&mut self.services, scope)
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    #[must_use]
    pub fn into_response(self) -> ResponseParts {
        self.response.into_parts()
    }
}

impl fmt::Debug for ExchangeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeContext")
            .field("request_id", &self.request_id)
            .field("method", self.request.method())
            .field("path", &self.request.path())
            .field("route_data", &self.route_data)
            .field("status", &self.response.status())
            .finish_non_exhaustive()
    }
}
