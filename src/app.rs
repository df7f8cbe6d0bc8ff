//! # App Module
//!
//! The startup-time registration surface. One [`AppBuilder`] collects
//! middleware, routes, controllers and services, then [`AppBuilder::build`]
//! freezes them into an immutable pipeline and route table wrapped in an
//! [`AppService`]. Nothing here is reachable from request processing.
//!
//! ```rust
//! use brrtdispatch::app::AppBuilder;
//! use brrtdispatch::runtime_config::RuntimeConfig;
//! use brrtdispatch::server::{ExchangeContext, Request};
//! use http::{Method, StatusCode};
//!
//! let mut app = AppBuilder::new(RuntimeConfig::default());
//! app.map_handler(Method::GET, "/health", "health", |ctx| {
//!     ctx.response.write_json(&serde_json::json!({ "status": "ok" }))
//! })
//! .unwrap();
//! let service = app.build();
//!
//! let mut ctx = ExchangeContext::new(Request::new(Method::GET, "/health"));
//! service.handle(&mut ctx);
//! assert_eq!(ctx.response.status(), StatusCode::OK);
//! ```

use std::sync::Arc;

use http::Method;
use tracing::info;

use crate::dispatcher::{ActionInvoker, Controller};
use crate::error::{DispatchError, PatternError};
use crate::middleware::{DiagnosticsMiddleware, Middleware, RoutingMiddleware, TracingMiddleware};
use crate::pipeline::{PipelineBuilder, Transform};
use crate::router::{Destination, RouteTable};
use crate::runtime_config::RuntimeConfig;
use crate::server::{AppService, ExchangeContext, Host};
use crate::services::{ServiceProvider, ServiceRegistry};

/// Collects registrations; produces an [`AppService`].
pub struct AppBuilder {
    config: RuntimeConfig,
    pipeline: PipelineBuilder,
    routes: RouteTable,
    services: Arc<dyn ServiceProvider>,
}

impl AppBuilder {
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            pipeline: PipelineBuilder::new(),
            routes: RouteTable::new(),
            services: Arc::new(ServiceRegistry::empty()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn with_services<P>(&mut self, services: P) -> &mut Self
    where
        P: ServiceProvider + 'static,
    {
        self.services = Arc::new(services);
        self
    }

    /// Append a middleware. Registration order is execution order on the way in.
    pub fn use_middleware<M>(&mut self, middleware: M) -> &mut Self
    where
        M: Middleware + 'static,
    {
        self.pipeline.use_middleware(middleware);
        self
    }

    pub fn use_transform(&mut self, transform: Transform) -> &mut Self {
        self.pipeline.use_transform(transform);
        self
    }

    pub fn use_tracing(&mut self) -> &mut Self {
        self.use_middleware(TracingMiddleware)
    }

    /// Developer error page, active only when the configured environment is development.
    pub fn use_diagnostics(&mut self) -> &mut Self {
        let environment = self.config.environment;
        self.use_middleware(DiagnosticsMiddleware::new(environment))
    }

    /// # Errors
    ///
    /// Returns the pattern error; nothing is registered.
    pub fn map_route(
        &mut self,
        method: Method,
        pattern: &str,
        destination: Destination,
    ) -> Result<&mut Self, PatternError> {
        self.routes.map(method, pattern, destination)?;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns the pattern error; nothing is registered.
    pub fn map_handler<F>(
        &mut self,
        method: Method,
        pattern: &str,
        name: &str,
        handler: F,
    ) -> Result<&mut Self, PatternError>
    where
        F: Fn(&mut ExchangeContext) -> Result<(), DispatchError> + Send + Sync + 'static,
    {
        self.map_route(method, pattern, Destination::handler(name, handler))
    }

    /// Destination used when no route matches. A later call replaces it.
    pub fn map_fallback(&mut self, destination: Destination) -> &mut Self {
        self.routes.register_fallback(destination);
        self
    }

    /// Register every action of `C`: one route per accepted method and template.
    ///
    /// # Errors
    ///
    /// The first invalid template; routes registered before it remain.
    pub fn map_controller<C: Controller>(&mut self) -> Result<&mut Self, PatternError> {
        let actions = C::actions();
        let mut registered = 0usize;
        for action in actions {
            let methods = if action.methods().is_empty() {
                vec![Method::GET]
            } else {
                action.methods().to_vec()
            };
            let templates = action.templates().to_vec();
            let destination = Destination::action(action);
            for template in &templates {
                for method in &methods {
                    self.routes
                        .map(method.clone(), template, destination.clone())?;
                    registered += 1;
                }
            }
        }
        info!(
            controller = std::any::type_name::<C>(),
            routes_registered = registered,
            "Controller scanned"
        );
        Ok(self)
    }

    /// Freeze everything. The routing stage is appended after all registered
    /// middleware, followed by the terminal 404.
    #[must_use]
    pub fn build(self) -> AppService {
        let routes = Arc::new(self.routes);
        let invoker = Arc::new(ActionInvoker::new(self.config.stack_size));
        let mut pipeline = self.pipeline;
        pipeline.use_middleware(RoutingMiddleware::new(Arc::clone(&routes), invoker));
        routes.log_summary();
        info!(
            middleware_count = pipeline.len(),
            environment = ?self.config.environment,
            stack_size = self.config.stack_size,
            "Application built"
        );
        AppService::new(pipeline.build(), routes, self.services)
    }

    /// Build and wrap in a [`Host`] using the configured stack size.
    #[must_use]
    pub fn build_host(self) -> Host {
        let stack_size = self.config.stack_size;
        Host::new(self.build(), stack_size)
    }
}

impl std::fmt::Debug for AppBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppBuilder")
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .field("routes", &self.routes.len())
            .finish_non_exhaustive()
    }
}
