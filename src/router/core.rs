//! Route table - ordered registration, first-match lookup.
//!
//! The table is filled once during startup and then shared read-only behind
//! an `Arc`; request-time lookups take `&self` and never lock.

use std::fmt;
use std::sync::Arc;

use http::Method;
use tracing::{debug, info, warn};

use super::pattern::RoutePattern;
use super::values::RouteData;
use crate::dispatcher::{ActionDescriptor, BindingHint};
use crate::error::{DispatchError, PatternError};
use crate::pipeline::RequestDelegate;
use crate::server::ExchangeContext;

/// What a matched route runs.
#[derive(Clone)]
pub enum Destination {
    /// A plain function over the exchange.
    Handler { name: Arc<str>, handler: RequestDelegate },
    /// A controller action, resolved and invoked by the action invoker.
    Action(Arc<ActionDescriptor>),
}

impl Destination {
    /// Wrap a closure as a named handler destination.
    pub fn handler<F>(name: &str, handler: F) -> Self
    where
        F: Fn(&mut ExchangeContext) -> Result<(), DispatchError> + Send + Sync + 'static,
    {
        Destination::Handler {
            name: Arc::from(name),
            handler: Arc::new(handler),
        }
    }

    #[must_use]
    pub fn action(action: ActionDescriptor) -> Self {
        Destination::Action(Arc::new(action))
    }

    /// Handler or action name, for logs and introspection.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Destination::Handler { name, .. } => name,
            Destination::Action(action) => action.name(),
        }
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Handler { name, .. } => f.debug_tuple("Handler").field(name).finish(),
            Destination::Action(action) => f.debug_tuple("Action").field(&action.name()).finish(),
        }
    }
}

/// One registered `(method, pattern, destination)` triple.
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    method: Method,
    pattern: RoutePattern,
    destination: Destination,
}

impl RouteDescriptor {
    /// # Errors
    ///
    /// Returns the pattern compilation error, if any.
    pub fn new(method: Method, pattern: &str, destination: Destination) -> Result<Self, PatternError> {
        Ok(Self {
            method,
            pattern: RoutePattern::parse(pattern)?,
            destination,
        })
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    #[must_use]
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Route-hinted parameter keys of the action that the pattern never captures.
    #[must_use]
    pub fn unmatched_route_hints(&self) -> Vec<&str> {
        let Destination::Action(action) = &self.destination else {
            return Vec::new();
        };
        action
            .parameters()
            .iter()
            .filter_map(|spec| match spec.hint() {
                Some(BindingHint::Route(key)) => Some(&**key),
                _ => None,
            })
            .filter(|key| {
                !self
                    .pattern
                    .parameter_names()
                    .any(|name| name.eq_ignore_ascii_case(key))
            })
            .collect()
    }

    /// Method filter (case-insensitive) followed by the pattern matcher.
    #[must_use]
    pub fn matches(&self, method: &Method, path: &str) -> Option<RouteData> {
        if !method_eq(&self.method, method) {
            return None;
        }
        self.pattern.match_path(path)
    }
}

/// Result of [`RouteTable::try_match`].
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub destination: &'a Destination,
    pub route_data: RouteData,
    /// The matched pattern; `None` when the fallback was selected.
    pub pattern: Option<&'a RoutePattern>,
}

impl RouteMatch<'_> {
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.pattern.is_none()
    }
}

/// Ordered collection of routes plus at most one fallback destination.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteDescriptor>,
    fallback: Option<Destination>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route. Registration order is the match order.
    pub fn register(&mut self, descriptor: RouteDescriptor) {
        for key in descriptor.unmatched_route_hints() {
            warn!(
                route_pattern = %descriptor.pattern,
                destination = %descriptor.destination.name(),
                route_key = %key,
                "Route-hinted parameter has no matching pattern segment"
            );
        }
        debug!(
            method = %descriptor.method,
            route_pattern = %descriptor.pattern,
            destination = %descriptor.destination.name(),
            position = self.routes.len(),
            "Route registered"
        );
        self.routes.push(descriptor);
    }

    /// Compile `pattern` and append the route.
    ///
    /// # Errors
    ///
    /// Returns the pattern compilation error; the table is left unchanged.
    pub fn map(&mut self, method: Method, pattern: &str, destination: Destination) -> Result<(), PatternError> {
        self.register(RouteDescriptor::new(method, pattern, destination)?);
        Ok(())
    }

    /// Set the fallback destination. A second call replaces the first.
    pub fn register_fallback(&mut self, destination: Destination) {
        if let Some(previous) = self.fallback.replace(destination) {
            warn!(
                previous = %previous.name(),
                "Replaced existing fallback destination"
            );
        }
    }

    /// First registered route whose method and pattern match, else the fallback.
    #[must_use]
    pub fn try_match<'a>(&'a self, method: &Method, path: &str) -> Option<RouteMatch<'a>> {
        for route in &self.routes {
            if let Some(route_data) = route.matches(method, path) {
                debug!(
                    method = %method,
                    path = %path,
                    route_pattern = %route.pattern,
                    destination = %route.destination.name(),
                    "Route matched"
                );
                return Some(RouteMatch {
                    destination: &route.destination,
                    route_data,
                    pattern: Some(&route.pattern),
                });
            }
        }

        self.fallback.as_ref().map(|destination| {
            debug!(
                method = %method,
                path = %path,
                destination = %destination.name(),
                "Fallback selected"
            );
            RouteMatch {
                destination,
                route_data: RouteData::new(),
                pattern: None,
            }
        })
    }

    #[must_use]
    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }

    #[must_use]
    pub fn fallback(&self) -> Option<&Destination> {
        self.fallback.as_ref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// One line per route (`GET /pattern -> destination`), then the fallback.
    #[must_use]
    pub fn describe(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .routes
            .iter()
            .map(|r| format!("{} {} -> {}", r.method, r.pattern, r.destination.name()))
            .collect();
        if let Some(fallback) = &self.fallback {
            lines.push(format!("* (fallback) -> {}", fallback.name()));
        }
        lines
    }

    /// Log a summary of the table, as done once at startup.
    pub fn log_summary(&self) {
        let summary: Vec<String> = self.describe().into_iter().take(10).collect();
        info!(
            routes_count = self.routes.len(),
            catch_all_routes = self.routes.iter().filter(|r| r.pattern.has_catch_all()).count(),
            has_fallback = self.fallback.is_some(),
            routes_summary = ?summary,
            "Routing table loaded"
        );
    }
}

fn method_eq(a: &Method, b: &Method) -> bool {
    a.as_str().eq_ignore_ascii_case(b.as_str())
}
