use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::anyhow;
use http::Method;
use serde::de::DeserializeOwned;

use super::binding::{Arguments, BindingHint, ParamValue, ParameterSpec};
use super::deferred::Deferred;
use crate::error::ConstructionError;
use crate::results::ActionReturn;
use crate::services::{Instance, Resolver, ResolverExt};

/// A handler type whose actions are registered by a one-time startup scan.
///
/// `construct` is used when the resolver has no instance of `Self`; it
/// resolves each dependency from the same resolver.
///
/// ```rust
/// use std::sync::Arc;
/// use brrtdispatch::dispatcher::{ActionDescriptor, Controller};
/// use brrtdispatch::error::ConstructionError;
/// use brrtdispatch::results::ActionReturn;
/// use brrtdispatch::services::{Resolver, ResolverExt};
///
/// struct Greeting(String);
/// struct Hello {
///     greeting: Arc<Greeting>,
/// }
///
/// impl Controller for Hello {
///     fn construct(resolver: &dyn Resolver) -> Result<Self, ConstructionError> {
///         Ok(Self { greeting: resolver.require::<Greeting>()? })
///     }
///
///     fn actions() -> Vec<ActionDescriptor> {
///         vec![ActionDescriptor::builder::<Self>("Hello.greet")
///             .get()
///             .route("/hello/{name}")
///             .param::<String>("name")
///             .handle(|this, args| {
///                 let name = args.take::<String>("name").unwrap_or_default();
///                 Ok(ActionReturn::value(&format!("{}, {name}", this.greeting.0))?)
///             })]
///     }
/// }
///
/// assert_eq!(Hello::actions()[0].templates()[0], "/hello/{name}");
/// ```
pub trait Controller: Sized + Send + Sync + 'static {
    /// Build an instance from the request-scoped resolver.
    ///
    /// # Errors
    ///
    /// A [`ConstructionError`] when a dependency cannot be resolved.
    fn construct(resolver: &dyn Resolver) -> Result<Self, ConstructionError>;

    fn actions() -> Vec<ActionDescriptor>;
}

/// What an action body produced: a result now, or work to wait for.
pub enum ActionOutcome {
    Ready(anyhow::Result<ActionReturn>),
    Deferred(Deferred),
}

impl fmt::Debug for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(Ok(_)) => f.write_str("Ready(Ok)"),
            Self::Ready(Err(e)) => write!(f, "Ready(Err({e}))"),
            Self::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

type Activator = Arc<dyn Fn(&dyn Resolver) -> Result<Instance, ConstructionError> + Send + Sync>;
type ActionFn = Arc<dyn Fn(Instance, Arguments) -> ActionOutcome + Send + Sync>;

/// Startup-resolved metadata for one action. Read-only once built.
#[derive(Clone)]
pub struct ActionDescriptor {
    name: Arc<str>,
    controller: &'static str,
    methods: Vec<Method>,
    templates: Vec<String>,
    parameters: Vec<ParameterSpec>,
    activator: Activator,
    action: ActionFn,
}

impl ActionDescriptor {
    #[must_use]
    pub fn builder<C: Controller>(name: &str) -> ActionBuilder<C> {
        ActionBuilder {
            name: Arc::from(name),
            methods: Vec::new(),
            templates: Vec::new(),
            parameters: Vec::new(),
            _controller: PhantomData,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type name of the controller, for logs.
    #[must_use]
    pub fn controller(&self) -> &'static str {
        self.controller
    }

    /// Accepted methods. Empty means `GET`.
    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    #[must_use]
    pub fn templates(&self) -> &[String] {
        &self.templates
    }

    #[must_use]
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub(crate) fn activate(&self, resolver: &dyn Resolver) -> Result<Instance, ConstructionError> {
        (self.activator)(resolver)
    }

    pub(crate) fn call(&self, instance: Instance, arguments: Arguments) -> ActionOutcome {
        (self.action)(instance, arguments)
    }
}

impl fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("name", &self.name)
            .field("controller", &self.controller)
            .field("methods", &self.methods)
            .field("templates", &self.templates)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Declarative action registration, finished by one of the `handle*` calls.
pub struct ActionBuilder<C> {
    name: Arc<str>,
    methods: Vec<Method>,
    templates: Vec<String>,
    parameters: Vec<ParameterSpec>,
    _controller: PhantomData<fn() -> C>,
}

impl<C: Controller> ActionBuilder<C> {
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    #[must_use]
    pub fn get(self) -> Self {
        self.method(Method::GET)
    }

    #[must_use]
    pub fn post(self) -> Self {
        self.method(Method::POST)
    }

    #[must_use]
    pub fn put(self) -> Self {
        self.method(Method::PUT)
    }

    #[must_use]
    pub fn patch(self) -> Self {
        self.method(Method::PATCH)
    }

    #[must_use]
    pub fn delete(self) -> Self {
        self.method(Method::DELETE)
    }

    /// Add a route template. An action may be reachable through several.
    #[must_use]
    pub fn route(mut self, template: &str) -> Self {
        self.templates.push(template.to_string());
        self
    }

    /// Bound by name: route value, then query value, then the type's fallback.
    #[must_use]
    pub fn param<T: ParamValue>(mut self, name: &str) -> Self {
        self.parameters.push(ParameterSpec::value::<T>(name, None));
        self
    }

    /// Bound only from the route value `key`.
    #[must_use]
    pub fn route_param<T: ParamValue>(mut self, name: &str, key: &str) -> Self {
        self.parameters
            .push(ParameterSpec::value::<T>(name, Some(BindingHint::Route(Arc::from(key)))));
        self
    }

    /// Bound only from the query value `key`.
    #[must_use]
    pub fn query_param<T: ParamValue>(mut self, name: &str, key: &str) -> Self {
        self.parameters
            .push(ParameterSpec::value::<T>(name, Some(BindingHint::Query(Arc::from(key)))));
        self
    }

    /// Deserialized from the JSON request body.
    #[must_use]
    pub fn body<T>(mut self, name: &str) -> Self
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.parameters.push(ParameterSpec::body::<T>(name));
        self
    }

    /// Deserialized from the JSON request body, or `T::default()` when the
    /// body is missing or does not deserialize.
    #[must_use]
    pub fn body_or_default<T>(mut self, name: &str) -> Self
    where
        T: DeserializeOwned + Default + Send + 'static,
    {
        self.parameters.push(ParameterSpec::body_or_default::<T>(name));
        self
    }

    /// Finish with a synchronous body.
    pub fn handle<F>(self, f: F) -> ActionDescriptor
    where
        F: Fn(&C, &mut Arguments) -> anyhow::Result<ActionReturn> + Send + Sync + 'static,
    {
        self.handle_outcome(move |controller: Arc<C>, mut arguments: Arguments| {
            ActionOutcome::Ready(f(&controller, &mut arguments))
        })
    }

    /// Finish with a body that runs to completion on its own coroutine.
    pub fn handle_deferred<F>(self, f: F) -> ActionDescriptor
    where
        F: Fn(Arc<C>, Arguments) -> anyhow::Result<ActionReturn> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.handle_outcome(move |controller: Arc<C>, arguments: Arguments| {
            let f = Arc::clone(&f);
            ActionOutcome::Deferred(Deferred::new(move || f(controller, arguments)))
        })
    }

    /// Finish with a body that decides per call whether to complete now or defer.
    pub fn handle_outcome<F>(self, f: F) -> ActionDescriptor
    where
        F: Fn(Arc<C>, Arguments) -> ActionOutcome + Send + Sync + 'static,
    {
        let action_name = Arc::clone(&self.name);
        let action: ActionFn = Arc::new(move |instance: Instance, arguments: Arguments| {
            match instance.downcast::<C>() {
                Ok(controller) => f(controller, arguments),
                Err(_) => ActionOutcome::Ready(Err(anyhow!(
                    "action '{action_name}' activated an instance that is not a {}",
                    type_name::<C>()
                ))),
            }
        });

        ActionDescriptor {
            name: self.name,
            controller: type_name::<C>(),
            methods: self.methods,
            templates: self.templates,
            parameters: self.parameters,
            activator: Arc::new(activate::<C>),
            action,
        }
    }
}

/// Resolver first; direct construction when the type is not registered.
fn activate<C: Controller>(resolver: &dyn Resolver) -> Result<Instance, ConstructionError> {
    if let Some(instance) = resolver.resolve::<C>() {
        return Ok(instance as Instance);
    }
    C::construct(resolver).map(|controller| Arc::new(controller) as Instance)
}
