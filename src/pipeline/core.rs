use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use tracing::debug;

use crate::error::DispatchError;
use crate::middleware::Middleware;
use crate::server::ExchangeContext;

/// A composed request handler: the rest of the pipeline from some point on.
pub type RequestDelegate =
    Arc<dyn Fn(&mut ExchangeContext) -> Result<(), DispatchError> + Send + Sync>;

/// A middleware stage in its rawest form: given `next`, produce a delegate.
pub type Transform = Arc<dyn Fn(RequestDelegate) -> RequestDelegate + Send + Sync>;

/// Ordered list of stages, composed by [`PipelineBuilder::build`].
#[derive(Clone, Default)]
pub struct PipelineBuilder {
    stages: Vec<Transform>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw transform.
    pub fn use_transform(&mut self, transform: Transform) -> &mut Self {
        self.stages.push(transform);
        self
    }

    /// Append a [`Middleware`] implementation.
    pub fn use_middleware<M>(&mut self, middleware: M) -> &mut Self
    where
        M: Middleware + 'static,
    {
        self.use_shared_middleware(Arc::new(middleware))
    }

    pub fn use_shared_middleware(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.use_transform(Arc::new(move |next: RequestDelegate| -> RequestDelegate {
            let middleware = Arc::clone(&middleware);
            Arc::new(move |ctx: &mut ExchangeContext| middleware.handle(ctx, &next))
        }))
    }

    /// Append an inline stage `f(ctx, next)`.
    pub fn use_fn<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut ExchangeContext, &RequestDelegate) -> Result<(), DispatchError>
            + Send
            + Sync
            + 'static,
    {
        let f = Arc::new(f);
        self.use_transform(Arc::new(move |next: RequestDelegate| -> RequestDelegate {
            let f = Arc::clone(&f);
            Arc::new(move |ctx: &mut ExchangeContext| f(ctx, &next))
        }))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Compose the stages, first-registered outermost. The builder is left
    /// intact and may be built again.
    #[must_use]
    pub fn build(&self) -> Pipeline {
        let terminal: RequestDelegate = Arc::new(not_found);
        let entry = self
            .stages
            .iter()
            .rev()
            .fold(terminal, |next, stage| stage(next));
        debug!(stages = self.stages.len(), "Pipeline built");
        Pipeline {
            entry,
            stages: self.stages.len(),
        }
    }
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("stages", &self.stages.len())
            .finish()
    }
}

fn not_found(ctx: &mut ExchangeContext) -> Result<(), DispatchError> {
    if !ctx.response.has_started() {
        ctx.response.set_status(StatusCode::NOT_FOUND)?;
    }
    Ok(())
}

/// A composed, immutable pipeline. Cheap to clone and share across coroutines.
#[derive(Clone)]
pub struct Pipeline {
    entry: RequestDelegate,
    stages: usize,
}

impl Pipeline {
    /// Run one exchange through every stage.
    ///
    /// # Errors
    ///
    /// Whatever the first failing stage returned and no outer stage handled.
    pub fn run(&self, ctx: &mut ExchangeContext) -> Result<(), DispatchError> {
        (self.entry)(ctx)
    }

    #[must_use]
    pub fn stages(&self) -> usize {
        self.stages
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline").field("stages", &self.stages).finish()
    }
}
