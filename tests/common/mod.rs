#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use brrtdispatch::dispatcher::{ActionDescriptor, ActionOutcome, Controller, Deferred};
use brrtdispatch::error::DispatchError;
use brrtdispatch::error::ConstructionError;
use brrtdispatch::results::{ActionResult, ActionReturn, ResultExecutor};
use brrtdispatch::server::{AppService, ExchangeContext, Request, RequestBody, ResponseParts};
use brrtdispatch::services::{Resolver, ResolverExt};
use http::{Method, StatusCode};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub mod test_server {
    use std::sync::Once;

    /// Ensures May coroutines and the test subscriber are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x10000);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
    }
}

/// Run one request through `service` on the calling thread.
pub fn send(service: &AppService, request: Request) -> ResponseParts {
    let mut ctx = ExchangeContext::new(request);
    service.handle(&mut ctx);
    ctx.into_response()
}

pub fn get(target: &str) -> Request {
    Request::new(Method::GET, target)
}

pub fn post_json(target: &str, body: &str) -> Request {
    Request::new(Method::POST, target)
        .with_header("content-type", "application/json")
        .unwrap()
        .with_body(RequestBody::from_bytes(body.as_bytes().to_vec()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: u64,
    pub target: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLink {
    pub target: String,
}

/// Singleton backing store for [`LinksController`].
#[derive(Default)]
pub struct LinkStore {
    next_id: AtomicU64,
    links: Mutex<HashMap<u64, Link>>,
}

impl LinkStore {
    pub fn insert(&self, target: &str) -> Link {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let link = Link {
            id,
            target: target.to_string(),
        };
        self.links.lock().insert(id, link.clone());
        link
    }

    pub fn get(&self, id: u64) -> Option<Link> {
        self.links.lock().get(&id).cloned()
    }
}

pub struct LinksController {
    store: Arc<LinkStore>,
}

impl Controller for LinksController {
    fn construct(resolver: &dyn Resolver) -> Result<Self, ConstructionError> {
        Ok(Self {
            store: resolver.require::<LinkStore>()?,
        })
    }

    fn actions() -> Vec<ActionDescriptor> {
        vec![
            ActionDescriptor::builder::<Self>("Links.get")
                .get()
                .route("/api/links/{id}")
                .param::<u64>("id")
                .handle(|this, args| {
                    let id = args.get_or_default::<u64>("id");
                    Ok(match this.store.get(id) {
                        Some(link) => ActionReturn::value(&link)?,
                        None => ActionResult::NotFound(None).into(),
                    })
                }),
            ActionDescriptor::builder::<Self>("Links.create")
                .post()
                .route("/api/links")
                .body::<NewLink>("link")
                .handle(|this, args| {
                    let Some(new_link) = args.take::<NewLink>("link") else {
                        return Ok(ActionResult::bad_request(&json!({ "error": "invalid body" }))?.into());
                    };
                    let link = this.store.insert(&new_link.target);
                    Ok(ActionResult::created(format!("/api/links/{}", link.id), &link)?.into())
                }),
        ]
    }
}

/// Dependency-free controller covering binding, failures and deferral.
pub struct SampleController;

impl Controller for SampleController {
    fn construct(_resolver: &dyn Resolver) -> Result<Self, ConstructionError> {
        Ok(Self)
    }

    fn actions() -> Vec<ActionDescriptor> {
        vec![
            ActionDescriptor::builder::<Self>("Sample.bind")
                .get()
                .route("/sample/{id}")
                .param::<i32>("id")
                .param::<i32>("page")
                .param::<bool>("flag")
                .param::<String>("name")
                .query_param::<i32>("limit", "max")
                .handle(|_, args| {
                    let name = args.take::<String>("name");
                    Ok(ActionReturn::value(&json!({
                        "id": args.get_or_default::<i32>("id"),
                        "page": args.get_or_default::<i32>("page"),
                        "flag": args.get_or_default::<bool>("flag"),
                        "name": name,
                        "limit": args.get_or_default::<i32>("limit"),
                    }))?)
                }),
            ActionDescriptor::builder::<Self>("Sample.body_hint")
                .post()
                .route("/sample/{id}/body")
                .body_or_default::<i64>("id")
                .handle(|_, args| Ok(ActionReturn::value(&json!({ "id": args.take::<i64>("id") }))?)),
            ActionDescriptor::builder::<Self>("Sample.route_hint")
                .get()
                .route("/sample-route/{n}")
                .route_param::<i32>("count", "n")
                .handle(|_, args| {
                    Ok(ActionReturn::value(&json!({ "count": args.get_or_default::<i32>("count") }))?)
                }),
            ActionDescriptor::builder::<Self>("Sample.pair")
                .post()
                .route("/sample-pair")
                .body::<NewLink>("link")
                .body::<serde_json::Value>("raw")
                .handle(|_, args| {
                    let target = args.take::<NewLink>("link").map(|link| link.target);
                    let raw = args.take::<serde_json::Value>("raw");
                    Ok(ActionReturn::value(&json!({ "target": target, "raw": raw }))?)
                }),
            ActionDescriptor::builder::<Self>("Sample.teapot")
                .get()
                .route("/sample-teapot")
                .handle(|_, _| Ok(ActionReturn::custom(TeapotResult { flavour: "earl grey" }))),
            ActionDescriptor::builder::<Self>("Sample.outcome")
                .get()
                .route("/sample-outcome/{mode}")
                .param::<String>("mode")
                .handle_outcome(|_, mut args| {
                    let mode = args.take::<String>("mode").unwrap_or_default();
                    if mode == "later" {
                        return ActionOutcome::Deferred(Deferred::new(move || {
                            may::coroutine::sleep(Duration::from_millis(5));
                            Ok(ActionReturn::value(&json!({ "completed": mode }))?)
                        }));
                    }
                    ActionOutcome::Ready(
                        ActionReturn::value(&json!({ "completed": mode })).map_err(Into::into),
                    )
                }),
            ActionDescriptor::builder::<Self>("Sample.fail")
                .get()
                .route("/sample-fail")
                .handle(|_, _| Err(anyhow!("database unavailable"))),
            ActionDescriptor::builder::<Self>("Sample.panic")
                .get()
                .route("/sample-panic")
                .handle(|_, _| panic!("handler exploded")),
            ActionDescriptor::builder::<Self>("Sample.null")
                .get()
                .route("/sample-null")
                .handle(|_, _| Ok(ActionReturn::Null)),
            ActionDescriptor::builder::<Self>("Sample.slow")
                .get()
                .route("/sample-slow/{ms}")
                .param::<u64>("ms")
                .handle_deferred(|_, args| {
                    let ms = args.get_or_default::<u64>("ms");
                    may::coroutine::sleep(Duration::from_millis(ms));
                    Ok(ActionReturn::value(&json!({ "slept_ms": ms }))?)
                }),
            ActionDescriptor::builder::<Self>("Sample.slow_panic")
                .get()
                .route("/sample-slow-panic")
                .handle_deferred(|_, _| panic!("deferred exploded")),
        ]
    }
}

/// Application-defined result kind.
pub struct TeapotResult {
    pub flavour: &'static str,
}

impl ResultExecutor for TeapotResult {
    fn execute(self: Box<Self>, ctx: &mut ExchangeContext) -> Result<(), DispatchError> {
        ctx.response.set_status(StatusCode::IM_A_TEAPOT)?;
        ctx.response.insert_header("x-flavour", self.flavour)?;
        ctx.response.write(b"short and stout");
        Ok(())
    }
}

/// Never registered with any container.
pub struct Unregistered;

pub struct BrokenController {
    _dep: Arc<Unregistered>,
}

impl Controller for BrokenController {
    fn construct(resolver: &dyn Resolver) -> Result<Self, ConstructionError> {
        Ok(Self {
            _dep: resolver.require::<Unregistered>()?,
        })
    }

    fn actions() -> Vec<ActionDescriptor> {
        vec![ActionDescriptor::builder::<Self>("Broken.get")
            .get()
            .route("/broken")
            .handle(|_, _| Ok(ActionReturn::Null))]
    }
}

/// Scoped service that counts its own drops.
pub struct RequestAudit {
    dropped: Arc<AtomicUsize>,
}

impl RequestAudit {
    pub fn new(dropped: Arc<AtomicUsize>) -> Self {
        Self { dropped }
    }
}

impl Drop for RequestAudit {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct AuditedController {
    audit: Arc<RequestAudit>,
}

impl Controller for AuditedController {
    fn construct(resolver: &dyn Resolver) -> Result<Self, ConstructionError> {
        Ok(Self {
            audit: resolver.require::<RequestAudit>()?,
        })
    }

    fn actions() -> Vec<ActionDescriptor> {
        vec![ActionDescriptor::builder::<Self>("Audited.get")
            .get()
            .route("/audited")
            .handle(|this, _| {
                // Held by the scope cache and by this controller.
                let shared = Arc::strong_count(&this.audit) >= 2;
                Ok(ActionReturn::value(&json!({ "scoped": shared }))?)
            })]
    }
}
