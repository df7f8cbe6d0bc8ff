use std::hint::black_box;

use brrtdispatch::app::AppBuilder;
use brrtdispatch::router::{Destination, RouteTable};
use brrtdispatch::runtime_config::RuntimeConfig;
use brrtdispatch::server::{ExchangeContext, Request};
use criterion::{criterion_group, criterion_main, Criterion};
use http::Method;

const ROUTES: &[(&str, &str)] = &[
    ("GET", "/"),
    ("GET", "/zoo/animals"),
    ("POST", "/zoo/animals"),
    ("GET", "/zoo/animals/{id}"),
    ("PUT", "/zoo/animals/{id}"),
    ("PATCH", "/zoo/animals/{id}"),
    ("DELETE", "/zoo/animals/{id}"),
    ("GET", "/zoo/animals/{id}/toys/{toy_id}"),
    ("GET", "/zoo/{category}/animals/{id}/habitats/{habitat_id}/sections/{section_id}"),
    ("POST", "/inventory/{warehouse_id}/feeds/{feed_id}/items/{item_id}/batches/{batch_id}"),
    ("GET", "/complex/{a}/{b}/{c}/{d}/{e}/{f}/{g}/{h}/{i}"),
    ("GET", "/assets/{*path}"),
];

fn noop(name: &str) -> Destination {
    Destination::handler(name, |_| Ok(()))
}

fn route_table() -> RouteTable {
    let mut table = RouteTable::new();
    for (method, pattern) in ROUTES {
        let method = Method::from_bytes(method.as_bytes()).unwrap();
        table.map(method, pattern, noop(pattern)).unwrap();
    }
    table.register_fallback(noop("fallback"));
    table
}

fn bench_route_matching(c: &mut Criterion) {
    let table = route_table();
    let test_paths = [
        (Method::GET, "/zoo/animals/123"),
        (Method::GET, "/zoo/animals/123/toys/456"),
        (Method::GET, "/zoo/cats/animals/123/habitats/88/sections/5"),
        (Method::POST, "/inventory/1/feeds/2/items/3/batches/4"),
        (Method::GET, "/complex/1/2/3/4/5/6/7/8/9"),
        (Method::GET, "/assets/css/site%20main.css"),
        (Method::GET, "/not/registered"),
    ];
    c.bench_function("route_match", |b| {
        b.iter(|| {
            for (method, path) in &test_paths {
                black_box(table.try_match(method, path).map(|m| m.route_data.len()));
            }
        })
    });
}

fn bench_full_dispatch(c: &mut Criterion) {
    let mut app = AppBuilder::new(RuntimeConfig::default());
    app.map_handler(Method::GET, "/zoo/animals/{id}", "get_animal", |ctx| {
        let id = ctx.route_value("id").unwrap_or_default().to_string();
        ctx.response.write_json(&serde_json::json!({ "id": id }))
    })
    .unwrap();
    let service = app.build();

    c.bench_function("dispatch_handler", |b| {
        b.iter(|| {
            let mut ctx = ExchangeContext::new(Request::new(Method::GET, "/zoo/animals/123"));
            service.handle(&mut ctx);
            black_box(ctx.into_response());
        })
    });
}

criterion_group!(benches, bench_route_matching, bench_full_dispatch);
criterion_main!(benches);
