use bencher::criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use bencher::{dummy_handler, make_middleware, request};
use micro_mux::Router;
use std::hint::black_box;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread().build().expect("runtime should be created")
}

fn bench_route(criterion: &mut Criterion, name: &str, router: &Router, uri: &'static str) {
    let rt = runtime();
    criterion.bench_function(name, |b| {
        b.iter_batched(
            || request(uri),
            |req| black_box(rt.block_on(router.serve(req))),
            BatchSize::SmallInput,
        );
    });
}

fn benchmark_router_base(criterion: &mut Criterion) {
    let mut router = Router::new();
    router.handle("/bench", dummy_handler()).expect("pattern should be valid");

    bench_route(criterion, "router_base", &router, "/bench");
}

fn benchmark_router_with_one_middleware(criterion: &mut Criterion) {
    let mut router = Router::new();
    router.wrap_all([make_middleware("m1")]);
    router.handle("/bench", dummy_handler()).expect("pattern should be valid");

    bench_route(criterion, "router_with_one_middleware", &router, "/bench");
}

fn benchmark_router_with_five_middlewares(criterion: &mut Criterion) {
    let mut router = Router::new();
    router.wrap_all(["m1", "m2", "m3", "m4", "m5"].map(make_middleware));
    router.handle("/bench", dummy_handler()).expect("pattern should be valid");

    bench_route(criterion, "router_with_five_middlewares", &router, "/bench");
}

fn benchmark_router_group(criterion: &mut Criterion) {
    let mut router = Router::new();
    let group = router.group_with("/api", [make_middleware("group")]).expect("prefix should be valid");
    group.handle("/bench", dummy_handler()).expect("pattern should be valid");

    bench_route(criterion, "router_group", &router, "/api/bench");
}

criterion_group!(
    router,
    benchmark_router_base,
    benchmark_router_with_one_middleware,
    benchmark_router_with_five_middlewares,
    benchmark_router_group
);
criterion_main!(router);
