use http::StatusCode;
use micro_mux::middleware::{BoxMiddleware, MiddlewareExt, Next, from_fn};
use micro_mux::{Request, Responder, Response, Router, handler_fn};
use tracing::{Dispatch, info};

const STATIC: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/static");

async fn not_found(_req: Request) -> Response {
    info!("not found handler");
    (StatusCode::NOT_FOUND, "This is not the page you are looking for ... \nGo about your business").into_response()
}

async fn page(_req: Request) -> &'static str {
    info!("main page");
    "main page"
}

async fn junk(_req: Request) -> &'static str {
    "junk page"
}

async fn hello(_req: Request) -> &'static str {
    "hello world"
}

fn extra() -> BoxMiddleware {
    from_fn(|req: Request, next: Next| async move {
        info!("extra middleware");
        next.run(req).await
    })
    .boxed()
}

fn empty() -> BoxMiddleware {
    from_fn(|req: Request, next: Next| async move {
        info!("empty middleware");
        next.run(req).await
    })
    .boxed()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let mut router = Router::with_logger(tracing::dispatcher::get_default(Dispatch::clone));
    let access_logger = router.access_logger();
    router.wrap(access_logger);
    router.get("/{$}", handler_fn(page))?;
    router.post("/hello", handler_fn(hello))?;
    router.handle("GET /junk", handler_fn(junk))?;
    router.static_dir("/pages/", STATIC)?;
    router.static_dir("/world", STATIC)?;
    router.serve_file("/junk.txt", format!("{STATIC}/hello.txt"))?;
    router.all("/", handler_fn(not_found))?;

    let group = router.group("/extra")?;
    group.wrap(extra());
    group.all("/junk", handler_fn(junk))?;
    let sub_group = group.group_with("/extra", [empty()])?;
    sub_group.delete("/junk", handler_fn(junk))?;

    let access_logger = router.access_logger();
    let group = router.group_with("/test", [empty(), extra(), access_logger.boxed()])?;
    group.get("/{$}", handler_fn(page))?;
    group.get("/hello", handler_fn(hello))?;

    router.run("127.0.0.1:8080").await;
    Ok(())
}
