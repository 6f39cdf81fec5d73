use std::convert::Infallible;
use tower::{service_fn, Layer, ServiceExt};
use tracing::{error, info};
use tracing_logdriver::{CloudHandler, HandlerLayer, Level, Platform};
use tracing_subscriber::layer::SubscriberExt;

#[tokio::main]
async fn main() {
    let handler = CloudHandler::new("demo-project", Level::Info).with_platform(Platform::new("checkout"));
    let trace_layer = handler.trace_layer();

    let subscriber = tracing_subscriber::Registry::default().with(HandlerLayer::new(handler));
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("{e}");
        return;
    }

    let svc = trace_layer.layer(service_fn(|req: http::Request<()>| async move {
        info!(path = %req.uri().path(), "handling request");
        error!(order_id = 1001, "payment declined");
        Ok::<_, Infallible>(())
    }));

    let req = http::Request::builder()
        .uri("/checkout")
        .header("X-Cloud-Trace-Context", "105445aa7843bc8bf206b12000100000/1;o=1")
        .body(())
        .expect("valid request");
    let _ = svc.oneshot(req).await;
}
