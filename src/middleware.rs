use crate::context::LogContext;
use crate::trace::{trace_resource, with_trace, TRACE_HEADER};
use http::Request;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::futures::TaskLocalFuture;
use tower::{Layer, Service};

/// [`Layer`] that attaches the request's Cloud trace to its [`LogContext`].
///
/// The trace is read from the `X-Cloud-Trace-Context` header and
/// qualified with the configured project id. A missing or malformed
/// header yields an empty trace, which handlers ignore.
#[derive(Clone, Debug)]
pub struct TraceContextLayer {
    project_id: Arc<str>,
}

impl TraceContextLayer {
    pub fn new(project_id: impl Into<String>) -> Self {
        TraceContextLayer {
            project_id: Arc::from(project_id.into()),
        }
    }
}

impl<S> Layer<S> for TraceContextLayer {
    type Service = TraceContextService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TraceContextService {
            inner,
            project_id: Arc::clone(&self.project_id),
        }
    }
}

/// Service produced by [`TraceContextLayer`].
///
/// The derived context is inserted into the request extensions and is
/// ambient (see [`LogContext::current`]) while the inner future runs.
#[derive(Clone, Debug)]
pub struct TraceContextService<S> {
    inner: S,
    project_id: Arc<str>,
}

impl<S, B> Service<Request<B>> for TraceContextService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = TaskLocalFuture<LogContext, S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let trace = req
            .headers()
            .get(TRACE_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|header| trace_resource(&self.project_id, header))
            .unwrap_or_default();

        let parent = req
            .extensions()
            .get::<LogContext>()
            .cloned()
            .unwrap_or_else(LogContext::current);
        let ctx = with_trace(&parent, trace);
        req.extensions_mut().insert(ctx.clone());

        ctx.scope(self.inner.call(req))
    }
}
