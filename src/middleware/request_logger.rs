//! Per-request tracing for the board API.
//!
//! Health checks and WebSocket upgrades log at debug so the poll-driven
//! board traffic stays readable at INFO.

use std::future::{Ready, ready};
use std::time::{Duration, Instant};

use actix_web::Error;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::http::StatusCode;
use futures_util::future::LocalBoxFuture;
use tracing::{debug, error, info, warn};

/// Paths logged at debug level only.
const QUIET_SUFFIXES: &[&str] = &["/health", "/ready", "/ws"];

/// Middleware factory; wrap the app with `.wrap(RequestLogger)`.
pub struct RequestLogger;

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggerService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggerService { inner: service }))
    }
}

pub struct RequestLoggerService<S> {
    inner: S,
}

/// What gets logged about a request once it finishes.
struct RequestLine {
    method: String,
    path: String,
    query: String,
    client: String,
    started: Instant,
}

impl RequestLine {
    fn from_request(req: &ServiceRequest) -> Self {
        Self {
            method: req.method().to_string(),
            path: req.path().to_string(),
            query: req.query_string().to_string(),
            client: req
                .connection_info()
                .realip_remote_addr()
                .unwrap_or("unknown")
                .to_string(),
            started: Instant::now(),
        }
    }

    fn is_quiet(&self) -> bool {
        QUIET_SUFFIXES
            .iter()
            .any(|suffix| self.path.ends_with(suffix))
    }

    fn finish(&self, status: StatusCode) {
        let elapsed: Duration = self.started.elapsed();
        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let status = status.as_u16();

        if status >= 500 {
            error!(target: "api", method = %self.method, path = %self.path, query = %self.query,
                client = %self.client, status, duration_ms, "Request failed");
        } else if status >= 400 {
            warn!(target: "api", method = %self.method, path = %self.path, query = %self.query,
                client = %self.client, status, duration_ms, "Request rejected");
        } else if self.is_quiet() {
            debug!(target: "api", method = %self.method, path = %self.path, status, duration_ms,
                "Request served");
        } else {
            info!(target: "api", method = %self.method, path = %self.path, query = %self.query,
                status, duration_ms, "Request served");
        }
    }
}

impl<S, B> Service<ServiceRequest> for RequestLoggerService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(inner);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let line = RequestLine::from_request(&req);
        let fut = self.inner.call(req);

        Box::pin(async move {
            let res = fut.await?;
            line.finish(res.status());
            Ok(res)
        })
    }
}
