//! Correlation id middleware for Actix Web.
//!
//! Every request is tagged with a correlation id. If the caller sent an `x-correlation-id` header, its value is
//! reused; otherwise a fresh UUID v4 is issued. The id is stored in the request extensions, where handlers can pick it
//! up with the [`CorrelationId`] extractor, and it is echoed in the `x-correlation-id` header of the response,
//! including error responses.

use std::{
    fmt::Display,
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderMap, HeaderName, HeaderValue},
    Error,
    FromRequest,
    HttpMessage,
    HttpRequest,
};
use futures::future::LocalBoxFuture;
use log::*;
use uuid::Uuid;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
const MAX_CORRELATION_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The id carried in the request headers, or a fresh one if there is no usable header.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty() && s.len() <= MAX_CORRELATION_ID_LEN)
            .map(|s| Self(s.to_string()))
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromRequest for CorrelationId {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let id = req.extensions().get::<CorrelationId>().cloned();
        ready(Ok(id.unwrap_or_else(|| CorrelationId::from_headers(req.headers()))))
    }
}

#[derive(Default)]
pub struct CorrelationIdMiddlewareFactory;

impl CorrelationIdMiddlewareFactory {
    pub fn new() -> Self {
        Self
    }
}

impl<S, B> Transform<S, ServiceRequest> for CorrelationIdMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = CorrelationIdMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CorrelationIdMiddlewareService { service: Rc::new(service) }))
    }
}

pub struct CorrelationIdMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for CorrelationIdMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let id = CorrelationId::from_headers(req.headers());
            trace!("💻️ [{id}] {} {}", req.method(), req.path());
            req.extensions_mut().insert(id.clone());
            let mut res = service.call(req).await?;
            match HeaderValue::from_str(id.as_str()) {
                Ok(value) => {
                    res.headers_mut().insert(HeaderName::from_static(CORRELATION_ID_HEADER), value);
                },
                Err(e) => warn!("💻️ Could not set the correlation id header to {id}. {e}"),
            }
            Ok(res)
        })
    }
}
