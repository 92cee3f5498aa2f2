//! Async dispatch wrapper
//!
//! Handlers report failure by returning `Err(AppError)`. The extractors in
//! this module route their rejections into the same error type, and the
//! panic handlers turn a panicking handler into a forwarded error, so every
//! failure reaches the funnel exactly once.

use crate::error::AppError;
use crate::funnel::ErrorFunnel;
use axum::body::Body;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::Response as HttpResponse;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::any::Any;
use tower_http::catch_panic::ResponseForPanic;

/// JSON body extractor and response whose rejection is an [`AppError`]
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Query string extractor whose rejection is an [`AppError`]
#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

/// Path parameter extractor whose rejection is an [`AppError`]
#[derive(Debug, Clone, Copy, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

fn panic_message(err: &(dyn Any + Send)) -> String {
    if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "handler panicked".to_string()
    }
}

/// Panic handler for the route layer: forwards the panic as an error so the
/// pipeline renders it
pub fn forward_panic(err: Box<dyn Any + Send + 'static>) -> HttpResponse<Body> {
    let message = panic_message(err.as_ref());
    tracing::error!(panic = %message, "Handler panicked");
    AppError::unexpected(message).into_response()
}

/// Last-resort panic handler around the whole pipeline: renders directly
/// through the funnel because no stage is left to do it
#[derive(Debug, Clone, Copy)]
pub struct PanicGuard {
    funnel: ErrorFunnel,
}

impl PanicGuard {
    pub fn new(funnel: ErrorFunnel) -> Self {
        Self { funnel }
    }
}

impl ResponseForPanic for PanicGuard {
    type ResponseBody = Body;

    fn response_for_panic(
        &mut self,
        err: Box<dyn Any + Send + 'static>,
    ) -> HttpResponse<Self::ResponseBody> {
        let message = panic_message(err.as_ref());
        self.funnel.render(&AppError::unexpected(message))
    }
}
