//! Static content from the public directory
//!
//! GET and HEAD requests whose path names a file under the directory are
//! answered directly. Anything else continues to the router.

use crate::context::RequestContext;
use crate::pipeline::{Stage, StageOutcome};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use std::path::Path;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::{debug, warn};

/// Serves files from a directory ahead of the router
#[derive(Debug, Clone)]
pub struct StaticFiles {
    dir: Option<ServeDir>,
}

impl StaticFiles {
    /// Inert when `root` is not a directory
    pub fn new(root: &Path) -> Self {
        let dir = if root.is_dir() {
            debug!(root = %root.display(), "Serving static files");
            Some(ServeDir::new(root))
        } else {
            debug!(root = %root.display(), "Static directory missing, stage inert");
            None
        };
        Self { dir }
    }

    pub fn is_active(&self) -> bool {
        self.dir.is_some()
    }
}

#[async_trait]
impl Stage for StaticFiles {
    fn name(&self) -> &'static str {
        "static_files"
    }

    async fn on_request(&self, ctx: &mut RequestContext) -> StageOutcome {
        let Some(dir) = &self.dir else {
            return StageOutcome::Continue;
        };
        if ctx.parts.method != Method::GET && ctx.parts.method != Method::HEAD {
            return StageOutcome::Continue;
        }

        let mut lookup = Request::new(Body::empty());
        *lookup.method_mut() = ctx.parts.method.clone();
        *lookup.uri_mut() = ctx.parts.uri.clone();
        *lookup.headers_mut() = ctx.parts.headers.clone();

        let response = match dir.clone().oneshot(lookup).await {
            Ok(response) => response,
            Err(infallible) => match infallible {},
        };

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED => StageOutcome::Continue,
            status => {
                if status.is_server_error() {
                    warn!(path = %ctx.path, %status, "Static file lookup failed");
                }
                StageOutcome::Respond(response.map(Body::new))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(method: Method, uri: &str) -> RequestContext {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        RequestContext::new(request, false)
    }

    #[tokio::test]
    async fn test_missing_directory_is_inert() {
        let stage = StaticFiles::new(Path::new("/definitely/not/here"));
        assert!(!stage.is_active());
        let mut ctx = context(Method::GET, "/style.css");
        assert!(matches!(
            stage.on_request(&mut ctx).await,
            StageOutcome::Continue
        ));
    }

    #[tokio::test]
    async fn test_serves_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hello bulk buyers").unwrap();
        let stage = StaticFiles::new(dir.path());

        let mut ctx = context(Method::GET, "/hello.txt");
        let StageOutcome::Respond(response) = stage.on_request(&mut ctx).await else {
            panic!("file should be served");
        };
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"hello bulk buyers");
    }

    #[tokio::test]
    async fn test_unknown_file_and_post_continue() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hi").unwrap();
        let stage = StaticFiles::new(dir.path());

        let mut ctx = context(Method::GET, "/api/v1/products");
        assert!(matches!(
            stage.on_request(&mut ctx).await,
            StageOutcome::Continue
        ));

        let mut ctx = context(Method::POST, "/hello.txt");
        assert!(matches!(
            stage.on_request(&mut ctx).await,
            StageOutcome::Continue
        ));
    }
}
