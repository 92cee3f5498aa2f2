//! Request receive time

use crate::context::RequestContext;
use crate::pipeline::{Stage, StageOutcome};
use async_trait::async_trait;
use chrono::Utc;

/// Stamps the time the request reached the router
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestTimestamp;

#[async_trait]
impl Stage for RequestTimestamp {
    fn name(&self) -> &'static str {
        "request_time"
    }

    async fn on_request(&self, ctx: &mut RequestContext) -> StageOutcome {
        ctx.request_time = Some(Utc::now());
        StageOutcome::Continue
    }
}
