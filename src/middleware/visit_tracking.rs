//! Counts blog visits once the response has been delivered

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    body::{Body, Bytes},
    extract::{RawPathParams, Request, State},
    middleware::Next,
    response::Response,
};
use http_body::{Body as HttpBody, Frame, SizeHint};

use crate::{api::VisitorIdentity, models::visit::Visit, services::visits::VisitTracker, AppState};

/// Route parameter naming the blog a request is scoped to
pub const BLOG_ID_PARAM: &str = "blogId";

/// Middleware for routes carrying a `blogId` path parameter.
///
/// Mount with `route_layer` so the path parameters are available. The response is
/// returned unchanged; tracking starts only after its body has been fully sent, in a
/// detached task whose failures are logged and dropped.
pub async fn track_blog_visit(
    State(state): State<AppState>,
    params: Option<RawPathParams>,
    VisitorIdentity(visitor_id): VisitorIdentity,
    request: Request,
    next: Next,
) -> Response {
    let blog_id = params.as_ref().and_then(|params| {
        params
            .iter()
            .find(|(name, _)| *name == BLOG_ID_PARAM)
            .map(|(_, value)| value.to_string())
    });

    let response = next.run(request).await;

    match blog_id.filter(|id| !id.is_empty()) {
        Some(blog_id) => {
            let job = TrackJob {
                tracker: state.services.visits.clone(),
                visit: Visit { blog_id, visitor_id },
            };
            response.map(|body| Body::new(TrackedBody::new(body, job)))
        }
        None => response,
    }
}

struct TrackJob {
    tracker: VisitTracker,
    visit: Visit,
}

impl TrackJob {
    fn spawn(self) {
        // Dropped outside a runtime (e.g. during shutdown): nothing to track with
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        handle.spawn(async move {
            self.tracker.record(&self.visit).await;
        });
    }
}

/// Response body that spawns its [`TrackJob`] once the server is done with it.
///
/// Counted as delivered when dropped after reaching end of stream, or when dropped
/// without ever being polled (`HEAD` responses are discarded unread). Bodies abandoned
/// mid-stream (client went away) are not tracked.
struct TrackedBody {
    inner: Body,
    polled: bool,
    finished: bool,
    job: Option<TrackJob>,
}

impl TrackedBody {
    fn new(inner: Body, job: TrackJob) -> Self {
        Self {
            inner,
            polled: false,
            finished: false,
            job: Some(job),
        }
    }

    fn delivered(&self) -> bool {
        self.finished || !self.polled || self.inner.is_end_stream()
    }
}

impl HttpBody for TrackedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.polled = true;
        let polled = Pin::new(&mut self.inner).poll_frame(cx);
        if let Poll::Ready(None) = polled {
            self.finished = true;
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for TrackedBody {
    fn drop(&mut self) {
        if self.delivered() {
            if let Some(job) = self.job.take() {
                job.spawn();
            }
        }
    }
}
