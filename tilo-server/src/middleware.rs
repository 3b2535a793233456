//! Edge checkpoint middleware

use crate::server::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use std::sync::Arc;
use tilo_rbac::prelude::*;
use tracing::debug;

/// Decide every request before it reaches a page.
///
/// The session is read once from the request cookies and the shared local
/// store; allowed requests carry the resulting [`SessionContext`] as a
/// request extension. Denied requests get a `303 See Other` to the
/// unauthorized path, without query parameters.
pub async fn edge_guard(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let (store, _) = state.store_for(request.headers());
    let context = store.snapshot();

    match context.authorize(&state.guard, Checkpoint::Edge, &path) {
        Decision::Allowed { class } => {
            debug!(path = %path, %class, "Edge checkpoint passed");
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Decision::Redirected { location, .. } => Redirect::to(&location).into_response(),
    }
}
