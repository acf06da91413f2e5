//! Entity routes. One set of parameterized paths serves every catalog resource; the handler
//! looks the entity up by its path segment.

use crate::handlers::entity::{create, delete as delete_handler, list, read, report, update};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:path_segment", get(list).post(create))
        .route(
            "/:path_segment/:id",
            get(read).patch(update).delete(delete_handler),
        )
        .route("/:path_segment/reports/:report", get(report))
        .with_state(state)
}
