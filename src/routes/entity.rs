//! Entity routes: `/{domain}/{entity}` for collections, `/{domain}/{entity}/{id}` for resources.

use crate::handlers::entity::{create, delete, list, options, patch_many, patch_one, read, replace};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/:domain/:entity",
            get(list).post(create).patch(patch_many).options(options),
        )
        .route(
            "/:domain/:entity/:id",
            get(read).put(replace).patch(patch_one).delete(delete),
        )
        .with_state(state)
}
