use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use sacrament_cell::router::{sacrament_routes, SacramentState};

pub fn create_router(state: Arc<SacramentState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Parish sacrament API is running!" }))
        .nest("/sacraments", sacrament_routes(state))
}
