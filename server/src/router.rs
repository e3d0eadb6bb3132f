// Router configuration

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
};
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{health_handlers::*, image_handlers::*, menu_handlers::*},
    observability,
    state::AppState,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    Router::new()
        // Health & Info
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        // Images
        .route("/images/{filename}", get(get_image_handler))
        // Restaurants & menus
        .route("/restaurant", post(create_restaurant_handler))
        .route("/menu/{restaurant_id}", get(get_menu_handler))
        .route(
            "/menu/{restaurant_id}/category",
            post(create_category_handler),
        )
        .route(
            "/menu/{restaurant_id}/category/{category_id}/item",
            post(add_item_handler).layer(DefaultBodyLimit::disable()),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(observability::http_make_span())
                .on_response(observability::response_logger()),
        )
        .layer(cors)
        .layer(observability::request_context_layer())
        .with_state(state)
}
