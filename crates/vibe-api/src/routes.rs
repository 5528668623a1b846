use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{graph_handlers, handlers, repo_handlers, stream_handlers, AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/api/health", get(handlers::health))
        // Configuration
        .route(
            "/api/config",
            get(handlers::get_config).post(handlers::update_config),
        )
        .route(
            "/api/requirements",
            get(handlers::get_requirements).post(handlers::update_requirements),
        )
        .route("/api/prompt-config/status", get(handlers::prompt_catalog_status))
        .route("/api/prompt-config/reload", post(handlers::reload_prompt_catalog))
        // Enhancement pipeline
        .route("/api/enhance-prompt", post(handlers::enhance_prompt))
        .route("/api/stream-response", post(stream_handlers::stream_response))
        .route(
            "/api/generate-specification",
            post(handlers::generate_specification),
        )
        .route("/api/analyze-prompt", post(handlers::analyze_prompt))
        // Repository browsing
        .route(
            "/api/repositories/files",
            post(repo_handlers::get_repository_files),
        )
        .route(
            "/api/repositories/file-content",
            post(repo_handlers::get_file_content),
        )
        .route("/api/repositories/folder", post(repo_handlers::list_folder))
        // Architecture graph
        .route("/api/graph", get(graph_handlers::get_graph))
        .route("/api/graph/nodes", post(graph_handlers::create_node))
        .route(
            "/api/graph/nodes/{id}",
            axum::routing::put(graph_handlers::update_node)
                .delete(graph_handlers::delete_node),
        )
        .route(
            "/api/graph/edges",
            post(graph_handlers::create_edge).delete(graph_handlers::delete_edge),
        )
        .route(
            "/api/graph/layers",
            get(graph_handlers::list_layers).post(graph_handlers::create_layer),
        )
        .route(
            "/api/graph/layers/{name}",
            axum::routing::put(graph_handlers::update_layer)
                .delete(graph_handlers::delete_layer),
        )
        .route("/api/graph/save", post(graph_handlers::save_graph))
        .route("/api/graph/saved", get(graph_handlers::list_saved_graphs))
        .route(
            "/api/graph/saved/{name}",
            get(graph_handlers::get_saved_graph).delete(graph_handlers::delete_saved_graph),
        )
        .route("/api/graph/load/{name}", post(graph_handlers::load_graph))
        .route("/api/graph/export", get(graph_handlers::export_graph))
        .route("/api/graph/import", post(graph_handlers::import_graph))
        .route("/api/graph/clear", post(graph_handlers::clear_graph))
        .route(
            "/api/graph/sample-data",
            post(graph_handlers::populate_sample_data),
        )
        // Frontend error reporting
        .route(
            "/api/log-frontend-error",
            post(handlers::log_frontend_error),
        )
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(TraceLayer::new_for_http())
}
